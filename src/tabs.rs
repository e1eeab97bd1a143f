//! Per-tab panel state, keyed by window and tab.
//!
//! Tab ids are only unique within a window, so the key combines both. State
//! lives in memory only and is dropped by [`TabStore::evict_older_than`] or
//! [`TabStore::enforce_capacity`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_CAPACITY: usize = 20;

pub fn tab_key(window_id: i64, tab_id: i64) -> String {
    format!("{window_id}-{tab_id}")
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabState {
    pub window_id: i64,
    pub tab_id: i64,
    pub url: String,
    pub hostname: String,
    pub selected_tool_id: Option<String>,
    pub tool_state: Map<String, Value>,
    #[serde(skip)]
    pub last_updated: Instant,
}

impl TabState {
    pub fn key(&self) -> String {
        tab_key(self.window_id, self.tab_id)
    }
}

/// A partial update. `None` keeps the stored value; empty strings do too.
#[derive(Debug, Clone, Default)]
pub struct TabUpdate {
    pub url: Option<String>,
    pub hostname: Option<String>,
    /// `Some(None)` clears the selection.
    pub selected_tool_id: Option<Option<String>>,
    pub tool_state: Option<Map<String, Value>>,
}

#[derive(Debug, Default)]
pub struct TabStore {
    tabs: HashMap<String, TabState>,
    active: Option<(i64, i64)>,
}

impl TabStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn set_active(&mut self, window_id: i64, tab_id: i64) {
        self.active = Some((window_id, tab_id));
    }

    pub fn active_key(&self) -> Option<String> {
        self.active.map(|(w, t)| tab_key(w, t))
    }

    pub fn active(&self) -> Option<&TabState> {
        let (w, t) = self.active?;
        self.get(w, t)
    }

    pub fn get(&self, window_id: i64, tab_id: i64) -> Option<&TabState> {
        self.tabs.get(&tab_key(window_id, tab_id))
    }

    pub fn update(&mut self, window_id: i64, tab_id: i64, update: TabUpdate) -> &TabState {
        self.update_at(window_id, tab_id, update, Instant::now())
    }

    pub fn update_at(
        &mut self,
        window_id: i64,
        tab_id: i64,
        update: TabUpdate,
        now: Instant,
    ) -> &TabState {
        let key = tab_key(window_id, tab_id);
        let previous = self.tabs.remove(&key);
        let keep = |new: Option<String>, old: Option<&String>| {
            new.filter(|s| !s.is_empty())
                .or_else(|| old.cloned())
                .unwrap_or_default()
        };

        let state = TabState {
            window_id,
            tab_id,
            url: keep(update.url, previous.as_ref().map(|p| &p.url)),
            hostname: keep(update.hostname, previous.as_ref().map(|p| &p.hostname)),
            selected_tool_id: match update.selected_tool_id {
                Some(selected) => selected,
                None => previous.as_ref().and_then(|p| p.selected_tool_id.clone()),
            },
            tool_state: update
                .tool_state
                .or_else(|| previous.map(|p| p.tool_state))
                .unwrap_or_default(),
            last_updated: now,
        };

        self.tabs.entry(key).or_insert(state)
    }

    /// Sets the selected tool of the active tab. No-op without an active tab.
    pub fn set_selected_tool(&mut self, tool_id: Option<String>) -> Option<&TabState> {
        let (w, t) = self.active?;
        let update = TabUpdate {
            selected_tool_id: Some(tool_id),
            ..Default::default()
        };
        Some(self.update(w, t, update))
    }

    /// Replaces one tool's state on the active tab.
    pub fn update_tool_state(&mut self, tool_id: &str, value: Value) -> Option<&TabState> {
        let (w, t) = self.active?;
        let mut tool_state = self.active()?.tool_state.clone();
        tool_state.insert(tool_id.to_string(), value);
        let update = TabUpdate {
            tool_state: Some(tool_state),
            ..Default::default()
        };
        Some(self.update(w, t, update))
    }

    pub fn tool_state(&self, tool_id: &str) -> Option<&Value> {
        self.active()?.tool_state.get(tool_id)
    }

    pub fn clear(&mut self, window_id: i64, tab_id: i64) -> Option<TabState> {
        self.tabs.remove(&tab_key(window_id, tab_id))
    }

    /// Drops every entry not updated within `max_age`. Returns how many were dropped.
    pub fn evict_older_than(&mut self, max_age: Duration) -> usize {
        self.evict_older_than_at(max_age, Instant::now())
    }

    pub fn evict_older_than_at(&mut self, max_age: Duration, now: Instant) -> usize {
        let before = self.tabs.len();
        self.tabs
            .retain(|_, state| now.saturating_duration_since(state.last_updated) <= max_age);
        before - self.tabs.len()
    }

    /// Keeps at most `max` entries, dropping the least recently updated ones.
    /// The active tab is never dropped.
    pub fn enforce_capacity(&mut self, max: usize) -> usize {
        if self.tabs.len() <= max {
            return 0;
        }
        let active = self.active_key();
        let mut candidates: Vec<(String, Instant)> = self
            .tabs
            .iter()
            .filter(|(key, _)| Some(*key) != active.as_ref())
            .map(|(key, state)| (key.clone(), state.last_updated))
            .collect();
        candidates.sort_by_key(|(_, updated)| *updated);

        let excess = self.tabs.len() - max;
        let mut dropped = 0;
        for (key, _) in candidates.into_iter().take(excess) {
            self.tabs.remove(&key);
            dropped += 1;
        }
        dropped
    }
}
