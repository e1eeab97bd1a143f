//! Copy/paste of repository files, scoped per Control Room hostname.
//!
//! Never persisted: a host restart forgets every clipboard.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::tabs::TabState;

static FOLDER_IN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"folders/(\d+)").expect("valid folder pattern"));

/// Numeric folder id of a folder page URL.
pub fn folder_id_from_url(url: &str) -> Option<&str> {
    FOLDER_IN_URL
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardEntry {
    pub copied_file_ids: BTreeSet<String>,
    pub copied_file_names: BTreeMap<String, String>,
    pub source_folder_id: String,
    pub source_hostname: String,
    pub source_tab_key: String,
}

impl ClipboardEntry {
    pub fn file_name(&self, file_id: &str) -> Option<&str> {
        self.copied_file_names.get(file_id).map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct ClipboardStore {
    by_hostname: HashMap<String, ClipboardEntry>,
}

impl ClipboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the copy in the context of `active`. Returns false when the
    /// tab has no hostname yet.
    pub fn copy(
        &mut self,
        active: &TabState,
        file_ids: BTreeSet<String>,
        file_names: BTreeMap<String, String>,
        folder_id: &str,
    ) -> bool {
        if active.hostname.is_empty() {
            return false;
        }

        let entry = ClipboardEntry {
            copied_file_ids: file_ids,
            copied_file_names: file_names,
            source_folder_id: folder_id.to_string(),
            source_hostname: active.hostname.clone(),
            source_tab_key: active.key(),
        };
        tracing::debug!(
            hostname = %active.hostname,
            files = entry.copied_file_ids.len(),
            "files copied"
        );
        self.by_hostname.insert(active.hostname.clone(), entry);
        true
    }

    pub fn current(&self, active: &TabState) -> Option<&ClipboardEntry> {
        self.by_hostname.get(&active.hostname)
    }

    /// True only for a non-empty clipboard of the same hostname, viewed from a
    /// folder page other than the one the files were copied from.
    pub fn can_paste(&self, active: &TabState) -> bool {
        let Some(entry) = self.current(active) else {
            return false;
        };
        if entry.copied_file_ids.is_empty() || entry.source_hostname != active.hostname {
            return false;
        }
        folder_id_from_url(&active.url).is_some_and(|folder| folder != entry.source_folder_id)
    }

    pub fn clear(&mut self, active: &TabState) -> Option<ClipboardEntry> {
        self.by_hostname.remove(&active.hostname)
    }

    pub fn clear_hostname(&mut self, hostname: &str) -> Option<ClipboardEntry> {
        self.by_hostname.remove(hostname)
    }

    pub fn clear_all(&mut self) {
        self.by_hostname.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabs::{TabStore, TabUpdate};

    fn tab(store: &mut TabStore, tab_id: i64, url: &str, host: &str) -> TabState {
        store
            .update(1, tab_id, TabUpdate {
                url: Some(url.to_string()),
                hostname: Some(host.to_string()),
                ..Default::default()
            })
            .clone()
    }

    fn files(ids: &[&str]) -> (BTreeSet<String>, BTreeMap<String, String>) {
        let set = ids.iter().map(|s| s.to_string()).collect();
        let names = ids.iter().map(|s| (s.to_string(), format!("Bot {s}"))).collect();
        (set, names)
    }

    const FOLDER_10: &str = "https://cr.one/#/bots/repository/private/folders/10";
    const FOLDER_20: &str = "https://cr.one/#/bots/repository/private/folders/20";

    #[test]
    fn test_folder_id_from_url() {
        assert_eq!(folder_id_from_url(FOLDER_10), Some("10"));
        assert_eq!(folder_id_from_url("https://cr.one/#/bots/packages/versions"), None);
    }

    #[test]
    fn test_empty_clipboard_cannot_paste() {
        let mut tabs = TabStore::new();
        let active = tab(&mut tabs, 1, FOLDER_20, "cr.one");
        assert!(!ClipboardStore::new().can_paste(&active));

        let mut clip = ClipboardStore::new();
        clip.copy(&active, BTreeSet::new(), BTreeMap::new(), "10");
        assert!(!clip.can_paste(&active));
    }

    #[test]
    fn test_same_folder_cannot_paste() {
        let mut tabs = TabStore::new();
        let source = tab(&mut tabs, 1, FOLDER_10, "cr.one");
        let mut clip = ClipboardStore::new();
        let (ids, names) = files(&["1", "2"]);
        assert!(clip.copy(&source, ids, names, "10"));

        assert!(!clip.can_paste(&source));
        let elsewhere = tab(&mut tabs, 1, FOLDER_20, "cr.one");
        assert!(clip.can_paste(&elsewhere));
        assert_eq!(clip.current(&elsewhere).unwrap().source_tab_key, "1-1");
        assert_eq!(clip.current(&elsewhere).unwrap().file_name("2"), Some("Bot 2"));
    }

    #[test]
    fn test_other_hostname_cannot_paste() {
        let mut tabs = TabStore::new();
        let source = tab(&mut tabs, 1, FOLDER_10, "cr.one");
        let mut clip = ClipboardStore::new();
        let (ids, names) = files(&["1"]);
        clip.copy(&source, ids, names, "10");

        let other = tab(&mut tabs, 2, "https://cr.two/#/bots/repository/private/folders/20", "cr.two");
        assert!(!clip.can_paste(&other));
        assert!(clip.current(&other).is_none());
    }

    #[test]
    fn test_non_folder_page_cannot_paste() {
        let mut tabs = TabStore::new();
        let source = tab(&mut tabs, 1, FOLDER_10, "cr.one");
        let mut clip = ClipboardStore::new();
        let (ids, names) = files(&["1"]);
        clip.copy(&source, ids, names, "10");

        let bot_page = tab(&mut tabs, 1, "https://cr.one/#/bots/repository/private/taskbots/4", "cr.one");
        assert!(!clip.can_paste(&bot_page));
    }

    #[test]
    fn test_copy_needs_hostname() {
        let mut tabs = TabStore::new();
        let blank = tabs.update(1, 1, TabUpdate::default()).clone();
        let mut clip = ClipboardStore::new();
        let (ids, names) = files(&["1"]);
        assert!(!clip.copy(&blank, ids, names, "10"));
    }

    #[test]
    fn test_clear_scopes() {
        let mut tabs = TabStore::new();
        let one = tab(&mut tabs, 1, FOLDER_10, "cr.one");
        let two = tab(&mut tabs, 2, "https://cr.two/#/bots/repository/private/folders/3", "cr.two");
        let mut clip = ClipboardStore::new();
        let (ids, names) = files(&["1"]);
        clip.copy(&one, ids.clone(), names.clone(), "10");
        clip.copy(&two, ids, names, "3");

        assert!(clip.clear(&one).is_some());
        assert!(clip.current(&two).is_some());
        assert!(clip.clear_hostname("cr.two").is_some());
        assert!(clip.current(&two).is_none());

        let (ids, names) = files(&["5"]);
        clip.copy(&one, ids, names, "10");
        clip.clear_all();
        assert!(clip.current(&one).is_none());
    }
}
