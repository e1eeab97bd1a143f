//! Requests the host relays to the extension for things only the page can do.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::protocol::{Action, Response, tag_message};

/// Anything that can deliver an [`Action`] to the page and return its answer.
#[async_trait]
pub trait PageChannel: Send + Sync {
    async fn request(&self, action: Action) -> Result<Response>;

    async fn ping(&self) -> bool {
        matches!(self.request(Action::Ping).await, Ok(r) if r.success && r.pong == Some(true))
    }

    async fn get_auth_token(&self) -> Result<Option<String>> {
        let response = expect_success(self.request(Action::GetAuthToken).await?)?;
        Ok(response
            .auth_token
            .as_deref()
            .map(normalize_token)
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }

    async fn click_line(&self, line_number: u32) -> Result<bool> {
        Ok(self.request(Action::ClickLine { line_number }).await?.success)
    }

    async fn open_variable(&self, variable_name: &str) -> Result<bool> {
        let action = Action::OpenVariable {
            variable_name: variable_name.to_string(),
        };
        Ok(self.request(action).await?.success)
    }

    async fn refresh_folder_list(&self) -> Result<()> {
        expect_success(self.request(Action::RefreshFolderList).await?).map(|_| ())
    }

    async fn open_side_panel(&self, tab_id: i64) -> Result<()> {
        let action = Action::OpenSidePanel {
            tab_id: Some(tab_id),
        };
        expect_success(self.request(action).await?).map(|_| ())
    }
}

/// Strips one pair of surrounding double quotes from a stored token.
pub fn normalize_token(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

/// Correlates outgoing requests with the `replyTo` frames the extension sends back.
pub struct PageLink {
    tx: mpsc::UnboundedSender<Value>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl PageLink {
    pub fn new(tx: mpsc::UnboundedSender<Value>, timeout: Duration) -> Self {
        Self {
            tx,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    pub fn outbound(&self) -> mpsc::UnboundedSender<Value> {
        self.tx.clone()
    }

    /// Pushes a message to the extension without waiting for an answer.
    pub fn notify(&self, msg: Value) -> Result<()> {
        self.tx.send(msg).map_err(|_| Error::not_connected())
    }

    /// Completes a pending request. Returns false for unknown or expired ids.
    pub fn resolve(&self, reply_to: u64, response: Response) -> bool {
        let sender = match self.pending.lock() {
            Ok(mut pending) => pending.remove(&reply_to),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                tracing::debug!(reply_to, "reply for unknown request");
                false
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

fn expect_success(response: Response) -> Result<Response> {
    if response.success {
        Ok(response)
    } else {
        Err(Error::Connection(
            response
                .error
                .unwrap_or_else(|| "page rejected the request".to_string()),
        ))
    }
}

#[async_trait]
impl PageChannel for PageLink {
    async fn request(&self, action: Action) -> Result<Response> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let msg = tag_message(&action, "requestId", id)?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| Error::Config("page link state poisoned".to_string()))?
            .insert(id, tx);

        if self.tx.send(msg).is_err() {
            self.forget(id);
            return Err(Error::not_connected());
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::not_connected()),
            Err(_) => {
                self.forget(id);
                tracing::debug!(id, action = action.name(), "page request timed out");
                Err(Error::not_connected())
            }
        }
    }
}
