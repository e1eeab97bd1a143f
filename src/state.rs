use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};

use crate::api::ApiClient;
use crate::clipboard::ClipboardStore;
use crate::config::Config;
use crate::connection::ConnectionMonitor;
use crate::error::Result;
use crate::page::PageLink;
use crate::settings::SettingsStore;
use crate::tabs::TabStore;
use crate::transport::{HttpTransport, Transport};

pub struct AppState {
    pub config: Config,
    pub transport: Arc<dyn Transport>,
    pub page: Arc<PageLink>,
    pub api: RwLock<ApiClient>,
    pub tabs: Mutex<TabStore>,
    pub clipboard: Mutex<ClipboardStore>,
    pub settings: Mutex<SettingsStore>,
    pub connection: ConnectionMonitor,
    /// Events for local subscribers (`botSaved`, package update progress).
    pub events: broadcast::Sender<Value>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        settings: SettingsStore,
        outbound: mpsc::UnboundedSender<Value>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            page: Arc::new(PageLink::new(outbound, config.page_timeout())),
            api: RwLock::new(ApiClient::new(transport.clone())),
            tabs: Mutex::new(TabStore::new()),
            clipboard: Mutex::new(ClipboardStore::new()),
            settings: Mutex::new(settings),
            connection: ConnectionMonitor::new(config.page_timeout(), config.probe_interval()),
            transport,
            events,
            config,
        }
    }

    /// State wired to a real HTTP transport.
    pub fn with_http(
        config: Config,
        settings: SettingsStore,
        outbound: mpsc::UnboundedSender<Value>,
    ) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
        Ok(Self::new(config, transport, settings, outbound))
    }

    /// A snapshot of the API client; long operations run on the copy so the
    /// lock is never held across network calls.
    pub async fn api(&self) -> ApiClient {
        self.api.read().await.clone()
    }

    /// Publishes an event to local subscribers and the extension.
    pub fn publish(&self, event: Value) {
        let _ = self.events.send(event.clone());
        if let Err(e) = self.page.notify(event) {
            tracing::debug!("event not forwarded to extension: {}", e);
        }
    }

    /// Drops stale tab state by age, then by count.
    pub async fn sweep_tabs(&self) -> usize {
        let mut tabs = self.tabs.lock().await;
        let aged = tabs.evict_older_than(self.config.tab_max_age());
        let capped = tabs.enforce_capacity(self.config.tab_capacity);
        if aged + capped > 0 {
            tracing::debug!(aged, capped, remaining = tabs.len(), "tab state swept");
        }
        aged + capped
    }
}
