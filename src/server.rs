//! Loopback HTTP surface for the side panel UI.

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;

use crate::api::{BotContent, FolderItem};
use crate::clipboard::folder_id_from_url;
use crate::error::Error;
use crate::page::PageChannel;
use crate::protocol::Response as Envelope;
use crate::routes::{self, PageType, RouteTable, Tool};
use crate::settings::Settings;
use crate::state::SharedState;
use crate::tabs::{TabState, TabUpdate};
use crate::updater::{self, UpdateReport, UpdateStatus};

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Auth(_) => StatusCode::UNAUTHORIZED,
        Error::Config(_) => StatusCode::PRECONDITION_FAILED,
        Error::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Request { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidSetting(_) | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::DefaultVersions(_) | Error::Http(_) | Error::Parse(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(Envelope::failure(&self.0))).into_response()
    }
}

type HandlerResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/context", post(set_context))
        .route("/tools", get(all_tools))
        .route("/tools/:page_type", get(tools_for_page))
        .route("/folders/:id", get(list_folder))
        .route("/folders/:id/bots", get(list_bots))
        .route("/files/:id/copy", post(copy_file))
        .route("/files/:id/content", get(get_content).put(put_content))
        .route("/files/:id/download", get(download_file))
        .route("/packages/update", post(update_packages))
        .route("/credentials/:id", get(get_credential))
        .route("/credentials/:id/attributes", get(get_credential_attributes))
        .route(
            "/clipboard",
            get(get_clipboard).post(copy_to_clipboard).delete(clear_clipboard),
        )
        .route("/clipboard/paste", post(paste))
        .route("/tabs/tool", put(select_tool))
        .route("/tabs/tool-state/:tool_id", get(get_tool_state).put(put_tool_state))
        .route("/page/click-line", post(click_line))
        .route("/page/open-variable", post(open_variable))
        .route("/page/refresh-folder-list", post(refresh_folder_list))
        .route("/page/open-side-panel", post(open_side_panel))
        .route(
            "/settings",
            get(get_settings).put(update_settings).delete(reset_settings),
        )
        .route("/settings/tool-preferences/:page_type", put(set_tool_preference))
        .route("/events", get(events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connected": state.connection.is_connected(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn active_tab(state: &SharedState) -> Result<TabState, Error> {
    state
        .tabs
        .lock()
        .await
        .active()
        .cloned()
        .ok_or_else(|| Error::NotFound("Active tab".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextRequest {
    window_id: i64,
    tab_id: i64,
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextResponse {
    context: crate::routes::PageContext,
    tools: Vec<Tool>,
    default_tool_id: Option<&'static str>,
    selected_tool_id: Option<String>,
    authenticated: bool,
    connected: bool,
    can_paste: bool,
}

/// Called by the panel whenever the active tab changes or navigates.
async fn set_context(
    State(state): State<SharedState>,
    Json(req): Json<ContextRequest>,
) -> HandlerResult<ContextResponse> {
    let hostname = url::Url::parse(&req.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let tab = {
        let mut tabs = state.tabs.lock().await;
        tabs.set_active(req.window_id, req.tab_id);
        tabs.update(
            req.window_id,
            req.tab_id,
            TabUpdate {
                url: Some(req.url.clone()),
                hostname: Some(hostname),
                ..Default::default()
            },
        )
        .clone()
    };

    let table = RouteTable::builtin();
    let route = table.resolve(&req.url);
    let tools = route.map(|r| r.tools.clone()).unwrap_or_default();
    let default_tool_id = match route {
        Some(r) => state
            .settings
            .lock()
            .await
            .get()
            .default_tool_for(r.page_type.as_str(), &r.tools),
        None => None,
    };

    let mut api = state.api().await;
    api.initialize(&req.url, state.page.as_ref()).await;
    let authenticated = api.is_authenticated();
    *state.api.write().await = api;

    let can_paste = state.clipboard.lock().await.can_paste(&tab);

    Ok(Json(ContextResponse {
        context: table.page_context(&req.url),
        tools,
        default_tool_id,
        selected_tool_id: tab.selected_tool_id,
        authenticated,
        connected: state.connection.is_connected(),
        can_paste,
    }))
}

async fn all_tools() -> Json<Vec<Tool>> {
    Json(routes::all_tools())
}

async fn tools_for_page(Path(page_type): Path<String>) -> HandlerResult<Vec<Tool>> {
    let page_type: PageType = page_type.parse().map_err(Error::InvalidRequest)?;
    Ok(Json(routes::tools_for(page_type).to_vec()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListQuery {
    exclude_folders: bool,
}

async fn list_folder(
    State(state): State<SharedState>,
    Path(folder_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> HandlerResult<crate::api::PagedList<FolderItem>> {
    let list = state
        .api()
        .await
        .list_folder(&folder_id, query.exclude_folders)
        .await?;
    Ok(Json(list))
}

async fn list_bots(
    State(state): State<SharedState>,
    Path(folder_id): Path<String>,
) -> HandlerResult<crate::api::PagedList<FolderItem>> {
    Ok(Json(state.api().await.list_bots(&folder_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyRequest {
    name: String,
    parent_id: String,
}

async fn copy_file(
    State(state): State<SharedState>,
    Path(file_id): Path<String>,
    Json(req): Json<CopyRequest>,
) -> HandlerResult<FolderItem> {
    let item = state
        .api()
        .await
        .copy_file(&file_id, &req.name, &req.parent_id)
        .await?;
    Ok(Json(item))
}

async fn get_content(
    State(state): State<SharedState>,
    Path(file_id): Path<String>,
) -> HandlerResult<BotContent> {
    Ok(Json(state.api().await.get_bot_content(&file_id).await?))
}

async fn put_content(
    State(state): State<SharedState>,
    Path(file_id): Path<String>,
    Json(content): Json<BotContent>,
) -> HandlerResult<Value> {
    let ack = state.api().await.put_bot_content(&file_id, &content).await?;
    Ok(Json(ack))
}

async fn download_file(
    State(state): State<SharedState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state.api().await.download_file(&file_id).await?;
    Ok(([(header::CONTENT_TYPE, file.mime_type)], file.bytes).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    file_ids: Vec<String>,
}

fn progress_event(file_id: &str, status: &UpdateStatus) -> Value {
    let mut event = serde_json::to_value(status).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut event {
        map.insert("type".to_string(), json!("packageUpdateProgress"));
        map.insert("fileId".to_string(), json!(file_id));
    }
    event
}

async fn update_packages(
    State(state): State<SharedState>,
    Json(req): Json<UpdateRequest>,
) -> HandlerResult<UpdateReport> {
    let api = state.api().await;
    let report = updater::update_packages(&api, &req.file_ids, |file_id, status| {
        state.publish(progress_event(file_id, status));
    })
    .await?;
    Ok(Json(report))
}

async fn get_credential(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> HandlerResult<Value> {
    Ok(Json(state.api().await.get_credential(&id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AttributesQuery {
    user_id: Option<String>,
}

async fn get_credential_attributes(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<AttributesQuery>,
) -> HandlerResult<Value> {
    let attributes = state
        .api()
        .await
        .get_credential_attributes(&id, query.user_id.as_deref())
        .await?;
    Ok(Json(attributes))
}

async fn get_clipboard(State(state): State<SharedState>) -> HandlerResult<Value> {
    let tab = active_tab(&state).await?;
    let clipboard = state.clipboard.lock().await;
    Ok(Json(json!({
        "clipboard": clipboard.current(&tab),
        "canPaste": clipboard.can_paste(&tab),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClipboardCopyRequest {
    file_ids: BTreeSet<String>,
    #[serde(default)]
    file_names: BTreeMap<String, String>,
    folder_id: Option<String>,
}

async fn copy_to_clipboard(
    State(state): State<SharedState>,
    Json(req): Json<ClipboardCopyRequest>,
) -> HandlerResult<Value> {
    let tab = active_tab(&state).await?;
    let folder_id = req
        .folder_id
        .or_else(|| folder_id_from_url(&tab.url).map(str::to_string))
        .ok_or_else(|| Error::InvalidRequest("not on a folder page".to_string()))?;

    let mut clipboard = state.clipboard.lock().await;
    if !clipboard.copy(&tab, req.file_ids, req.file_names, &folder_id) {
        return Err(Error::InvalidRequest("active tab has no hostname".to_string()).into());
    }
    Ok(Json(json!({
        "clipboard": clipboard.current(&tab),
        "canPaste": clipboard.can_paste(&tab),
    })))
}

async fn clear_clipboard(State(state): State<SharedState>) -> HandlerResult<Envelope> {
    let tab = active_tab(&state).await?;
    state.clipboard.lock().await.clear(&tab);
    Ok(Json(Envelope::ok()))
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasteReport {
    copied: Vec<FolderItem>,
    failed: Vec<updater::FailedItem>,
}

/// Copies every clipboard file into the active folder, one at a time.
async fn paste(State(state): State<SharedState>) -> HandlerResult<PasteReport> {
    let tab = active_tab(&state).await?;
    let entry = {
        let clipboard = state.clipboard.lock().await;
        if !clipboard.can_paste(&tab) {
            return Err(Error::InvalidRequest("nothing to paste in this folder".to_string()).into());
        }
        clipboard.current(&tab).cloned()
    }
    .ok_or_else(|| Error::InvalidRequest("clipboard is empty".to_string()))?;

    let destination = folder_id_from_url(&tab.url)
        .ok_or_else(|| Error::InvalidRequest("not on a folder page".to_string()))?;
    let api = state.api().await;

    let mut report = PasteReport::default();
    for file_id in &entry.copied_file_ids {
        let name = entry.file_name(file_id).unwrap_or(file_id);
        match api.copy_file(file_id, name, destination).await {
            Ok(item) => report.copied.push(item),
            Err(e) => {
                tracing::warn!(file_id = %file_id, "paste failed: {}", e);
                report.failed.push(updater::FailedItem {
                    file_id: file_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    if !report.copied.is_empty() {
        if let Err(e) = state.page.refresh_folder_list().await {
            tracing::debug!("folder list not refreshed: {}", e);
        }
    }
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectToolRequest {
    tool_id: Option<String>,
}

async fn select_tool(
    State(state): State<SharedState>,
    Json(req): Json<SelectToolRequest>,
) -> HandlerResult<TabState> {
    let mut tabs = state.tabs.lock().await;
    let tab = tabs
        .set_selected_tool(req.tool_id)
        .cloned()
        .ok_or_else(|| Error::NotFound("Active tab".to_string()))?;
    Ok(Json(tab))
}

async fn get_tool_state(
    State(state): State<SharedState>,
    Path(tool_id): Path<String>,
) -> Json<Value> {
    let tabs = state.tabs.lock().await;
    Json(tabs.tool_state(&tool_id).cloned().unwrap_or(Value::Null))
}

async fn put_tool_state(
    State(state): State<SharedState>,
    Path(tool_id): Path<String>,
    Json(value): Json<Value>,
) -> HandlerResult<Envelope> {
    let mut tabs = state.tabs.lock().await;
    tabs.update_tool_state(&tool_id, value)
        .ok_or_else(|| Error::NotFound("Active tab".to_string()))?;
    Ok(Json(Envelope::ok()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClickLineRequest {
    line_number: u32,
}

async fn click_line(
    State(state): State<SharedState>,
    Json(req): Json<ClickLineRequest>,
) -> HandlerResult<Value> {
    let success = state.page.click_line(req.line_number).await?;
    Ok(Json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenVariableRequest {
    variable_name: String,
}

async fn open_variable(
    State(state): State<SharedState>,
    Json(req): Json<OpenVariableRequest>,
) -> HandlerResult<Value> {
    let success = state.page.open_variable(&req.variable_name).await?;
    Ok(Json(json!({ "success": success })))
}

async fn refresh_folder_list(State(state): State<SharedState>) -> HandlerResult<Envelope> {
    state.page.refresh_folder_list().await?;
    Ok(Json(Envelope::ok()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidePanelRequest {
    tab_id: i64,
}

async fn open_side_panel(
    State(state): State<SharedState>,
    Json(req): Json<SidePanelRequest>,
) -> HandlerResult<Envelope> {
    state.page.open_side_panel(req.tab_id).await?;
    Ok(Json(Envelope::ok()))
}

async fn get_settings(State(state): State<SharedState>) -> Json<Settings> {
    Json(state.settings.lock().await.get().clone())
}

async fn update_settings(
    State(state): State<SharedState>,
    Json(patch): Json<Value>,
) -> HandlerResult<Settings> {
    let mut settings = state.settings.lock().await;
    Ok(Json(settings.update(&patch)?.clone()))
}

async fn reset_settings(State(state): State<SharedState>) -> HandlerResult<Settings> {
    let mut settings = state.settings.lock().await;
    Ok(Json(settings.reset()?.clone()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolPreferenceRequest {
    tool_id: String,
}

async fn set_tool_preference(
    State(state): State<SharedState>,
    Path(page_type): Path<String>,
    Json(req): Json<ToolPreferenceRequest>,
) -> HandlerResult<Settings> {
    let page_type: PageType = page_type.parse().map_err(Error::InvalidRequest)?;
    let mut settings = state.settings.lock().await;
    Ok(Json(
        settings
            .set_tool_preference(page_type.as_str(), &req.tool_id)?
            .clone(),
    ))
}

async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.events.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((Event::default().json_data(event), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagging");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::settings::SettingsStore;
    use crate::state::AppState;
    use crate::transport::{HttpTransport, TASKBOT_TYPE};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        base: String,
        http: reqwest::Client,
        _dir: tempfile::TempDir,
    }

    /// Starts the router on an ephemeral port with a fake extension that
    /// answers page requests.
    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
        let settings = SettingsStore::load(dir.path()).unwrap();
        let state = Arc::new(AppState::new(Config::default(), transport, settings, tx));

        let page_state = state.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let Some(id) = msg["requestId"].as_u64() else {
                    continue;
                };
                let response = match msg["action"].as_str() {
                    Some("getAuthToken") => Envelope {
                        success: true,
                        auth_token: Some("\"tok\"".to_string()),
                        ..Default::default()
                    },
                    Some("ping") => Envelope::pong(),
                    Some("CLICK_LINE") => Envelope {
                        success: msg["lineNumber"] == 3,
                        ..Default::default()
                    },
                    _ => Envelope::ok(),
                };
                page_state.page.resolve(id, response);
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Harness {
            base,
            http: reqwest::Client::new(),
            _dir: dir,
        }
    }

    impl Harness {
        async fn context(&self, url: &str) -> Value {
            self.http
                .post(format!("{}/context", self.base))
                .json(&json!({"windowId": 1, "tabId": 7, "url": url}))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness().await;
        let body: Value = h.http.get(format!("{}/health", h.base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_context_resolves_route_and_authenticates() {
        let h = harness().await;
        let ctx = h.context("https://cr.example.com/#/bots/repository/private/folders/5").await;
        assert_eq!(ctx["context"]["type"], "privateFolder");
        assert_eq!(ctx["context"]["folderId"], "5");
        assert_eq!(ctx["tools"].as_array().unwrap().len(), 3);
        assert_eq!(ctx["authenticated"], true);
        assert_eq!(ctx["canPaste"], false);

        let ctx = h.context("https://cr.example.com/#/dashboard").await;
        assert_eq!(ctx["context"]["type"], "unknown");
        assert!(ctx["tools"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requests_before_context_are_unauthorized() {
        let h = harness().await;
        let resp = h.http.get(format!("{}/folders/5", h.base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED.as_u16());
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["errorType"], "authentication");
    }

    #[tokio::test]
    async fn test_copy_and_paste_between_folders() {
        let cr = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/repository/files/11/copy"))
            .and(body_json(json!({"name": "Invoice Bot", "parentId": "6"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "12", "name": "Invoice Bot", "parentId": "6"})))
            .expect(1)
            .mount(&cr)
            .await;

        let h = harness().await;
        h.context(&format!("{}/#/bots/repository/private/folders/5", cr.uri())).await;

        let copied: Value = h
            .http
            .post(format!("{}/clipboard", h.base))
            .json(&json!({"fileIds": ["11"], "fileNames": {"11": "Invoice Bot"}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(copied["canPaste"], false);
        assert_eq!(copied["clipboard"]["sourceFolderId"], "5");

        let ctx = h.context(&format!("{}/#/bots/repository/private/folders/6", cr.uri())).await;
        assert_eq!(ctx["canPaste"], true);

        let report: Value = h
            .http
            .post(format!("{}/clipboard/paste", h.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["copied"][0]["id"], "12");
        assert!(report["failed"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_packages_endpoint() {
        let cr = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/packages/package/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": [{"name": "String", "packageVersion": "3.0.0", "status": "DEFAULT"}]
            })))
            .mount(&cr)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/repository/files/1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                br#"{"packages":[{"name":"String","version":"2.0.0"}]}"#.to_vec(),
                TASKBOT_TYPE,
            ))
            .mount(&cr)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v2/repository/files/1/content"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&cr)
            .await;

        let h = harness().await;
        h.context(&format!("{}/#/bots/repository/private/folders/5", cr.uri())).await;
        let report: Value = h
            .http
            .post(format!("{}/packages/update", h.base))
            .json(&json!({"fileIds": ["1"]}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report, json!({"success": ["1"], "skipped": [], "failed": []}));
    }

    #[tokio::test]
    async fn test_page_actions_relay() {
        let h = harness().await;
        let body: Value = h
            .http
            .post(format!("{}/page/click-line", h.base))
            .json(&json!({"lineNumber": 3}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], true);

        let body: Value = h
            .http
            .post(format!("{}/page/click-line", h.base))
            .json(&json!({"lineNumber": 99}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_tool_selection_needs_active_tab() {
        let h = harness().await;
        let resp = h
            .http
            .put(format!("{}/tabs/tool", h.base))
            .json(&json!({"toolId": "copy-files"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND.as_u16());

        h.context("https://cr.example.com/#/bots/repository/private/folders/5").await;
        let tab: Value = h
            .http
            .put(format!("{}/tabs/tool", h.base))
            .json(&json!({"toolId": "copy-files"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tab["selectedToolId"], "copy-files");
        assert_eq!(tab["windowId"], 1);
    }

    #[tokio::test]
    async fn test_settings_endpoints() {
        let h = harness().await;
        let resp = h
            .http
            .put(format!("{}/settings", h.base))
            .json(&json!({"bestPractices": {"variables": {"inputPattern": "("}}}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());

        let settings: Value = h
            .http
            .put(format!("{}/settings/tool-preferences/privateFolder", h.base))
            .json(&json!({"toolId": "update-packages"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(settings["toolPreferences"]["privateFolder"], "update-packages");

        let ctx = h.context("https://cr.example.com/#/bots/repository/private/folders/5").await;
        assert_eq!(ctx["defaultToolId"], "update-packages");

        let resp = h
            .http
            .put(format!("{}/settings/tool-preferences/nowhere", h.base))
            .json(&json!({"toolId": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());
    }
}
