//! Executes HTTP requests on behalf of the extension and normalizes the
//! response into either parsed JSON or a base64 blob descriptor.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DOWNLOAD_HEADER: &str = "X-Download";
pub const BOT_CONTENT_HEADER: &str = "X-Bot-Content";

pub const JSON_TYPE: &str = "application/json";
pub const TASKBOT_TYPE: &str = "application/vnd.aa.taskbot";
pub const OCTET_STREAM: &str = "application/octet-stream";

fn default_method() -> String {
    "GET".to_string()
}

/// The `config` of an `apiRequest` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn download(self) -> Self {
        self.header(DOWNLOAD_HEADER, "true")
    }

    pub fn bot_content(self) -> Self {
        self.header(BOT_CONTENT_HEADER, "true")
    }

    fn flag(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case(name) && v == "true")
    }

    pub fn wants_download(&self) -> bool {
        self.flag(DOWNLOAD_HEADER)
    }

    pub fn is_bot_content(&self) -> bool {
        self.flag(BOT_CONTENT_HEADER)
    }
}

fn is_flag_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(DOWNLOAD_HEADER) || name.eq_ignore_ascii_case(BOT_CONTENT_HEADER)
}

/// Opaque bytes as the extension receives them: a data URL plus its type and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub blob: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: usize,
}

impl BlobDescriptor {
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            blob: format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)),
            mime_type: mime_type.to_string(),
            size: bytes.len(),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        let payload = self
            .blob
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or(&self.blob);
        STANDARD
            .decode(payload)
            .map_err(|e| Error::Parse(format!("invalid base64 blob: {e}")))
    }
}

/// Callers tell structured data from opaque bytes by the variant alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedResponse {
    Blob(BlobDescriptor),
    Json(serde_json::Value),
}

impl NormalizedResponse {
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            NormalizedResponse::Json(v) => Some(v),
            NormalizedResponse::Blob(_) => None,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<NormalizedResponse>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<NormalizedResponse> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| Error::Config(format!("invalid HTTP method: {}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            if !is_flag_header(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::debug!(method = %request.method, url = %request.url, "api request");
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let err = error_from_body(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), url = %request.url, "api request failed: {}", err);
            return Err(err);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        normalize(
            content_type.as_deref(),
            &body,
            request.wants_download(),
            request.is_bot_content(),
        )
    }
}

/// Builds the error for a failed response, preferring the server's own message.
pub fn error_from_body(status: u16, body: &[u8]) -> Error {
    let server_message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .filter(|m| !m.is_empty());

    Error::Request {
        status,
        message: server_message.unwrap_or_else(|| format!("HTTP error! status: {status}")),
    }
}

pub fn normalize(
    content_type: Option<&str>,
    body: &[u8],
    wants_download: bool,
    is_bot_content: bool,
) -> Result<NormalizedResponse> {
    let declared = content_type.unwrap_or(OCTET_STREAM);

    if content_type.is_some_and(|ct| ct.contains(JSON_TYPE)) {
        let value: serde_json::Value = if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(body)
                .map_err(|e| Error::Parse(format!("invalid JSON response: {e}")))?
        };
        if !wants_download {
            return Ok(NormalizedResponse::Json(value));
        }
        let text = serde_json::to_string_pretty(&value)?;
        return Ok(NormalizedResponse::Blob(BlobDescriptor::from_bytes(
            text.as_bytes(),
            JSON_TYPE,
        )));
    }

    if content_type.is_some_and(|ct| ct.contains(TASKBOT_TYPE)) && !is_bot_content {
        return Ok(NormalizedResponse::Blob(BlobDescriptor::from_bytes(body, declared)));
    }

    if is_bot_content {
        return match serde_json::from_slice(body) {
            Ok(value) => Ok(NormalizedResponse::Json(value)),
            Err(e) => {
                tracing::debug!("bot content is not JSON ({}), returning blob", e);
                Ok(NormalizedResponse::Blob(BlobDescriptor::from_bytes(body, declared)))
            }
        };
    }

    Ok(NormalizedResponse::Blob(BlobDescriptor::from_bytes(body, declared)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_api_request_defaults() {
        let req: ApiRequest = serde_json::from_value(json!({"url": "https://cr/x"})).unwrap();
        assert_eq!(req.method, "GET");
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
        assert!(!req.wants_download());
        assert!(!req.is_bot_content());
    }

    #[test]
    fn test_flags_read_from_headers() {
        let req = ApiRequest::new("GET", "https://cr/x").download();
        assert!(req.wants_download());
        let req = ApiRequest::new("GET", "https://cr/x").header("x-bot-content", "true");
        assert!(req.is_bot_content());
        let req = ApiRequest::new("GET", "https://cr/x").header(BOT_CONTENT_HEADER, "false");
        assert!(!req.is_bot_content());
    }

    #[test]
    fn test_blob_descriptor_shape() {
        let blob = BlobDescriptor::from_bytes(b"hello", "text/plain");
        assert_eq!(blob.blob, "data:text/plain;base64,aGVsbG8=");
        assert_eq!(blob.size, 5);
        assert_eq!(blob.decode().unwrap(), b"hello");

        let wire = serde_json::to_value(NormalizedResponse::Blob(blob)).unwrap();
        assert_eq!(wire["type"], "text/plain");
        assert_eq!(wire["size"], 5);
    }

    #[test]
    fn test_untagged_deserialize_prefers_blob_shape() {
        let blob: NormalizedResponse = serde_json::from_value(json!({
            "blob": "data:application/pdf;base64,AAE=",
            "type": "application/pdf",
            "size": 2
        }))
        .unwrap();
        assert!(matches!(blob, NormalizedResponse::Blob(_)));

        let plain: NormalizedResponse = serde_json::from_value(json!({"list": []})).unwrap();
        assert!(matches!(plain, NormalizedResponse::Json(_)));
    }

    #[test]
    fn test_error_from_body() {
        let err = error_from_body(400, br#"{"message": "Invalid filter"}"#);
        assert_eq!(err.to_string(), "Invalid filter");

        let err = error_from_body(409, br#"{"error": "Name taken", "message": "ignored"}"#);
        assert_eq!(err.to_string(), "Name taken");

        let err = error_from_body(502, b"<html>bad gateway</html>");
        assert_eq!(err.to_string(), "HTTP error! status: 502");
    }

    #[test]
    fn test_normalize_json_download_bytes_equal_serialized_text() {
        let body = br#"{"name":"bot","packages":[]}"#;
        let out = normalize(Some("application/json;charset=UTF-8"), body, true, false).unwrap();
        let NormalizedResponse::Blob(blob) = out else {
            panic!("expected blob");
        };
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        let expected = serde_json::to_string_pretty(&value).unwrap();
        assert_eq!(blob.decode().unwrap(), expected.as_bytes());
        assert_eq!(blob.mime_type, JSON_TYPE);
        assert_eq!(blob.size, expected.len());
    }

    #[test]
    fn test_normalize_bot_content_without_flag_is_blob() {
        let out = normalize(Some(TASKBOT_TYPE), br#"{"nodes":[]}"#, false, false).unwrap();
        let NormalizedResponse::Blob(blob) = out else {
            panic!("expected blob");
        };
        assert_eq!(blob.mime_type, TASKBOT_TYPE);
    }

    #[test]
    fn test_normalize_empty_json_body_is_null() {
        let out = normalize(Some(JSON_TYPE), b"", false, false).unwrap();
        assert_eq!(out, NormalizedResponse::Json(serde_json::Value::Null));
        let out = normalize(Some("application/json; charset=utf-8"), b" \n", false, false).unwrap();
        assert_eq!(out, NormalizedResponse::Json(serde_json::Value::Null));
        assert!(normalize(Some(JSON_TYPE), b"{oops", false, false).is_err());
    }

    #[test]
    fn test_normalize_bot_content_with_flag_parses() {
        let out = normalize(Some(TASKBOT_TYPE), br#"{"nodes":[]}"#, false, true).unwrap();
        assert_eq!(out, NormalizedResponse::Json(json!({"nodes": []})));
    }

    #[test]
    fn test_normalize_bot_content_unparseable_degrades_to_blob() {
        let out = normalize(Some(TASKBOT_TYPE), b"\x00\x01not json", false, true).unwrap();
        let NormalizedResponse::Blob(blob) = out else {
            panic!("expected blob");
        };
        assert_eq!(blob.decode().unwrap(), b"\x00\x01not json");

        let out = normalize(None, b"???", false, true).unwrap();
        let NormalizedResponse::Blob(blob) = out else {
            panic!("expected blob");
        };
        assert_eq!(blob.mime_type, OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_execute_json_passthrough() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/repository/folders/1/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": [{"id": "9"}]})))
            .mount(&server)
            .await;

        let req = ApiRequest::new("POST", format!("{}/v2/repository/folders/1/list", server.uri()))
            .body("{}");
        let out = transport().execute(req).await.unwrap();
        assert_eq!(out, NormalizedResponse::Json(json!({"list": [{"id": "9"}]})));
    }

    #[tokio::test]
    async fn test_execute_binary_keeps_declared_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/repository/files/3/content"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "application/pdf"))
            .mount(&server)
            .await;

        let req = ApiRequest::new("GET", format!("{}/v2/repository/files/3/content", server.uri()));
        let out = transport().execute(req).await.unwrap();
        let NormalizedResponse::Blob(blob) = out else {
            panic!("expected blob");
        };
        assert_eq!(blob.mime_type, "application/pdf");
        assert_eq!(blob.decode().unwrap(), vec![1u8, 2, 3]);
    }

    #[tokio::test]
    async fn test_execute_error_uses_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "File not found"})))
            .mount(&server)
            .await;

        let req = ApiRequest::new("GET", format!("{}/missing", server.uri()));
        let err = transport().execute(req).await.unwrap_err();
        match err {
            Error::Request { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "File not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_strips_flag_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"{}".to_vec(), TASKBOT_TYPE))
            .mount(&server)
            .await;

        let req = ApiRequest::new("GET", format!("{}/content", server.uri()))
            .header("X-Authorization", "tok")
            .bot_content();
        transport().execute(req).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].headers.get("x-bot-content").is_none());
        assert_eq!(received[0].headers.get("x-authorization").unwrap(), "tok");
    }
}
