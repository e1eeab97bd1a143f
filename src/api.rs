//! Typed client for the Control Room repository and package REST API.
//!
//! All calls go through a [`Transport`], authenticated with the token the
//! page keeps in its local storage.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BASE_URL_MISSING, Error, Result};
use crate::page::PageChannel;
use crate::transport::{ApiRequest, NormalizedResponse, TASKBOT_TYPE, Transport};

pub const DIRECTORY_TYPE: &str = "application/vnd.aa.directory";
pub const AUTH_HEADER: &str = "X-Authorization";

pub const DEFAULT_PAGE_LENGTH: u32 = 200;
pub const PACKAGE_PAGE_LENGTH: u32 = 1000;

/// A single field comparison in a list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub operator: String,
    pub field: String,
    pub value: String,
}

impl Filter {
    fn compare(operator: &str, field: &str, value: &str) -> Self {
        Self {
            operator: operator.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn eq(field: &str, value: &str) -> Self {
        Self::compare("eq", field, value)
    }

    pub fn ne(field: &str, value: &str) -> Self {
        Self::compare("ne", field, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u32,
    pub length: u32,
}

/// Body of the `.../list` endpoints.
///
/// Defaults: first 200 entries sorted by name ascending, no filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sort: Vec<Sort>,
    pub page: Page,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            filter: None,
            sort: vec![Sort {
                field: "name".to_string(),
                direction: Direction::Asc,
            }],
            page: Page {
                offset: 0,
                length: DEFAULT_PAGE_LENGTH,
            },
        }
    }
}

impl ListOptions {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_filter: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedList<T> {
    #[serde(default)]
    pub page: PageInfo,
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

/// A repository entry. Fields the UI does not need are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FolderItem {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub folder: bool,
    #[serde(rename = "type")]
    pub item_type: String,
    pub path: String,
    pub size: Value,
    pub last_modified: String,
    pub last_modified_by: String,
    pub created_by: String,
    pub permission: HashMap<String, bool>,
    pub workspace_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FolderItem {
    pub fn is_directory(&self) -> bool {
        self.folder || self.item_type == DIRECTORY_TYPE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageItem {
    pub id: String,
    pub name: String,
    pub package_version: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersionEntry {
    pub name: String,
    pub default_version: String,
}

impl From<&PackageItem> for PackageVersionEntry {
    fn from(item: &PackageItem) -> Self {
        Self {
            name: item.name.clone(),
            default_version: item.package_version.clone(),
        }
    }
}

/// A bot document. Only `packages[].version` is ever rewritten; everything
/// else, including key order, is sent back as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotContent(pub Value);

impl BotContent {
    pub fn packages(&self) -> Option<&Vec<Value>> {
        self.0.get("packages").and_then(Value::as_array)
    }

    pub fn packages_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.0.get_mut("packages").and_then(Value::as_array_mut)
    }

    pub fn has_packages(&self) -> bool {
        self.packages().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CopyBody<'a> {
    name: &'a str,
    parent_id: &'a str,
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: Option<String>,
    auth_token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.auth_token.is_some())
            .finish()
    }
}

/// `scheme://host[:port]` of a tab URL.
pub fn origin_of(tab_url: &str) -> Option<String> {
    let url = url::Url::parse(tab_url).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: None,
            auth_token: None,
        }
    }

    pub fn with_credentials(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: Some(base_url.into()),
            auth_token: Some(auth_token.into()),
        }
    }

    /// Resolves the origin from the tab URL and asks the page for its token.
    ///
    /// Failures are logged and leave the client unauthenticated; the next call
    /// reports them as `Auth`/`Config` errors.
    pub async fn initialize(&mut self, tab_url: &str, page: &dyn PageChannel) {
        self.base_url = origin_of(tab_url);
        if self.base_url.is_none() {
            tracing::warn!(url = tab_url, "could not resolve Control Room origin");
        }

        self.auth_token = match page.get_auth_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("failed to get auth token from page: {}", e);
                None
            }
        };
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let token = self.auth_token.as_deref().ok_or_else(Error::not_authenticated)?;
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config(BASE_URL_MISSING.to_string()))?;
        Ok((base, token))
    }

    fn build(&self, method: &str, endpoint: &str) -> Result<ApiRequest> {
        let (base, token) = self.credentials()?;
        Ok(ApiRequest::new(method, format!("{base}{endpoint}"))
            .header("Content-Type", "application/json")
            .header(AUTH_HEADER, token))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        match self.transport.execute(request).await? {
            NormalizedResponse::Json(value) => Ok(serde_json::from_value(value)?),
            NormalizedResponse::Blob(blob) => Err(Error::Parse(format!(
                "expected JSON response, got {}",
                blob.mime_type
            ))),
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<T> {
        let request = self.build("POST", endpoint)?.body(serde_json::to_string(body)?);
        self.send_json(request).await
    }

    pub async fn list(&self, folder_id: &str, options: &ListOptions) -> Result<PagedList<FolderItem>> {
        self.post(&format!("/v2/repository/folders/{folder_id}/list"), options)
            .await
    }

    pub async fn list_folder(
        &self,
        folder_id: &str,
        exclude_folders: bool,
    ) -> Result<PagedList<FolderItem>> {
        let mut options = ListOptions::default();
        if exclude_folders {
            options = options.with_filter(Filter::ne("type", DIRECTORY_TYPE));
        }
        self.list(folder_id, &options).await
    }

    pub async fn list_bots(&self, folder_id: &str) -> Result<PagedList<FolderItem>> {
        let options = ListOptions::default().with_filter(Filter::eq("type", TASKBOT_TYPE));
        self.list(folder_id, &options).await
    }

    pub async fn copy_file(
        &self,
        file_id: &str,
        new_name: &str,
        dest_folder_id: &str,
    ) -> Result<FolderItem> {
        let body = CopyBody {
            name: new_name,
            parent_id: dest_folder_id,
        };
        self.post(&format!("/v2/repository/files/{file_id}/copy"), &body)
            .await
    }

    pub async fn get_bot_content(&self, file_id: &str) -> Result<BotContent> {
        let request = self
            .build("GET", &format!("/v2/repository/files/{file_id}/content"))?
            .bot_content();

        match self.transport.execute(request).await? {
            NormalizedResponse::Json(value) => Ok(BotContent(value)),
            NormalizedResponse::Blob(blob) => {
                let bytes = blob.decode()?;
                serde_json::from_slice(&bytes)
                    .map(BotContent)
                    .map_err(|_| Error::Parse("Failed to parse bot content".to_string()))
            }
        }
    }

    pub async fn put_bot_content(&self, file_id: &str, content: &BotContent) -> Result<Value> {
        let request = self
            .build("PUT", &format!("/v2/repository/files/{file_id}/content"))?
            .body(serde_json::to_string(content)?);

        // Some servers answer a successful PUT with an empty or non-JSON body.
        Ok(self
            .transport
            .execute(request)
            .await?
            .into_json()
            .unwrap_or(Value::Null))
    }

    pub async fn list_default_packages(&self) -> Result<PagedList<PackageItem>> {
        let options = ListOptions {
            filter: Some(Filter::eq("status", "DEFAULT")),
            sort: Vec::new(),
            page: Page {
                offset: 0,
                length: PACKAGE_PAGE_LENGTH,
            },
        };
        self.post("/v2/packages/package/list", &options).await
    }

    pub async fn list_default_package_versions(&self) -> Result<PagedList<PackageVersionEntry>> {
        let packages = self.list_default_packages().await?;
        Ok(PagedList {
            page: packages.page,
            list: packages.list.iter().map(PackageVersionEntry::from).collect(),
        })
    }

    pub async fn download_file(&self, file_id: &str) -> Result<DownloadedFile> {
        let (base, token) = self.credentials()?;
        let request = ApiRequest::new("GET", format!("{base}/v2/repository/files/{file_id}/content"))
            .header(AUTH_HEADER, token)
            .download();

        match self.transport.execute(request).await? {
            NormalizedResponse::Blob(blob) => Ok(DownloadedFile {
                bytes: blob.decode()?,
                mime_type: blob.mime_type,
            }),
            NormalizedResponse::Json(_) => {
                Err(Error::Parse("Failed to download file".to_string()))
            }
        }
    }

    pub async fn get_credential(&self, credential_id: &str) -> Result<Value> {
        let options = ListOptions {
            filter: Some(Filter::eq("id", credential_id)),
            sort: Vec::new(),
            page: Page {
                offset: 0,
                length: 1,
            },
        };
        let found: PagedList<Value> = self
            .post("/v2/credentialvault/credentials/list", &options)
            .await?;
        found
            .list
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound("Credential".to_string()))
    }

    pub async fn get_credential_attributes(
        &self,
        credential_id: &str,
        user_id: Option<&str>,
    ) -> Result<Value> {
        let mut endpoint = format!("/v2/credentialvault/credentials/{credential_id}/attributevalues");
        if let Some(user_id) = user_id {
            endpoint.push_str(&format!("?userId={user_id}"));
        }
        let request = self.build("GET", &endpoint)?;
        self.send_json(request).await
    }
}
