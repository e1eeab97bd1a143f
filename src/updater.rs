//! Rewrites the package versions embedded in bots to the server's defaults.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::api::{ApiClient, BotContent};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "error")]
pub enum UpdateStatus {
    Updating,
    Success,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub file_id: String,
    pub error: String,
}

/// Every input id lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub success: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedItem>,
}

impl UpdateReport {
    pub fn len(&self) -> usize {
        self.success.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum Outcome {
    Updated(usize),
    NoPackages,
    UpToDate,
}

/// Sets each package with a known default to that version. Returns how many changed.
pub fn apply_default_versions(content: &mut BotContent, defaults: &HashMap<String, String>) -> usize {
    let Some(packages) = content.packages_mut() else {
        return 0;
    };

    let mut changed = 0;
    for package in packages.iter_mut() {
        let Some(name) = package.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(default_version) = defaults.get(name) else {
            continue;
        };
        if package.get("version").and_then(Value::as_str) == Some(default_version.as_str()) {
            continue;
        }
        if let Some(obj) = package.as_object_mut() {
            obj.insert("version".to_string(), Value::String(default_version.clone()));
            changed += 1;
        }
    }
    changed
}

pub async fn fetch_default_versions(api: &ApiClient) -> Result<HashMap<String, String>> {
    let versions = api.list_default_package_versions().await?;
    Ok(versions
        .list
        .into_iter()
        .map(|entry| (entry.name, entry.default_version))
        .collect())
}

async fn update_one(
    api: &ApiClient,
    file_id: &str,
    defaults: &HashMap<String, String>,
) -> Result<Outcome> {
    let mut content = api.get_bot_content(file_id).await?;
    if !content.has_packages() {
        return Ok(Outcome::NoPackages);
    }

    let changed = apply_default_versions(&mut content, defaults);
    if changed == 0 {
        return Ok(Outcome::UpToDate);
    }

    api.put_bot_content(file_id, &content).await?;
    Ok(Outcome::Updated(changed))
}

/// Updates every bot in `file_ids`, one after another, in input order.
///
/// Fails as a whole only when the default versions cannot be fetched; in that
/// case no bot is read or written. Per-bot failures are reported in the result.
pub async fn update_packages<F>(
    api: &ApiClient,
    file_ids: &[String],
    mut on_progress: F,
) -> Result<UpdateReport>
where
    F: FnMut(&str, &UpdateStatus),
{
    let defaults = fetch_default_versions(api)
        .await
        .map_err(|e| Error::DefaultVersions(Box::new(e)))?;
    tracing::info!(bots = file_ids.len(), packages = defaults.len(), "updating bot packages");

    let mut report = UpdateReport::default();
    for file_id in file_ids {
        on_progress(file_id, &UpdateStatus::Updating);

        let status = match update_one(api, file_id, &defaults).await {
            Ok(Outcome::Updated(changed)) => {
                tracing::info!(file_id = %file_id, changed, "bot packages updated");
                report.success.push(file_id.clone());
                UpdateStatus::Success
            }
            Ok(Outcome::NoPackages) => {
                tracing::debug!(file_id = %file_id, "bot has no packages");
                report.skipped.push(file_id.clone());
                UpdateStatus::Skipped
            }
            Ok(Outcome::UpToDate) => {
                tracing::debug!(file_id = %file_id, "bot packages already at default versions");
                report.skipped.push(file_id.clone());
                UpdateStatus::Skipped
            }
            Err(e) => {
                tracing::warn!(file_id = %file_id, "failed to update bot: {}", e);
                let error = e.to_string();
                report.failed.push(FailedItem {
                    file_id: file_id.clone(),
                    error: error.clone(),
                });
                UpdateStatus::Failed(error)
            }
        };
        on_progress(file_id, &status);
    }

    Ok(report)
}
