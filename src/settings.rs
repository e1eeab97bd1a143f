//! User settings that survive restarts: tool preferences per page type and the
//! best-practices analyzer configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::routes::Tool;

pub const SETTINGS_FILE: &str = "settings.toml";

/// Select the page's only tool automatically.
pub const AUTO_SINGLE: &str = "auto-single";
/// Always show the tool picker.
pub const ALWAYS_SHOW: &str = "always-show";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisToggles {
    pub enable_bot_analysis: bool,
    pub enable_credential_detection: bool,
    pub enable_object_references: bool,
    pub enable_activity_summary: bool,
    pub enable_code_detection: bool,
    pub enable_sensitive_data_detection: bool,
    pub enable_description_check: bool,
    pub enable_script_pattern_detection: bool,
}

impl Default for AnalysisToggles {
    fn default() -> Self {
        Self {
            enable_bot_analysis: true,
            enable_credential_detection: true,
            enable_object_references: true,
            enable_activity_summary: true,
            enable_code_detection: true,
            enable_sensitive_data_detection: true,
            enable_description_check: true,
            enable_script_pattern_detection: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BestPracticeRules {
    pub try_catch: bool,
    pub step: bool,
    pub comment: bool,
    pub timeout_zero: bool,
    pub priority_medium: bool,
    pub max_line_of_code: u32,
    pub max_variable_count: u32,
    pub bot_code_version: u32,
}

impl Default for BestPracticeRules {
    fn default() -> Self {
        Self {
            try_catch: true,
            step: true,
            comment: true,
            timeout_zero: true,
            priority_medium: true,
            max_line_of_code: 300,
            max_variable_count: 50,
            bot_code_version: 5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionRules {
    pub empty_containers_disallowed: bool,
    pub disabled_actions_disallowed: bool,
    pub out_of_err_handling_disallowed: bool,
    pub msg_box_disallowed: bool,
    pub delay_disallowed: bool,
    pub code_break_disallowed: bool,
}

impl Default for ActionRules {
    fn default() -> Self {
        Self {
            empty_containers_disallowed: true,
            disabled_actions_disallowed: true,
            out_of_err_handling_disallowed: true,
            msg_box_disallowed: true,
            delay_disallowed: true,
            code_break_disallowed: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableRules {
    pub input_pattern: String,
    pub output_pattern: String,
    pub input_output_pattern: String,
    pub variable_pattern: String,
    pub hard_coded_not_constant: bool,
    pub constant_not_capital: bool,
    pub variable_min_size: u32,
}

impl Default for VariableRules {
    fn default() -> Self {
        Self {
            input_pattern: "^I_.*".to_string(),
            output_pattern: "^O_.*".to_string(),
            input_output_pattern: "^IO_.*".to_string(),
            variable_pattern: ".*".to_string(),
            hard_coded_not_constant: true,
            constant_not_capital: true,
            variable_min_size: 2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BestPracticesConfig {
    pub best_practices: BestPracticeRules,
    pub actions: ActionRules,
    pub variables: VariableRules,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Page type to tool id, or [`AUTO_SINGLE`] / [`ALWAYS_SHOW`].
    pub tool_preferences: BTreeMap<String, String>,
    pub best_practices_settings: AnalysisToggles,
    pub best_practices: BestPracticesConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let vars = &self.best_practices.variables;
        for (name, pattern) in [
            ("inputPattern", &vars.input_pattern),
            ("outputPattern", &vars.output_pattern),
            ("inputOutputPattern", &vars.input_output_pattern),
            ("variablePattern", &vars.variable_pattern),
        ] {
            Regex::new(pattern)
                .map_err(|e| Error::InvalidSetting(format!("{name} is not a valid pattern: {e}")))?;
        }
        Ok(())
    }

    /// Applies a partial JSON document over these settings. Objects merge
    /// key by key; any other value replaces what was there.
    pub fn merged(&self, patch: &Value) -> Result<Settings> {
        let mut current = serde_json::to_value(self)?;
        merge_json(&mut current, patch);
        let merged: Settings = serde_json::from_value(current)
            .map_err(|e| Error::InvalidSetting(e.to_string()))?;
        merged.validate()?;
        Ok(merged)
    }

    /// The tool to open automatically on a page of `page_type`, if any.
    pub fn default_tool_for(&self, page_type: &str, tools: &[Tool]) -> Option<&'static str> {
        match self.tool_preferences.get(page_type).map(String::as_str) {
            Some(AUTO_SINGLE) if tools.len() == 1 => Some(tools[0].id),
            Some(ALWAYS_SHOW) | Some(AUTO_SINGLE) | None => None,
            Some(id) => tools.iter().find(|t| t.id == id).map(|t| t.id),
        }
    }
}

fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Settings backed by `settings.toml`; every change is written through.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        let settings = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("error parsing {}: {}. Using defaults.", path.display(), e);
                Settings::default()
            })
        } else {
            Settings::default()
        };
        Ok(Self { path, settings })
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    fn save(&self) -> Result<()> {
        fs::write(&self.path, toml::to_string_pretty(&self.settings)?)?;
        Ok(())
    }

    fn replace(&mut self, settings: Settings) -> Result<&Settings> {
        settings.validate()?;
        self.settings = settings;
        self.save()?;
        Ok(&self.settings)
    }

    pub fn update(&mut self, patch: &Value) -> Result<&Settings> {
        let merged = self.settings.merged(patch)?;
        self.replace(merged)
    }

    pub fn set_tool_preference(&mut self, page_type: &str, tool_id: &str) -> Result<&Settings> {
        let mut settings = self.settings.clone();
        settings
            .tool_preferences
            .insert(page_type.to_string(), tool_id.to_string());
        self.replace(settings)
    }

    pub fn tool_preference(&self, page_type: &str) -> Option<&str> {
        self.settings.tool_preferences.get(page_type).map(String::as_str)
    }

    pub fn reset(&mut self) -> Result<&Settings> {
        self.replace(Settings::default())
    }
}
