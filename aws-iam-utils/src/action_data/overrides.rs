//! Local corrections layered over the upstream action database
//!
//! Entries are keyed by `service:action`; keys are lowercased on load so lookups are
//! case-insensitive. An entry must carry an access level and may omit everything else,
//! in which case the missing fields are taken from the upstream record.

use super::AccessLevel;
use crate::errors::{PolicyError, Result};
use rust_embed::RustEmbed;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "resources/config"]
#[include = "action-overrides.json"]
struct ConfigFiles;

const OVERRIDES_FILE: &str = "action-overrides.json";

/// One override entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionOverride {
    pub access_level: AccessLevel,
    /// Canonical action name (without the service prefix)
    #[serde(default)]
    pub action: Option<String>,
    /// ARN types the action applies to; `None` keeps the upstream value
    #[serde(default)]
    pub arn_types: Option<Vec<String>>,
    #[serde(default)]
    pub api_documentation_link: Option<String>,
}

impl ActionOverride {
    /// Create an override that only sets the access level
    #[must_use]
    pub fn new(access_level: AccessLevel) -> Self {
        Self {
            access_level,
            action: None,
            arn_types: None,
            api_documentation_link: None,
        }
    }

    /// Set the ARN types
    #[must_use]
    pub fn with_arn_types(mut self, arn_types: Vec<String>) -> Self {
        self.arn_types = Some(arn_types);
        self
    }
}

/// Override table keyed by lowercased `service:action`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOverrides {
    entries: BTreeMap<String, ActionOverride>,
}

impl ActionOverrides {
    /// An empty override table
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the override table shipped with the library
    pub fn embedded() -> Result<Self> {
        let file = ConfigFiles::get(OVERRIDES_FILE)
            .ok_or_else(|| PolicyError::data_load(OVERRIDES_FILE, "embedded file not found"))?;
        let json = std::str::from_utf8(&file.data)
            .map_err(|e| PolicyError::data_load(OVERRIDES_FILE, e.to_string()))?;
        Self::from_json(json).map_err(|e| match e {
            PolicyError::Json(e) => PolicyError::data_load(OVERRIDES_FILE, e.to_string()),
            other => other,
        })
    }

    /// Parse an override table from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, ActionOverride> = serde_json::from_str(json)?;
        Self::from_entries(raw)
    }

    /// Build an override table from `service:action` keyed entries
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, ActionOverride)>,
    ) -> Result<Self> {
        let mut table = Self::default();

        for (key, mut entry) in entries {
            let (_, action) = key
                .split_once(':')
                .ok_or_else(|| PolicyError::malformed_action(key.as_str()))?;
            if entry.action.is_none() {
                entry.action = Some(action.to_string());
            }
            table.entries.insert(key.to_lowercase(), entry);
        }

        log::debug!("Loaded {} action overrides", table.entries.len());
        Ok(table)
    }

    /// Look up the override for an action, case-insensitively
    pub fn get(&self, service: &str, action: &str) -> Option<&ActionOverride> {
        let key = format!("{}:{}", service, action).to_lowercase();
        self.entries.get(&key)
    }

    /// Override entries belonging to a service, ordered by key
    pub fn for_service<'a>(
        &'a self,
        service: &str,
    ) -> impl Iterator<Item = &'a ActionOverride> + 'a {
        let prefix = format!("{}:", service.to_lowercase());
        self.entries
            .iter()
            .filter(move |(key, _)| key.starts_with(&prefix))
            .map(|(_, entry)| entry)
    }

    /// Lowercased `service:action` keys, in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
