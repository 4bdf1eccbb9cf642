//! Action metadata provider
//!
//! Resolves `(service, action)` pairs to their canonical name, access level and ARN
//! types. An [`ActionCatalog`] layers an [`ActionOverrides`] table over an
//! [`ActionDatabase`]; the override table always wins. Both are injected at
//! construction, so tests and callers can supply their own data.

use crate::errors::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod overrides;
mod service_reference;

pub use overrides::{ActionOverride, ActionOverrides};
pub use service_reference::ServiceReferenceDatabase;

/// ARN type denoting actions that only accept a wildcard resource
pub const WILDCARD_ARN_TYPE: &str = "*";

/// AWS access level classification of an action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessLevel {
    Read,
    List,
    Write,
    Tagging,
    #[serde(rename = "Permissions management")]
    PermissionsManagement,
}

/// Every access level, in the order AWS documents them
pub const ALL_ACCESS_LEVELS: [AccessLevel; 5] = [
    AccessLevel::Read,
    AccessLevel::List,
    AccessLevel::Write,
    AccessLevel::Tagging,
    AccessLevel::PermissionsManagement,
];

impl AccessLevel {
    /// Name as it appears in AWS documentation and action data
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::List => "List",
            Self::Write => "Write",
            Self::Tagging => "Tagging",
            Self::PermissionsManagement => "Permissions management",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "read" => Ok(Self::Read),
            "list" => Ok(Self::List),
            "write" => Ok(Self::Write),
            "tagging" => Ok(Self::Tagging),
            "permissionsmanagement" | "permissions" => Ok(Self::PermissionsManagement),
            _ => Err(format!(
                "unknown access level '{}' (expected one of: read, list, write, tagging, permissions-management)",
                s
            )),
        }
    }
}

/// Join access levels for messages
pub(crate) fn describe_levels(levels: &[AccessLevel]) -> String {
    levels
        .iter()
        .map(AccessLevel::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An action as stored in an upstream database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    /// Canonical action name without the service prefix, e.g. `GetObject`
    pub name: String,
    /// `None` when the upstream data does not classify the action
    pub access_level: Option<AccessLevel>,
    /// ARN types the action can be restricted to; empty means wildcard resource only
    pub arn_types: Vec<String>,
}

/// A resource type defined by a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnTypeEntry {
    pub name: String,
    pub arn_formats: Vec<String>,
}

/// Fully resolved action metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    /// Lowercased service prefix
    pub service: String,
    /// Canonical `service:Action` name
    pub action: String,
    pub access_level: AccessLevel,
    /// Empty for actions that only accept a wildcard resource
    pub arn_types: Vec<String>,
}

/// Read-only source of upstream action metadata
pub trait ActionDatabase: fmt::Debug + Send + Sync {
    /// Known service prefixes
    fn services(&self) -> Vec<&str>;

    /// Actions of a service in database order, `None` for unknown services
    fn service_actions(&self, service: &str) -> Option<&[ActionEntry]>;

    /// Resource types defined by a service
    fn service_arn_types(&self, service: &str) -> Option<&[ArnTypeEntry]>;

    /// Case-insensitive lookup of a single action
    fn lookup(&self, service: &str, action: &str) -> Option<&ActionEntry> {
        self.service_actions(service)?
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(action))
    }
}

/// Split a `service:action` string into its two halves
pub fn split_action(action: &str) -> Result<(&str, &str)> {
    match action.split_once(':') {
        Some((service, name)) if !service.is_empty() && !name.is_empty() => Ok((service, name)),
        _ => Err(PolicyError::malformed_action(action)),
    }
}

/// Action metadata with partially-known fields, before the access level is enforced
#[derive(Debug, Clone)]
struct ResolvedAction {
    name: String,
    access_level: Option<AccessLevel>,
    arn_types: Vec<String>,
}

/// Action metadata provider combining an upstream database with local overrides
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    database: Arc<dyn ActionDatabase>,
    overrides: Arc<ActionOverrides>,
}

impl ActionCatalog {
    /// Create a catalog from an upstream database and an override table
    #[must_use]
    pub fn new(database: Arc<dyn ActionDatabase>, overrides: Arc<ActionOverrides>) -> Self {
        let catalog = Self {
            database,
            overrides,
        };

        for key in catalog.overrides_without_upstream() {
            let service = key.split_once(':').map_or(key, |(service, _)| service);
            if catalog.database.service_actions(service).is_none() {
                log::warn!(
                    "Override {} shadows nothing: service {} is unknown upstream",
                    key,
                    service
                );
            } else {
                log::info!("Override {} adds an action missing upstream", key);
            }
        }

        catalog
    }

    /// Catalog over the embedded Service Reference data and override table
    pub fn embedded() -> Result<Self> {
        Ok(Self::new(
            Arc::new(ServiceReferenceDatabase::embedded()?),
            Arc::new(ActionOverrides::embedded()?),
        ))
    }

    /// The override table in use
    pub fn overrides(&self) -> &ActionOverrides {
        &self.overrides
    }

    /// Override keys with no matching upstream action, in key order
    pub fn overrides_without_upstream(&self) -> Vec<&str> {
        self.overrides
            .keys()
            .filter(|key| match key.split_once(':') {
                Some((service, action)) => self.database.lookup(service, action).is_none(),
                None => true,
            })
            .collect()
    }

    fn resolve(&self, service: &str, action: &str) -> Option<ResolvedAction> {
        let upstream = self.database.lookup(service, action);

        if let Some(entry) = self.overrides.get(service, action) {
            return Some(ResolvedAction {
                name: entry
                    .action
                    .clone()
                    .or_else(|| upstream.map(|u| u.name.clone()))
                    .unwrap_or_else(|| action.to_string()),
                access_level: Some(entry.access_level),
                arn_types: entry
                    .arn_types
                    .clone()
                    .or_else(|| upstream.map(|u| u.arn_types.clone()))
                    .unwrap_or_default(),
            });
        }

        upstream.map(|entry| ResolvedAction {
            name: entry.name.clone(),
            access_level: entry.access_level,
            arn_types: entry.arn_types.clone(),
        })
    }

    /// Resolve an action, consulting the override table first.
    ///
    /// Fails with [`PolicyError::UnknownAction`] when neither source knows the action
    /// and with [`PolicyError::MissingAccessLevel`] when it is known but unclassified.
    pub fn lookup(&self, service: &str, action: &str) -> Result<ActionRecord> {
        let service = service.to_lowercase();
        let resolved = self
            .resolve(&service, action)
            .ok_or_else(|| PolicyError::unknown_action(format!("{}:{}", service, action)))?;
        let access_level = resolved.access_level.ok_or_else(|| {
            PolicyError::missing_access_level(format!("{}:{}", service, resolved.name))
        })?;

        Ok(ActionRecord {
            action: format!("{}:{}", service, resolved.name),
            service,
            access_level,
            arn_types: resolved.arn_types,
        })
    }

    /// Resolve a fully-qualified `service:action` string
    pub fn lookup_qualified(&self, action: &str) -> Result<ActionRecord> {
        let (service, name) = split_action(action)?;
        self.lookup(service, name)
    }

    /// Canonical name of an action, without requiring an access level
    pub fn canonical_name(&self, service: &str, action: &str) -> Option<String> {
        self.resolve(service, action).map(|resolved| resolved.name)
    }

    /// Known service prefixes, from both the database and the override table
    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self
            .database
            .services()
            .into_iter()
            .map(str::to_string)
            .collect();
        for service in self.override_services() {
            if !services.contains(&service) {
                services.push(service);
            }
        }
        services
    }

    fn override_services(&self) -> Vec<String> {
        let mut services: Vec<String> = Vec::new();
        for key in self.overrides.keys() {
            if let Some((service, _)) = key.split_once(':') {
                if !services.iter().any(|s| s == service) {
                    services.push(service.to_string());
                }
            }
        }
        services
    }

    /// Whether the service is known
    pub fn has_service(&self, service: &str) -> bool {
        let service = service.to_lowercase();
        self.database.service_actions(&service).is_some()
            || self.overrides.for_service(&service).next().is_some()
    }

    fn ensure_service(&self, service: &str) -> Result<String> {
        let service = service.to_lowercase();
        if self.has_service(&service) {
            return Ok(service);
        }

        let suggestion = self
            .services()
            .into_iter()
            .map(|known| (strsim::levenshtein(&service, &known), known))
            .filter(|(distance, _)| *distance <= 2)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, known)| known);

        Err(PolicyError::UnknownService {
            service,
            suggestion,
        })
    }

    /// All actions of a service as canonical `service:Action` strings.
    ///
    /// Upstream actions come first in database order, followed by actions only known
    /// to the override table.
    pub fn actions_for_service(&self, service: &str) -> Result<Vec<String>> {
        let service = self.ensure_service(service)?;
        let mut actions = Vec::new();
        let mut seen = HashSet::new();

        for entry in self.database.service_actions(&service).unwrap_or_default() {
            if seen.insert(entry.name.to_lowercase()) {
                actions.push(format!("{}:{}", service, entry.name));
            }
        }

        for entry in self.overrides.for_service(&service) {
            if let Some(name) = &entry.action {
                if seen.insert(name.to_lowercase()) {
                    actions.push(format!("{}:{}", service, name));
                }
            }
        }

        Ok(actions)
    }

    /// Actions of a service that can be restricted to the given ARN type.
    ///
    /// [`WILDCARD_ARN_TYPE`] selects the actions that only accept a wildcard resource.
    pub fn actions_for_arn_type(&self, service: &str, arn_type: &str) -> Result<Vec<String>> {
        if arn_type == WILDCARD_ARN_TYPE {
            return self.actions_restricted_to_wildcard_resource_only(service);
        }

        let service = self.ensure_service(service)?;
        let mut known_type = self
            .database
            .service_arn_types(&service)
            .unwrap_or_default()
            .iter()
            .any(|t| t.name == arn_type);

        let mut actions = Vec::new();
        for action in self.actions_for_service(&service)? {
            let (_, name) = split_action(&action)?;
            if let Some(resolved) = self.resolve(&service, name) {
                if resolved.arn_types.iter().any(|t| t == arn_type) {
                    known_type = true;
                    actions.push(action);
                }
            }
        }

        if !known_type {
            return Err(PolicyError::UnknownArnType {
                service,
                arn_type: arn_type.to_string(),
            });
        }

        Ok(actions)
    }

    /// Actions of a service that accept no ARN type, only a wildcard resource
    pub fn actions_restricted_to_wildcard_resource_only(&self, service: &str) -> Result<Vec<String>> {
        let service = self.ensure_service(service)?;
        let mut actions = Vec::new();

        for action in self.actions_for_service(&service)? {
            let (_, name) = split_action(&action)?;
            if let Some(resolved) = self.resolve(&service, name) {
                if resolved.arn_types.is_empty() {
                    actions.push(action);
                }
            }
        }

        Ok(actions)
    }
}
