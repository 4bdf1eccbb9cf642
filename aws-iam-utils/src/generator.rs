//! Policy generation
//!
//! Produces allow policies that grant every action of a service (optionally limited to
//! one ARN type) whose access level is among the requested levels. Service-wide
//! policies are compacted into `service:Verb*` wildcards when that stays within the
//! requested levels. Every generated policy is re-checked before it is returned; a
//! literal action list that fails the check means the action data is inconsistent,
//! which is treated as a bug and panics.

use crate::action_data::{
    describe_levels, split_action, AccessLevel, ActionCatalog, WILDCARD_ARN_TYPE,
};
use crate::checks::{PolicyChecker, LIST_ONLY_LEVELS, READ_ONLY_LEVELS, READ_WRITE_LEVELS};
use crate::combiner::build_policy;
use crate::document::{PolicyDocument, Statement};
use crate::errors::{PolicyError, Result};
use crate::verbs::VerbSplitter;
use crate::wildcards::action_matches;
use std::collections::HashSet;
use std::sync::Arc;

/// Markers that keep an action out of verb wildcards
pub const DEFAULT_LITERAL_MARKERS: [&str; 2] = ["Policy", "Tagging"];

/// Configuration of the wildcard compaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Splits action names into verbs
    pub splitter: VerbSplitter,
    /// Actions whose name contains one of these never seed a verb wildcard
    pub literal_markers: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            splitter: VerbSplitter::default(),
            literal_markers: DEFAULT_LITERAL_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }
}

/// Generates access-level bounded policies from an action catalog
#[derive(Debug, Clone)]
pub struct PolicyGenerator {
    catalog: Arc<ActionCatalog>,
    checker: PolicyChecker,
    config: GeneratorConfig,
}

impl PolicyGenerator {
    /// Create a generator with the default configuration
    #[must_use]
    pub fn new(catalog: Arc<ActionCatalog>) -> Self {
        Self::with_config(catalog, GeneratorConfig::default())
    }

    /// Create a generator with a custom configuration
    #[must_use]
    pub fn with_config(catalog: Arc<ActionCatalog>, config: GeneratorConfig) -> Self {
        Self {
            checker: PolicyChecker::new(Arc::clone(&catalog)),
            catalog,
            config,
        }
    }

    /// Keep the candidates whose access level is requested, deduplicated by name
    fn matching_actions(
        &self,
        candidates: impl IntoIterator<Item = String>,
        levels: &[AccessLevel],
    ) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut matching = Vec::new();

        for candidate in candidates {
            let record = match self.catalog.lookup_qualified(&candidate) {
                Ok(record) => record,
                Err(PolicyError::MissingAccessLevel { action }) => {
                    log::warn!("Skipping {}: no access level known", action);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if levels.contains(&record.access_level) && seen.insert(record.action.to_lowercase())
            {
                matching.push(record.action);
            }
        }

        Ok(matching)
    }

    fn literal_policy(actions: Vec<String>) -> PolicyDocument {
        build_policy([Statement::allow(actions).with_resource("*")])
    }

    /// Compact literal actions into `service:Verb*` wildcards.
    ///
    /// Actions whose name contains a literal marker do not seed wildcards; they are
    /// appended literally unless one of the produced wildcards already covers them.
    fn verb_wildcards(&self, service: &str, actions: &[String]) -> Result<Vec<String>> {
        let mut wildcards: Vec<String> = Vec::new();
        let mut held_back = Vec::new();

        for action in actions {
            let (_, name) = split_action(action)?;
            if self
                .config
                .literal_markers
                .iter()
                .any(|marker| name.contains(marker.as_str()))
            {
                held_back.push(action);
                continue;
            }

            let wildcard = format!("{}:{}*", service, self.config.splitter.verb(name));
            if !wildcards.contains(&wildcard) {
                wildcards.push(wildcard);
            }
        }

        let uncovered: Vec<String> = held_back
            .into_iter()
            .filter(|action| !wildcards.iter().any(|w| action_matches(w, action)))
            .cloned()
            .collect();
        wildcards.extend(uncovered);

        Ok(wildcards)
    }

    /// Generate a policy granting every action of `service` at one of `levels`.
    ///
    /// With `use_wildcard_verbs` the actions are compacted into verb wildcards when
    /// the result still only grants the requested levels; otherwise, or when the
    /// compaction would over-grant, the literal action list is returned.
    pub fn generate_policy_for_service(
        &self,
        service: &str,
        levels: &[AccessLevel],
        use_wildcard_verbs: bool,
    ) -> Result<PolicyDocument> {
        let service = service.to_lowercase();
        let actions =
            self.matching_actions(self.catalog.actions_for_service(&service)?, levels)?;
        if actions.is_empty() {
            return Err(PolicyError::NoMatchingActions {
                service,
                levels: describe_levels(levels),
            });
        }

        log::debug!(
            "Generating policy for {} with {} actions at levels [{}]",
            service,
            actions.len(),
            describe_levels(levels)
        );

        if use_wildcard_verbs {
            let policy = Self::literal_policy(self.verb_wildcards(&service, &actions)?);
            let within_levels = match self.checker.has_only_access_levels(&policy, levels) {
                Ok(valid) => valid,
                // A wildcard can reach actions the literal list skipped for lack of a level
                Err(PolicyError::MissingAccessLevel { action }) => {
                    log::debug!("Verb wildcards for {} reach unclassified {}", service, action);
                    false
                }
                Err(e) => return Err(e),
            };
            if within_levels {
                return Ok(policy);
            }
            log::info!(
                "Verb wildcards for {} exceed access levels [{}], using literal actions",
                service,
                describe_levels(levels)
            );
        }

        let policy = Self::literal_policy(actions);
        let valid = self.checker.has_only_access_levels(&policy, levels)?;
        assert!(
            valid,
            "generated policy for {} grants actions outside access levels [{}]; action data is inconsistent",
            service,
            describe_levels(levels)
        );
        Ok(policy)
    }

    /// Read and List actions of a service
    pub fn generate_read_only_policy_for_service(&self, service: &str) -> Result<PolicyDocument> {
        self.generate_policy_for_service(service, &READ_ONLY_LEVELS, true)
    }

    /// List actions of a service
    pub fn generate_list_only_policy_for_service(&self, service: &str) -> Result<PolicyDocument> {
        self.generate_policy_for_service(service, &LIST_ONLY_LEVELS, true)
    }

    /// Read, List and Write actions of a service
    pub fn generate_read_write_policy_for_service(&self, service: &str) -> Result<PolicyDocument> {
        self.generate_policy_for_service(service, &READ_WRITE_LEVELS, true)
    }

    /// Full access to each of the services: one `service:*` action per service
    pub fn generate_full_policy_for_service(&self, services: &[&str]) -> PolicyDocument {
        let actions: Vec<String> = services
            .iter()
            .map(|service| format!("{}:*", service.to_lowercase()))
            .collect();
        Self::literal_policy(actions)
    }

    /// Generate a policy granting the actions of `service` that apply to `arn_type`
    /// at one of `levels`.
    ///
    /// With `include_service_wide_actions`, actions that only accept a wildcard
    /// resource are granted as well. The action list is always literal.
    pub fn generate_policy_for_service_arn_type(
        &self,
        service: &str,
        arn_type: &str,
        levels: &[AccessLevel],
        include_service_wide_actions: bool,
    ) -> Result<PolicyDocument> {
        let service = service.to_lowercase();
        let mut candidates = self.catalog.actions_for_arn_type(&service, arn_type)?;
        let mut arn_types = vec![arn_type];
        if include_service_wide_actions && arn_type != WILDCARD_ARN_TYPE {
            candidates.extend(
                self.catalog
                    .actions_restricted_to_wildcard_resource_only(&service)?,
            );
            arn_types.push(WILDCARD_ARN_TYPE);
        }

        let actions = self.matching_actions(candidates, levels)?;
        if actions.is_empty() {
            return Err(PolicyError::NoMatchingActions {
                service,
                levels: describe_levels(levels),
            });
        }

        log::debug!(
            "Generating policy for {} ARN type {} with {} actions",
            service,
            arn_type,
            actions.len()
        );

        let policy = Self::literal_policy(actions);
        let valid = self.checker.has_only_access_levels(&policy, levels)?
            && self
                .checker
                .has_only_arn_types(&policy, &service, &arn_types)?;
        assert!(
            valid,
            "generated policy for {} ARN type {} violates its bounds; action data is inconsistent",
            service, arn_type
        );
        Ok(policy)
    }

    /// Read and List actions of a service that apply to `arn_type`
    pub fn generate_read_only_policy_for_service_arn_type(
        &self,
        service: &str,
        arn_type: &str,
    ) -> Result<PolicyDocument> {
        self.generate_policy_for_service_arn_type(service, arn_type, &READ_ONLY_LEVELS, false)
    }

    /// List actions of a service that apply to `arn_type`
    pub fn generate_list_only_policy_for_service_arn_type(
        &self,
        service: &str,
        arn_type: &str,
    ) -> Result<PolicyDocument> {
        self.generate_policy_for_service_arn_type(service, arn_type, &LIST_ONLY_LEVELS, false)
    }

    /// Read, List and Write actions of a service that apply to `arn_type`
    pub fn generate_read_write_policy_for_service_arn_type(
        &self,
        service: &str,
        arn_type: &str,
    ) -> Result<PolicyDocument> {
        self.generate_policy_for_service_arn_type(service, arn_type, &READ_WRITE_LEVELS, false)
    }
}
