//! Wildcard expansion and minimization of policy actions
//!
//! Expansion replaces every wildcarded action (`s3:Get*`) by the literal actions it
//! matches in the catalog; minimization goes the other way, replacing literal actions by
//! the shortest prefix wildcard that matches nothing outside the statement's action set.
//! Expanded and minimized actions are lowercased.

use crate::action_data::{split_action, ActionCatalog};
use crate::document::{OneOrMany, PolicyDocument};
use crate::errors::Result;
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::sync::Arc;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Whether an action string contains IAM wildcard characters
pub fn is_wildcard(action: &str) -> bool {
    action.contains(['*', '?'])
}

/// Compile an IAM action pattern. Only `*` and `?` are special in IAM, so brackets
/// are escaped and runs of `*` (which `glob` would read as `**`) are folded into one
/// before handing the pattern to `glob`.
fn compile(pattern: &str) -> Result<Pattern> {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '[' => escaped.push_str("[[]"),
            ']' => escaped.push_str("[]]"),
            '*' if escaped.ends_with('*') => {}
            _ => escaped.push(c),
        }
    }
    Ok(Pattern::new(&escaped)?)
}

/// Case-insensitive IAM wildcard match of `action` against `pattern`
pub fn action_matches(pattern: &str, action: &str) -> bool {
    compile(pattern).is_ok_and(|p| p.matches_with(action, MATCH_OPTIONS))
}

/// Expands and minimizes wildcard actions against an action catalog
#[derive(Debug, Clone)]
pub struct WildcardExpander {
    catalog: Arc<ActionCatalog>,
}

impl WildcardExpander {
    #[must_use]
    pub fn new(catalog: Arc<ActionCatalog>) -> Self {
        Self { catalog }
    }

    /// Known actions matching a pattern, lowercased, in catalog order
    fn matching_actions(&self, pattern: &str) -> Result<Vec<String>> {
        let (service_pattern, action_pattern) = match pattern.split_once(':') {
            Some(parts) => parts,
            None if pattern == "*" => ("*", "*"),
            None => return Ok(Vec::new()),
        };

        let services: Vec<String> = if is_wildcard(service_pattern) {
            let service_glob = compile(service_pattern)?;
            self.catalog
                .services()
                .into_iter()
                .filter(|s| service_glob.matches_with(s, MATCH_OPTIONS))
                .collect()
        } else if self.catalog.has_service(service_pattern) {
            vec![service_pattern.to_lowercase()]
        } else {
            Vec::new()
        };

        let action_glob = compile(action_pattern)?;
        let mut matches = Vec::new();
        for service in services {
            for action in self.catalog.actions_for_service(&service)? {
                let (_, name) = split_action(&action)?;
                if action_glob.matches_with(name, MATCH_OPTIONS) {
                    matches.push(action.to_lowercase());
                }
            }
        }
        Ok(matches)
    }

    /// Expand one action pattern into the lowercased literal actions it matches.
    ///
    /// Literal actions are returned lowercased as they are. A pattern matching no
    /// known action is kept verbatim (lowercased) so that it still shows up, and fails
    /// lookups, in later checks.
    pub fn expand_wildcard_action(&self, pattern: &str) -> Result<Vec<String>> {
        if !is_wildcard(pattern) {
            return Ok(vec![pattern.to_lowercase()]);
        }

        let matches = self.matching_actions(pattern)?;
        if matches.is_empty() {
            log::warn!("Wildcard action {} matches no known action", pattern);
            return Ok(vec![pattern.to_lowercase()]);
        }
        Ok(matches)
    }

    fn expand_field(&self, field: Option<&OneOrMany>) -> Result<Option<OneOrMany>> {
        let Some(field) = field else {
            return Ok(None);
        };

        let mut seen = HashSet::new();
        let mut expanded = Vec::new();
        for action in field.iter() {
            for literal in self.expand_wildcard_action(action)? {
                if seen.insert(literal.clone()) {
                    expanded.push(literal);
                }
            }
        }
        Ok(Some(OneOrMany::Many(expanded)))
    }

    /// Replace every wildcarded action of every statement with its literal matches
    pub fn expand(&self, policy: &PolicyDocument) -> Result<PolicyDocument> {
        let mut expanded = policy.clone();
        for statement in &mut expanded.statement {
            statement.action = self.expand_field(statement.action.as_ref())?;
            statement.not_action = self.expand_field(statement.not_action.as_ref())?;
        }
        Ok(expanded)
    }

    /// Replace literal actions with prefix wildcards where that grants nothing more.
    ///
    /// For every action the shortest prefix is chosen whose wildcard expands to a
    /// non-empty subset of the statement's expanded actions. Actions unknown to the
    /// catalog stay literal.
    pub fn minimize(&self, policy: &PolicyDocument) -> Result<PolicyDocument> {
        let mut minimized = policy.clone();
        for statement in &mut minimized.statement {
            if let Some(actions) = self.expand_field(statement.action.as_ref())? {
                statement.action = Some(OneOrMany::Many(self.minimize_actions(&actions.to_vec())?));
            }
        }
        Ok(minimized)
    }

    fn minimize_actions(&self, actions: &[String]) -> Result<Vec<String>> {
        let action_set: HashSet<&str> = actions.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let mut minimized = Vec::new();

        for action in actions {
            let replacement = self.shortest_covering_prefix(action, &action_set)?;
            if seen.insert(replacement.clone()) {
                minimized.push(replacement);
            }
        }

        Ok(minimized)
    }

    fn shortest_covering_prefix(&self, action: &str, action_set: &HashSet<&str>) -> Result<String> {
        let Ok((service, name)) = split_action(action) else {
            return Ok(action.to_string());
        };
        if is_wildcard(name) {
            return Ok(action.to_string());
        }

        for (end, _) in name.char_indices().chain(std::iter::once((name.len(), ' '))) {
            let candidate = format!("{}:{}*", service, &name[..end]);
            let matches = self.matching_actions(&candidate)?;
            if !matches.is_empty() && matches.iter().all(|m| action_set.contains(m.as_str())) {
                return Ok(candidate);
            }
        }

        Ok(action.to_string())
    }
}
