//! Building, combining and collapsing policy documents

use crate::canonical::hash_optional_json;
use crate::document::{Effect, OneOrMany, PolicyDocument, Statement, DEFAULT_POLICY_VERSION};
use crate::errors::Result;
use crate::extraction::{extract_permission_items, PermissionItem};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// Wrap statements into a policy with the default version
pub fn build_policy(statements: impl IntoIterator<Item = Statement>) -> PolicyDocument {
    build_policy_with_version(DEFAULT_POLICY_VERSION, statements)
}

/// Wrap statements into a policy with the given version
pub fn build_policy_with_version(
    version: &str,
    statements: impl IntoIterator<Item = Statement>,
) -> PolicyDocument {
    PolicyDocument::with_version(version, statements.into_iter().collect())
}

/// Concatenate the statements of all policies in input order.
///
/// The result adopts the version of the first policy; no policies yields an empty
/// policy with the default version.
pub fn combine_policies<'a>(
    policies: impl IntoIterator<Item = &'a PolicyDocument>,
) -> PolicyDocument {
    let mut policies = policies.into_iter().peekable();
    let version = policies
        .peek()
        .map(|p| p.version.clone())
        .unwrap_or_else(|| DEFAULT_POLICY_VERSION.to_string());

    let statements = policies.flat_map(|p| p.statement.iter().cloned());
    build_policy_with_version(&version, statements)
}

/// Combine policies and merge statements that share effect, resource, condition and
/// principal into one statement per group.
///
/// Groups appear in order of first occurrence and each group's action list keeps the
/// first occurrence of every action.
pub fn collapse_policies<'a>(
    policies: impl IntoIterator<Item = &'a PolicyDocument>,
) -> Result<PolicyDocument> {
    let combined = combine_policies(policies);
    let items = extract_permission_items(&combined)?;
    Ok(collapse_items(&combined.version, &items))
}

/// Grouping key for collapse; equal JSON mappings hash equally regardless of key order.
#[derive(Debug, PartialEq, Eq)]
struct GroupKey<'a> {
    effect: Effect,
    condition: Option<&'a Value>,
    resource: Option<&'a str>,
    principal: Option<&'a Value>,
}

impl Hash for GroupKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.effect.hash(state);
        hash_optional_json(self.condition, state);
        self.resource.hash(state);
        hash_optional_json(self.principal, state);
    }
}

pub(crate) fn collapse_items(version: &str, items: &[PermissionItem]) -> PolicyDocument {
    let mut groups: Vec<(GroupKey<'_>, Vec<&str>)> = Vec::new();
    let mut index: HashMap<GroupKey<'_>, usize> = HashMap::new();

    for item in items {
        let key = GroupKey {
            effect: item.effect,
            condition: item.condition.as_ref(),
            resource: item.resource.as_deref(),
            principal: item.principal.as_ref(),
        };
        let position = *index.entry(key).or_insert_with(|| {
            groups.push((
                GroupKey {
                    effect: item.effect,
                    condition: item.condition.as_ref(),
                    resource: item.resource.as_deref(),
                    principal: item.principal.as_ref(),
                },
                Vec::new(),
            ));
            groups.len() - 1
        });

        let actions = &mut groups[position].1;
        if !actions.contains(&item.action.as_str()) {
            actions.push(&item.action);
        }
    }

    let statements = groups.into_iter().map(|(key, actions)| {
        let mut statement = Statement::new(key.effect, actions);
        statement.resource = key.resource.map(OneOrMany::from);
        statement.condition = key.condition.cloned();
        statement.principal = key.principal.cloned();
        statement
    });

    build_policy_with_version(version, statements)
}

/// Remove duplicate actions, resources and AWS/Service principals from every statement,
/// keeping the first occurrence of each.
pub fn dedupe_policy(policy: &PolicyDocument) -> PolicyDocument {
    let mut deduped = policy.clone();

    for statement in &mut deduped.statement {
        for field in [
            &mut statement.action,
            &mut statement.not_action,
            &mut statement.resource,
            &mut statement.not_resource,
        ] {
            if let Some(OneOrMany::Many(values)) = field {
                *values = dedupe_strings(values);
            }
        }

        if let Some(Value::Object(principal)) = &mut statement.principal {
            for key in ["AWS", "Service"] {
                if let Some(Value::Array(values)) = principal.get_mut(key) {
                    let mut seen = HashSet::new();
                    values.retain(|v| seen.insert(v.to_string()));
                }
            }
        }
    }

    deduped
}

fn dedupe_strings(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}
