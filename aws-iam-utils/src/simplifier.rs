//! Cosmetic policy simplification and wildcard introduction

use crate::action_data::ActionCatalog;
use crate::document::{OneOrMany, PolicyDocument};
use crate::errors::Result;
use crate::verbs::{extract_action_components, VerbSplitter};
use crate::wildcards::{is_wildcard, WildcardExpander};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

fn collapse_singleton(field: &mut Option<OneOrMany>) {
    if let Some(OneOrMany::Many(values)) = field {
        if values.len() == 1 {
            *field = values.pop().map(OneOrMany::One);
        }
    }
}

/// Turn one-element Action, Resource and AWS/Service principal lists into scalars.
///
/// Multi-element lists are left as they are.
pub fn simplify_policy(policy: &PolicyDocument) -> PolicyDocument {
    let mut simplified = policy.clone();

    for statement in &mut simplified.statement {
        collapse_singleton(&mut statement.action);
        collapse_singleton(&mut statement.resource);

        if let Some(Value::Object(principal)) = &mut statement.principal {
            for key in ["AWS", "Service"] {
                if let Some(Value::Array(values)) = principal.get_mut(key) {
                    if values.len() == 1 {
                        let value = values.remove(0);
                        principal.insert(key.to_string(), value);
                    }
                }
            }
        }
    }

    simplified
}

/// Position in a rewritten action list
enum Slot<T> {
    Literal(String),
    Group(T),
}

/// Actions sharing the words that make up `prefix`
struct WordGroup<'a> {
    service: String,
    prefix: String,
    members: Vec<(&'a str, Vec<String>)>,
}

/// Replaces groups of literal actions by wildcards that match exactly that group
#[derive(Debug, Clone)]
pub struct Simplifier {
    catalog: Arc<ActionCatalog>,
    expander: WildcardExpander,
    splitter: VerbSplitter,
}

impl Simplifier {
    #[must_use]
    pub fn new(catalog: Arc<ActionCatalog>) -> Self {
        Self::with_splitter(catalog, VerbSplitter::default())
    }

    #[must_use]
    pub fn with_splitter(catalog: Arc<ActionCatalog>, splitter: VerbSplitter) -> Self {
        Self {
            expander: WildcardExpander::new(Arc::clone(&catalog)),
            catalog,
            splitter,
        }
    }

    /// Replace each statement's actions by `service:Prefix*` wildcards where the
    /// wildcard matches exactly the actions present.
    ///
    /// Actions are grouped by service and verb; a group that does not match its verb
    /// wildcard exactly is split on the next word and retried. Wildcarded or unknown
    /// actions, and groups that never match exactly, stay literal.
    pub fn introduce_wildcards(&self, policy: &PolicyDocument) -> Result<PolicyDocument> {
        let mut rewritten = policy.clone();
        for statement in &mut rewritten.statement {
            if let Some(actions) = &statement.action {
                let actions: Vec<String> = actions.to_vec();
                statement.action = Some(OneOrMany::Many(self.wildcard_actions(&actions)?));
            }
        }
        Ok(rewritten)
    }

    fn wildcard_actions(&self, actions: &[String]) -> Result<Vec<String>> {
        let mut slots: Vec<Slot<usize>> = Vec::new();
        let mut groups: Vec<WordGroup<'_>> = Vec::new();

        for action in actions {
            let components = if is_wildcard(action) {
                None
            } else {
                extract_action_components(&self.catalog, &self.splitter, action).ok()
            };
            let Some(components) = components else {
                slots.push(Slot::Literal(action.clone()));
                continue;
            };
            let Some(verb) = components.verb().map(str::to_string) else {
                slots.push(Slot::Literal(action.clone()));
                continue;
            };

            if let Some(index) = groups
                .iter()
                .position(|g| g.service == components.service && g.prefix == verb)
            {
                groups[index].members.push((action.as_str(), components.words));
            } else {
                slots.push(Slot::Group(groups.len()));
                groups.push(WordGroup {
                    service: components.service,
                    prefix: verb,
                    members: vec![(action.as_str(), components.words)],
                });
            }
        }

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for slot in slots {
            let replacements = match slot {
                Slot::Literal(literal) => vec![literal],
                Slot::Group(index) => self.refine(&groups[index], 1)?,
            };
            for replacement in replacements {
                if seen.insert(replacement.to_lowercase()) {
                    result.push(replacement);
                }
            }
        }
        Ok(result)
    }

    /// Wildcards (or literals) covering a group whose members share `depth` words
    fn refine(&self, group: &WordGroup<'_>, depth: usize) -> Result<Vec<String>> {
        if let [(action, _)] = group.members.as_slice() {
            return Ok(vec![(*action).to_string()]);
        }

        let wildcard = format!("{}:{}*", group.service, group.prefix);
        let expansion: HashSet<String> = self
            .expander
            .expand_wildcard_action(&wildcard)?
            .into_iter()
            .collect();
        let members: HashSet<String> = group
            .members
            .iter()
            .map(|(action, _)| action.to_lowercase())
            .collect();

        if expansion == members {
            log::debug!(
                "Replacing {} actions with {}",
                group.members.len(),
                wildcard
            );
            return Ok(vec![wildcard]);
        }

        // Split on the next word; members with no further words stay literal
        let mut output: Vec<Slot<WordGroup<'_>>> = Vec::new();
        for (action, words) in &group.members {
            let Some(next) = words.get(depth) else {
                output.push(Slot::Literal((*action).to_string()));
                continue;
            };
            let prefix = format!("{}{}", group.prefix, next);
            let existing = output.iter_mut().find_map(|slot| match slot {
                Slot::Group(sub) if sub.prefix == prefix => Some(sub),
                _ => None,
            });
            match existing {
                Some(sub) => sub.members.push((*action, words.clone())),
                None => output.push(Slot::Group(WordGroup {
                    service: group.service.clone(),
                    prefix,
                    members: vec![(*action, words.clone())],
                })),
            }
        }

        let mut refined = Vec::new();
        for slot in output {
            match slot {
                Slot::Literal(literal) => refined.push(literal),
                Slot::Group(sub) => refined.extend(self.refine(&sub, depth + 1)?),
            }
        }
        Ok(refined)
    }
}
