//! Mutable policy model
//!
//! A [`Policy`] holds the permission items of one or more documents and can be grown
//! incrementally before being collapsed back into a document. Items are stored as
//! extracted, so actions come back lowercased when the policy is serialized.

use crate::combiner::collapse_items;
use crate::document::{PolicyDocument, DEFAULT_POLICY_VERSION};
use crate::errors::Result;
use crate::extraction::{extract_permission_items, PermissionItem};
use crate::wildcards::action_matches;

/// How [`Policy::find_action_items`] compares actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionMatch {
    /// Case-insensitive string equality
    #[default]
    Exact,
    /// Also match when either side's wildcard covers the other
    Wildcard,
}

impl PermissionItem {
    /// Whether this item's action matches `action` under the given mode
    pub fn matches_action(&self, action: &str, mode: ActionMatch) -> bool {
        if self.action.eq_ignore_ascii_case(action) {
            return true;
        }
        match mode {
            ActionMatch::Exact => false,
            ActionMatch::Wildcard => {
                action_matches(&self.action, action) || action_matches(action, &self.action)
            }
        }
    }
}

/// Ordered collection of permission items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    version: String,
    items: Vec<PermissionItem>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new(DEFAULT_POLICY_VERSION)
    }
}

impl Policy {
    /// Create an empty policy
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            items: Vec::new(),
        }
    }

    /// Build a policy from the permission items of a document
    pub fn from_document(policy: &PolicyDocument) -> Result<Self> {
        Ok(Self {
            version: policy.version.clone(),
            items: extract_permission_items(policy)?,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn items(&self) -> &[PermissionItem] {
        &self.items
    }

    /// Append a single item, lowercasing its action like extraction does
    pub fn push(&mut self, mut item: PermissionItem) {
        item.action = item.action.to_lowercase();
        self.items.push(item);
    }

    /// Append the permission items of another document
    pub fn merge(&mut self, policy: &PolicyDocument) -> Result<()> {
        let items = extract_permission_items(policy)?;
        log::debug!("Merging {} permission items into policy", items.len());
        self.items.extend(items);
        Ok(())
    }

    /// Items whose action matches `action`, in storage order
    pub fn find_action_items(&self, action: &str, mode: ActionMatch) -> Vec<&PermissionItem> {
        self.items
            .iter()
            .filter(|item| item.matches_action(action, mode))
            .collect()
    }

    /// Collapse the held items into a policy document
    pub fn to_document(&self) -> PolicyDocument {
        collapse_items(&self.version, &self.items)
    }
}

impl TryFrom<&PolicyDocument> for Policy {
    type Error = crate::errors::PolicyError;

    fn try_from(policy: &PolicyDocument) -> Result<Self> {
        Self::from_document(policy)
    }
}
