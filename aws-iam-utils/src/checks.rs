//! Policy equality and access-level / ARN-type classification
//!
//! Every check runs on the expanded permission items of a policy: wildcards are
//! resolved against the catalog first, so `s3:Get*` and the literal list of `Get`
//! actions are indistinguishable here.

use crate::action_data::{split_action, AccessLevel, ActionCatalog};
use crate::document::PolicyDocument;
use crate::errors::Result;
use crate::extraction::{extract_permission_items, PermissionItem};
use crate::wildcards::WildcardExpander;
use std::collections::HashSet;
use std::sync::Arc;

/// Access levels of a read-only policy
pub const READ_ONLY_LEVELS: [AccessLevel; 2] = [AccessLevel::Read, AccessLevel::List];
/// Access levels of a list-only policy
pub const LIST_ONLY_LEVELS: [AccessLevel; 1] = [AccessLevel::List];
/// Access levels of a read-write policy
pub const READ_WRITE_LEVELS: [AccessLevel; 3] =
    [AccessLevel::Read, AccessLevel::List, AccessLevel::Write];

/// Compares and classifies policies against an action catalog
#[derive(Debug, Clone)]
pub struct PolicyChecker {
    catalog: Arc<ActionCatalog>,
    expander: WildcardExpander,
}

impl PolicyChecker {
    #[must_use]
    pub fn new(catalog: Arc<ActionCatalog>) -> Self {
        Self {
            expander: WildcardExpander::new(Arc::clone(&catalog)),
            catalog,
        }
    }

    /// The wildcard expander bound to this checker's catalog
    pub fn expander(&self) -> &WildcardExpander {
        &self.expander
    }

    /// Permission items of the policy after wildcard expansion
    pub fn expanded_items(&self, policy: &PolicyDocument) -> Result<Vec<PermissionItem>> {
        extract_permission_items(&self.expander.expand(policy)?)
    }

    /// Whether two policies grant exactly the same permission items.
    ///
    /// Statement order, action order, duplicates, scalar-vs-list forms, action case
    /// and wildcards do not affect the result.
    pub fn policies_are_equal(&self, a: &PolicyDocument, b: &PolicyDocument) -> Result<bool> {
        let a: HashSet<PermissionItem> = self.expanded_items(a)?.into_iter().collect();
        let b: HashSet<PermissionItem> = self.expanded_items(b)?.into_iter().collect();
        Ok(a == b)
    }

    /// Whether every action granted by the policy has one of the allowed access levels.
    ///
    /// Stops at the first action outside the allowed levels. Unknown actions fail.
    pub fn has_only_access_levels(
        &self,
        policy: &PolicyDocument,
        allowed: &[AccessLevel],
    ) -> Result<bool> {
        for item in self.expanded_items(policy)? {
            let record = self.catalog.lookup_qualified(&item.action)?;
            if !allowed.contains(&record.access_level) {
                log::debug!(
                    "Action {} has access level {}, outside the allowed levels",
                    record.action,
                    record.access_level
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether every action granted by the policy is restricted to one of the given ARN
    /// types of `service`. Unknown actions fail.
    pub fn has_only_arn_types(
        &self,
        policy: &PolicyDocument,
        service: &str,
        arn_types: &[&str],
    ) -> Result<bool> {
        let mut allowed = HashSet::new();
        for arn_type in arn_types {
            for action in self.catalog.actions_for_arn_type(service, arn_type)? {
                allowed.insert(action.to_lowercase());
            }
        }

        for item in self.expanded_items(policy)? {
            let (item_service, name) = split_action(&item.action)?;
            self.catalog.lookup(item_service, name)?;
            if !allowed.contains(&item.action) {
                log::debug!(
                    "Action {} is not restricted to ARN types [{}]",
                    item.action,
                    arn_types.join(", ")
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Read and List actions only
    pub fn is_read_only(&self, policy: &PolicyDocument) -> Result<bool> {
        self.has_only_access_levels(policy, &READ_ONLY_LEVELS)
    }

    /// List actions only
    pub fn is_list_only(&self, policy: &PolicyDocument) -> Result<bool> {
        self.has_only_access_levels(policy, &LIST_ONLY_LEVELS)
    }

    /// Read, List and Write actions only
    pub fn is_read_write(&self, policy: &PolicyDocument) -> Result<bool> {
        self.has_only_access_levels(policy, &READ_WRITE_LEVELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Statement;
    use crate::errors::PolicyError;
    use serde_json::json;

    fn checker() -> PolicyChecker {
        PolicyChecker::new(Arc::new(ActionCatalog::embedded().unwrap()))
    }

    fn allow(actions: Vec<&str>) -> PolicyDocument {
        PolicyDocument::new(vec![Statement::allow(actions).with_resource("*")])
    }

    #[test]
    fn test_equal_policies_with_reordered_statements() {
        let checker = checker();
        let a = PolicyDocument::new(vec![
            Statement::allow(vec!["s3:GetObject", "s3:PutObject"]).with_resource("*"),
            Statement::deny("s3:DeleteObject").with_resource("*"),
        ]);
        let b = PolicyDocument::new(vec![
            Statement::deny(vec!["s3:DeleteObject"]).with_resource(vec!["*"]),
            Statement::allow(vec!["s3:PutObject", "S3:GETOBJECT"]).with_resource("*"),
        ]);

        assert!(checker.policies_are_equal(&a, &b).unwrap());
    }

    #[test]
    fn test_duplicates_do_not_break_equality() {
        let checker = checker();
        let a = allow(vec!["s3:GetObject"]);
        let b = allow(vec!["s3:GetObject", "s3:GetObject"]);
        assert!(checker.policies_are_equal(&a, &b).unwrap());
    }

    #[test]
    fn test_wildcards_are_expanded_before_comparison() {
        let checker = checker();
        let a = allow(vec!["s3:ListBucket*"]);
        let b = allow(vec![
            "s3:ListBucketVersions",
            "s3:ListBucket",
            "s3:ListBucketMultipartUploads",
        ]);
        assert!(checker.policies_are_equal(&a, &b).unwrap());
    }

    #[test]
    fn test_unequal_policies() {
        let checker = checker();
        assert!(!checker
            .policies_are_equal(&allow(vec!["s3:GetObject"]), &allow(vec!["s3:PutObject"]))
            .unwrap());

        let with_condition = PolicyDocument::new(vec![Statement::allow("s3:GetObject")
            .with_resource("*")
            .with_condition(json!({"Bool": {"aws:SecureTransport": "true"}}))]);
        assert!(!checker
            .policies_are_equal(&allow(vec!["s3:GetObject"]), &with_condition)
            .unwrap());
    }

    #[test]
    fn test_read_only() {
        let checker = checker();
        assert!(checker
            .is_read_only(&allow(vec!["s3:GetObject", "s3:ListBucket"]))
            .unwrap());
        assert!(checker.is_read_only(&allow(vec!["s3:Get*"])).unwrap());
        assert!(!checker
            .is_read_only(&allow(vec!["s3:GetObject", "s3:PutObject"]))
            .unwrap());
    }

    #[test]
    fn test_list_only() {
        let checker = checker();
        assert!(checker
            .is_list_only(&allow(vec!["s3:ListBucket", "s3:ListBucketVersions"]))
            .unwrap());
        assert!(!checker
            .is_list_only(&allow(vec!["s3:ListBucket", "s3:GetObject"]))
            .unwrap());
    }

    #[test]
    fn test_repeated_star_wildcard_is_classified() {
        let checker = checker();
        assert!(checker.is_list_only(&allow(vec!["s3:List**"])).unwrap());
        assert!(checker
            .policies_are_equal(&allow(vec!["s3:List**"]), &allow(vec!["s3:List*"]))
            .unwrap());
    }

    #[test]
    fn test_read_write() {
        let checker = checker();
        assert!(checker
            .is_read_write(&allow(vec!["s3:ListBucket", "s3:GetObjectVersion", "s3:PutObject"]))
            .unwrap());
        assert!(!checker
            .is_read_write(&allow(vec!["s3:PutObject", "s3:PutBucketPolicy"]))
            .unwrap());
        assert!(!checker
            .is_read_write(&allow(vec!["s3:PutObject", "s3:PutBucketTagging"]))
            .unwrap());
    }

    #[test]
    fn test_unknown_action_fails() {
        let checker = checker();
        let result = checker.is_read_only(&allow(vec!["s3:FlyToTheMoon"]));
        assert!(matches!(
            result,
            Err(PolicyError::UnknownAction { action }) if action == "s3:flytothemoon"
        ));
    }

    #[test]
    fn test_override_resolves_action_missing_upstream() {
        let checker = checker();
        assert!(checker
            .is_read_only(&allow(vec!["events:DescribeEndpoint"]))
            .unwrap());
        assert!(checker
            .is_read_only(&allow(vec!["lambda:GetFunctionUrlConfig"]))
            .unwrap());
    }

    #[test]
    fn test_arn_types() {
        let checker = checker();
        let bucket_only = allow(vec!["s3:ListBucket", "s3:GetBucketPolicy"]);
        assert!(checker
            .has_only_arn_types(&bucket_only, "s3", &["bucket"])
            .unwrap());
        assert!(!checker
            .has_only_arn_types(&bucket_only, "s3", &["object"])
            .unwrap());
        assert!(checker
            .has_only_arn_types(&bucket_only, "s3", &["object", "bucket"])
            .unwrap());

        let wildcard_only = allow(vec!["s3:ListAllMyBuckets"]);
        assert!(checker
            .has_only_arn_types(&wildcard_only, "s3", &["*"])
            .unwrap());
        assert!(!checker
            .has_only_arn_types(&wildcard_only, "s3", &["bucket"])
            .unwrap());
    }

    #[test]
    fn test_arn_types_reject_unknown_actions() {
        let checker = checker();
        let result = checker.has_only_arn_types(&allow(vec!["s3:FlyToTheMoon"]), "s3", &["bucket"]);
        assert!(matches!(result, Err(PolicyError::UnknownAction { .. })));
    }
}
