//! Permission item extraction
//!
//! Flattens a policy document into atomic permission items: one item per
//! `(resource, action)` pair of every statement. Everything that compares or classifies
//! policies works on these items rather than on raw statements.

use crate::canonical::hash_optional_json;
use crate::document::{Effect, OneOrMany, PolicyDocument, Statement};
use crate::errors::{PolicyError, Result};
use serde::Serialize;
use serde_json::Value;
use std::hash::{Hash, Hasher};

/// One atomic grant: a single action on a single resource under one effect,
/// condition and principal.
///
/// The action is lowercased on creation so items compare case-insensitively; this
/// casing is what every later serialization of the item carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionItem {
    pub effect: Effect,
    pub action: String,
    /// `None` when the statement carried no `Resource` key
    pub resource: Option<String>,
    pub condition: Option<Value>,
    pub principal: Option<Value>,
}

impl Hash for PermissionItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.effect.hash(state);
        self.action.hash(state);
        self.resource.hash(state);
        hash_optional_json(self.condition.as_ref(), state);
        hash_optional_json(self.principal.as_ref(), state);
    }
}

impl PermissionItem {
    /// Create an item with no resource, condition or principal
    #[must_use]
    pub fn new(effect: Effect, action: &str) -> Self {
        Self {
            effect,
            action: action.to_lowercase(),
            resource: None,
            condition: None,
            principal: None,
        }
    }

    /// Set the resource
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the condition
    #[must_use]
    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Set the principal
    #[must_use]
    pub fn with_principal(mut self, principal: Value) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Service prefix of the action, if the action is qualified
    pub fn service(&self) -> Option<&str> {
        self.action.split_once(':').map(|(service, _)| service)
    }

    /// Project the item back to a single-action statement, omitting absent fields
    pub fn as_statement(&self) -> Statement {
        let mut statement = Statement::new(self.effect, OneOrMany::One(self.action.clone()));
        statement.resource = self.resource.clone().map(OneOrMany::One);
        statement.condition = self.condition.clone();
        statement.principal = self.principal.clone();
        statement
    }
}

/// Options controlling extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Accept `NotAction`, `NotPrincipal` and `NotResource` instead of failing.
    /// The inverted keys are ignored; only `Action` and `Resource` are expanded.
    pub allow_unsupported: bool,
}

/// Extract the permission items of a policy, rejecting inverted statement keys
pub fn extract_permission_items(policy: &PolicyDocument) -> Result<Vec<PermissionItem>> {
    extract_permission_items_with(policy, ExtractOptions::default())
}

/// Extract the permission items of a policy.
///
/// Items are emitted in statement order, then resource order, then action order.
/// A statement without `Resource` yields items whose resource is `None`. The input
/// document is only read.
pub fn extract_permission_items_with(
    policy: &PolicyDocument,
    options: ExtractOptions,
) -> Result<Vec<PermissionItem>> {
    let mut items = Vec::new();

    for statement in &policy.statement {
        if !options.allow_unsupported {
            check_supported_keys(statement)?;
        }

        let resources: Vec<Option<&str>> = match statement.resources() {
            Some(resources) => resources.into_iter().map(Some).collect(),
            None => vec![None],
        };

        for resource in &resources {
            for action in statement.actions() {
                items.push(PermissionItem {
                    effect: statement.effect,
                    action: action.to_lowercase(),
                    resource: resource.map(str::to_string),
                    condition: statement.condition.clone(),
                    principal: statement.principal.clone(),
                });
            }
        }
    }

    log::trace!(
        "Extracted {} permission items from {} statements",
        items.len(),
        policy.statement.len()
    );

    Ok(items)
}

fn check_supported_keys(statement: &Statement) -> Result<()> {
    if statement.not_action.is_some() {
        return Err(PolicyError::unsupported_key("NotAction"));
    }
    if statement.not_principal.is_some() {
        return Err(PolicyError::unsupported_key("NotPrincipal"));
    }
    if statement.not_resource.is_some() {
        return Err(PolicyError::unsupported_key("NotResource"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy(value: Value) -> PolicyDocument {
        PolicyDocument::from_value(value).unwrap()
    }

    #[test]
    fn test_one_item_per_resource() {
        let p = policy(json!({
            "Version": "2012-10-17",
            "Statement": [{"Effect": "Allow", "Action": ["s3:PutObject"], "Resource": ["a", "b"]}]
        }));

        let items = extract_permission_items(&p).unwrap();
        assert_eq!(
            items,
            vec![
                PermissionItem::new(Effect::Allow, "s3:PutObject").with_resource("a"),
                PermissionItem::new(Effect::Allow, "s3:PutObject").with_resource("b"),
            ]
        );
    }

    #[test]
    fn test_cross_product_order() {
        let p = policy(json!({
            "Version": "2012-10-17",
            "Statement": [
                {"Effect": "Allow", "Action": ["s3:GetObject", "s3:PutObject"], "Resource": ["a", "b"]},
                {"Effect": "Deny", "Action": "s3:DeleteObject"}
            ]
        }));

        let items = extract_permission_items(&p).unwrap();
        let summary: Vec<(Effect, &str, Option<&str>)> = items
            .iter()
            .map(|i| (i.effect, i.action.as_str(), i.resource.as_deref()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (Effect::Allow, "s3:getobject", Some("a")),
                (Effect::Allow, "s3:putobject", Some("a")),
                (Effect::Allow, "s3:getobject", Some("b")),
                (Effect::Allow, "s3:putobject", Some("b")),
                (Effect::Deny, "s3:deleteobject", None),
            ]
        );
    }

    #[test]
    fn test_scalar_action_and_resource() {
        let p = policy(json!({
            "Version": "2012-10-17",
            "Statement": {"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}
        }));

        let items = extract_permission_items(&p).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].action, "s3:getobject");
        assert_eq!(items[0].resource.as_deref(), Some("*"));
    }

    #[test]
    fn test_condition_and_principal_carried_verbatim() {
        let condition = json!({"StringEquals": {"aws:PrincipalTag/team": "data"}});
        let principal = json!({"AWS": ["arn:aws:iam::123456789012:root"]});
        let p = PolicyDocument::new(vec![Statement::allow("s3:GetObject")
            .with_condition(condition.clone())
            .with_principal(principal.clone())]);

        let items = extract_permission_items(&p).unwrap();
        assert_eq!(items[0].condition.as_ref(), Some(&condition));
        assert_eq!(items[0].principal.as_ref(), Some(&principal));
        assert_eq!(items[0].resource, None);
    }

    #[test]
    fn test_unsupported_keys_rejected() {
        for key in ["NotAction", "NotResource", "NotPrincipal"] {
            let mut statement = serde_json::Map::new();
            statement.insert("Effect".to_string(), json!("Allow"));
            statement.insert("Action".to_string(), json!("s3:GetObject"));
            statement.insert(key.to_string(), json!("x"));
            let p = policy(json!({"Version": "2012-10-17", "Statement": [statement]}));

            match extract_permission_items(&p) {
                Err(PolicyError::UnsupportedKey { key: found }) => assert_eq!(found, key),
                other => panic!("Expected UnsupportedKey error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_unsupported_keys_allowed_with_opt_in() {
        let p = policy(json!({
            "Version": "2012-10-17",
            "Statement": [{"Effect": "Allow", "Action": "s3:GetObject", "NotResource": "a"}]
        }));

        let items =
            extract_permission_items_with(&p, ExtractOptions { allow_unsupported: true }).unwrap();
        assert_eq!(items, vec![PermissionItem::new(Effect::Allow, "s3:GetObject")]);
    }

    #[test]
    fn test_input_is_not_modified() {
        let p = policy(json!({
            "Version": "2012-10-17",
            "Statement": [{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}]
        }));
        let before = p.clone();

        extract_permission_items(&p).unwrap();
        assert_eq!(p, before);
        assert_eq!(p.statement[0].action, Some(OneOrMany::from("s3:GetObject")));
    }

    #[test]
    fn test_as_statement_omits_absent_fields() {
        let item = PermissionItem::new(Effect::Allow, "s3:GetObject");
        let value = serde_json::to_value(item.as_statement()).unwrap();
        assert_eq!(value, json!({"Effect": "Allow", "Action": "s3:getobject"}));

        let item = item.with_resource("*");
        let value = serde_json::to_value(item.as_statement()).unwrap();
        assert_eq!(
            value,
            json!({"Effect": "Allow", "Action": "s3:getobject", "Resource": "*"})
        );
    }

    #[test]
    fn test_service_prefix() {
        assert_eq!(
            PermissionItem::new(Effect::Allow, "S3:GetObject").service(),
            Some("s3")
        );
        assert_eq!(PermissionItem::new(Effect::Allow, "*").service(), None);
    }
}
