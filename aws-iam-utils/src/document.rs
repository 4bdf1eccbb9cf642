//! IAM policy document model
//!
//! Serde representation of the JSON policy grammar. Action and Resource values may be a
//! bare string or a list of strings, and `Statement` may be a single object or a list;
//! both shapes deserialize into the same types and serialize back in the shape they
//! currently hold.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Policy language version used when none is given
pub const DEFAULT_POLICY_VERSION: &str = "2012-10-17";

fn default_version() -> String {
    DEFAULT_POLICY_VERSION.to_string()
}

/// Effect of an IAM policy statement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Effect {
    /// Allow access
    #[serde(alias = "allow")]
    Allow,
    /// Deny access
    #[serde(alias = "deny")]
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "Allow"),
            Self::Deny => write!(f, "Deny"),
        }
    }
}

/// A string-valued field that IAM accepts either as a scalar or as a list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    /// Single value, e.g. `"Action": "s3:GetObject"`
    One(String),
    /// List of values, e.g. `"Action": ["s3:GetObject", "s3:PutObject"]`
    Many(Vec<String>),
}

impl OneOrMany {
    /// Iterate over the contained values regardless of shape
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }

    /// Owned copy of the values as a list
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    /// Number of contained values
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(values) => values.len(),
        }
    }

    /// Whether the list form holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for OneOrMany {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OneOrMany {
    fn from(values: [&str; N]) -> Self {
        Self::Many(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// Represents an individual IAM policy statement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    /// Optional statement identifier
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sid: Option<String>,
    /// Effect of the statement (Allow or Deny)
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub action: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub not_action: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resource: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub not_resource: Option<OneOrMany>,
    /// Principal mapping, e.g. `{"AWS": ["arn:aws:iam::123456789012:root"]}`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub principal: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub not_principal: Option<Value>,
    /// Condition block, kept as an opaque JSON mapping
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub condition: Option<Value>,
}

impl Statement {
    /// Create a new statement with the given effect and actions
    #[must_use]
    pub fn new(effect: Effect, actions: impl Into<OneOrMany>) -> Self {
        Self {
            sid: None,
            effect,
            action: Some(actions.into()),
            not_action: None,
            resource: None,
            not_resource: None,
            principal: None,
            not_principal: None,
            condition: None,
        }
    }

    /// Create a new Allow statement
    #[must_use]
    pub fn allow(actions: impl Into<OneOrMany>) -> Self {
        Self::new(Effect::Allow, actions)
    }

    /// Create a new Deny statement
    #[must_use]
    pub fn deny(actions: impl Into<OneOrMany>) -> Self {
        Self::new(Effect::Deny, actions)
    }

    /// Set the resource
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<OneOrMany>) -> Self {
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

    /// Set the statement ID
    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Actions of the statement as a list, empty when `Action` is absent
    pub fn actions(&self) -> Vec<&str> {
        self.action
            .as_ref()
            .map(|a| a.iter().collect())
            .unwrap_or_default()
    }

    /// Resources of the statement as a list, `None` when `Resource` is absent
    pub fn resources(&self) -> Option<Vec<&str>> {
        self.resource.as_ref().map(|r| r.iter().collect())
    }
}

/// Represents a complete IAM policy document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Policy language version (typically "2012-10-17")
    #[serde(default = "default_version")]
    pub version: String,
    /// Optional policy ID
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    /// List of policy statements
    #[serde(deserialize_with = "one_or_many_statements", default)]
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    /// Create a policy with the default version
    #[must_use]
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: default_version(),
            id: None,
            statement,
        }
    }

    /// Create a policy with an explicit version
    #[must_use]
    pub fn with_version(version: impl Into<String>, statement: Vec<Statement>) -> Self {
        Self {
            version: version.into(),
            id: None,
            statement,
        }
    }

    /// Parse a policy from its JSON text
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert a JSON value into a policy
    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize the policy into a JSON value
    pub fn to_value(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serialize the policy as pretty-printed JSON text
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn one_or_many_statements<'de, D>(deserializer: D) -> Result<Vec<Statement>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Statements {
        One(Box<Statement>),
        Many(Vec<Statement>),
    }

    Ok(match Statements::deserialize(deserializer)? {
        Statements::One(statement) => vec![*statement],
        Statements::Many(statements) => statements,
    })
}
