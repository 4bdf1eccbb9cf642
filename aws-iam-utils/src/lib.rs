//! AWS IAM policy analysis
//!
//! This crate flattens IAM policy documents into atomic permission items and builds on
//! them to:
//!
//! - compare policies for equivalent grants ([`PolicyChecker::policies_are_equal`])
//! - classify policies by access level or ARN type ([`PolicyChecker`])
//! - combine and collapse policies ([`combine_policies`], [`collapse_policies`])
//! - generate least-privilege policies for a service ([`PolicyGenerator`])
//! - simplify policies cosmetically or with wildcards ([`simplify_policy`], [`Simplifier`])
//!
//! Action metadata comes from an [`ActionCatalog`], which layers a local override table
//! over an upstream action database. [`ActionCatalog::embedded`] uses the Service
//! Reference data bundled with the crate.
//!
//! ```no_run
//! use std::sync::Arc;
//! use aws_iam_utils::{ActionCatalog, PolicyChecker, PolicyGenerator};
//!
//! # fn main() -> aws_iam_utils::Result<()> {
//! let catalog = Arc::new(ActionCatalog::embedded()?);
//! let generator = PolicyGenerator::new(Arc::clone(&catalog));
//! let policy = generator.generate_read_only_policy_for_service("s3")?;
//!
//! let checker = PolicyChecker::new(catalog);
//! assert!(checker.is_read_only(&policy)?);
//! # Ok(())
//! # }
//! ```

pub mod action_data;
pub mod checks;
pub mod combiner;
pub mod document;
pub mod errors;
pub mod extraction;
pub mod generator;
pub mod policy;
pub mod simplifier;
pub mod verbs;
pub mod wildcards;

mod canonical;

pub use action_data::{
    split_action, AccessLevel, ActionCatalog, ActionDatabase, ActionEntry, ActionOverride,
    ActionOverrides, ActionRecord, ArnTypeEntry, ServiceReferenceDatabase, ALL_ACCESS_LEVELS,
    WILDCARD_ARN_TYPE,
};
pub use checks::{PolicyChecker, LIST_ONLY_LEVELS, READ_ONLY_LEVELS, READ_WRITE_LEVELS};
pub use combiner::{
    build_policy, build_policy_with_version, collapse_policies, combine_policies, dedupe_policy,
};
pub use document::{Effect, OneOrMany, PolicyDocument, Statement, DEFAULT_POLICY_VERSION};
pub use errors::{PolicyError, Result};
pub use extraction::{
    extract_permission_items, extract_permission_items_with, ExtractOptions, PermissionItem,
};
pub use generator::{GeneratorConfig, PolicyGenerator};
pub use policy::{ActionMatch, Policy};
pub use simplifier::{simplify_policy, Simplifier};
pub use verbs::{extract_action_components, ActionComponents, VerbSplitter};
pub use wildcards::WildcardExpander;
