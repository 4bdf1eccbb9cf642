//! Splitting action names into camel-case words
//!
//! `ListIPSets` splits into `List`, `IP`, `Sets`: a capital followed by lowercase
//! letters or digits is one word, and a run of capitals followed by a capitalised word
//! is an acronym. Some services use verbs that generic splitting over-segments
//! (`ESHttpGet`); those are configured as compound verbs and matched first.

use crate::action_data::{split_action, ActionCatalog};
use crate::errors::{PolicyError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z0-9]+").expect("Valid word regex"));

static ACRONYM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+)[A-Z][a-z]").expect("Valid acronym regex"));

/// Compound verbs recognised before generic splitting
pub const DEFAULT_COMPOUND_VERBS: [&str; 6] = [
    "ESHttpDelete",
    "ESHttpGet",
    "ESHttpHead",
    "ESHttpPatch",
    "ESHttpPost",
    "ESHttpPut",
];

/// Splits action names into words and verbs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbSplitter {
    compound_verbs: Vec<String>,
}

impl Default for VerbSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_COMPOUND_VERBS.iter().map(|v| (*v).to_string()))
    }
}

impl VerbSplitter {
    /// Create a splitter with the given compound verbs
    pub fn new(compound_verbs: impl IntoIterator<Item = String>) -> Self {
        let mut compound_verbs: Vec<String> = compound_verbs.into_iter().collect();
        // Longest first, so a verb is never shadowed by one of its own prefixes
        compound_verbs.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { compound_verbs }
    }

    pub fn compound_verbs(&self) -> &[String] {
        &self.compound_verbs
    }

    fn compound_prefix<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.compound_verbs.iter().find_map(|verb| {
            let rest = name.strip_prefix(verb.as_str())?;
            let at_boundary = rest.chars().next().is_none_or(|c| c.is_ascii_uppercase());
            at_boundary.then(|| &name[..verb.len()])
        })
    }

    /// Split an action name (without service prefix) into its words
    pub fn split<'a>(&self, name: &'a str) -> Vec<&'a str> {
        let mut words = Vec::new();
        let mut rest = name;

        if let Some(verb) = self.compound_prefix(rest) {
            words.push(verb);
            rest = &rest[verb.len()..];
        }

        while !rest.is_empty() {
            let word_len = if let Some(m) = WORD_REGEX.find(rest) {
                m.end()
            } else if let Some(acronym) = ACRONYM_REGEX.captures(rest).and_then(|c| c.get(1)) {
                acronym.end()
            } else {
                rest.len()
            };
            words.push(&rest[..word_len]);
            rest = &rest[word_len..];
        }

        words
    }

    /// The leading verb of an action name
    pub fn verb<'a>(&self, name: &'a str) -> &'a str {
        self.split(name).first().copied().unwrap_or(name)
    }
}

/// An action split into its service prefix and name words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionComponents {
    pub service: String,
    pub words: Vec<String>,
}

impl ActionComponents {
    /// The first word of the action name
    pub fn verb(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }
}

impl fmt::Display for ActionComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.words.join(""))
    }
}

/// Split a `service:Action` string into its components.
///
/// Word boundaries come from capitalisation, so an action given without any capitals
/// is first resolved to its canonical spelling through the catalog.
pub fn extract_action_components(
    catalog: &ActionCatalog,
    splitter: &VerbSplitter,
    action: &str,
) -> Result<ActionComponents> {
    let (service, name) = split_action(action)?;

    let canonical = if name.chars().any(|c| c.is_ascii_uppercase()) {
        name.to_string()
    } else {
        catalog
            .canonical_name(service, name)
            .ok_or_else(|| PolicyError::unknown_action(action))?
    };

    Ok(ActionComponents {
        service: service.to_lowercase(),
        words: splitter
            .split(&canonical)
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}
