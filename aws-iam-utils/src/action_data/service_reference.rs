//! Upstream action database backed by AWS Service Reference documents
//!
//! Each service is described by one JSON document in the Service Reference shape
//! (`{"Name": "s3", "Actions": [...], "Resources": [...]}`). The access level of an
//! action is derived from its annotation flags; actions without annotations carry no
//! access level and must be completed through the override table.

use super::{AccessLevel, ActionDatabase, ActionEntry, ArnTypeEntry};
use crate::errors::{PolicyError, Result};
use glob::Pattern;
use rust_embed::RustEmbed;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Embedded Service Reference documents, one `<service>.json` per service
#[derive(RustEmbed)]
#[folder = "resources/service-reference"]
#[include = "*.json"]
struct ServiceReferenceFiles;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceReference {
    name: String,
    #[serde(default)]
    actions: Vec<ServiceAction>,
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceAction {
    name: String,
    #[serde(default)]
    annotations: Option<ActionAnnotations>,
    #[serde(default)]
    resources: Vec<ActionResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActionAnnotations {
    properties: ActionProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActionProperties {
    #[serde(default)]
    is_list: bool,
    #[serde(default)]
    is_permission_management: bool,
    #[serde(default)]
    is_tagging_only: bool,
    #[serde(default)]
    is_write: bool,
}

impl ActionProperties {
    fn access_level(&self) -> AccessLevel {
        if self.is_permission_management {
            AccessLevel::PermissionsManagement
        } else if self.is_tagging_only {
            AccessLevel::Tagging
        } else if self.is_write {
            AccessLevel::Write
        } else if self.is_list {
            AccessLevel::List
        } else {
            AccessLevel::Read
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActionResource {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceResource {
    name: String,
    #[serde(rename = "ARNFormats", default)]
    arn_formats: Vec<String>,
}

/// Actions and ARN types of one service
#[derive(Debug, Clone)]
struct ServiceDefinition {
    actions: Vec<ActionEntry>,
    arn_types: Vec<ArnTypeEntry>,
    /// Lowercased action name -> position in `actions`
    index: HashMap<String, usize>,
}

impl From<ServiceReference> for ServiceDefinition {
    fn from(reference: ServiceReference) -> Self {
        let actions: Vec<ActionEntry> = reference
            .actions
            .into_iter()
            .map(|action| ActionEntry {
                access_level: action
                    .annotations
                    .as_ref()
                    .map(|a| a.properties.access_level()),
                name: action.name,
                arn_types: action.resources.into_iter().map(|r| r.name).collect(),
            })
            .collect();

        let index = actions
            .iter()
            .enumerate()
            .map(|(i, action)| (action.name.to_lowercase(), i))
            .collect();

        let arn_types = reference
            .resources
            .into_iter()
            .map(|r| ArnTypeEntry {
                name: r.name,
                arn_formats: r.arn_formats,
            })
            .collect();

        Self {
            actions,
            arn_types,
            index,
        }
    }
}

/// Action database built from Service Reference documents
#[derive(Debug, Clone, Default)]
pub struct ServiceReferenceDatabase {
    /// Keyed by lowercased service prefix; ordered so `services()` is stable
    services: BTreeMap<String, ServiceDefinition>,
}

impl ServiceReferenceDatabase {
    /// Load the Service Reference documents embedded in the library
    pub fn embedded() -> Result<Self> {
        let start_time = std::time::Instant::now();
        let mut database = Self::default();

        for file_path in ServiceReferenceFiles::iter() {
            let file = ServiceReferenceFiles::get(&file_path).ok_or_else(|| {
                PolicyError::data_load(file_path.as_ref(), "embedded file disappeared")
            })?;
            let json = std::str::from_utf8(&file.data)
                .map_err(|e| PolicyError::data_load(file_path.as_ref(), e.to_string()))?;
            database.add_named_document(&file_path, json)?;
        }

        log::debug!(
            "Loaded {} embedded service reference documents in {:?}",
            database.services.len(),
            start_time.elapsed()
        );

        Ok(database)
    }

    /// Build a database from Service Reference JSON documents
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut database = Self::default();
        for json in documents {
            database.add_document(json)?;
        }
        Ok(database)
    }

    /// Load every `*.json` Service Reference document in `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut database = Self::default();
        database.add_dir(dir)?;
        Ok(database)
    }

    /// Add every `*.json` document in `dir`, replacing services already present.
    /// Returns the number of documents loaded.
    pub fn add_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let source = dir.display().to_string();
        if !dir.is_dir() {
            return Err(PolicyError::data_load(source, "not a directory"));
        }

        let pattern = format!("{}/*.json", Pattern::escape(&dir.to_string_lossy()));
        let mut paths = glob::glob(&pattern)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PolicyError::data_load(source.as_str(), e.to_string()))?;
        paths.sort();

        for path in &paths {
            let name = path.display().to_string();
            let json =
                fs::read_to_string(path).map_err(|e| PolicyError::data_load(&name, e.to_string()))?;
            self.add_named_document(&name, &json)?;
        }

        if paths.is_empty() {
            log::warn!("No service reference documents found in {}", source);
        } else {
            log::debug!(
                "Loaded {} service reference documents from {}",
                paths.len(),
                source
            );
        }
        Ok(paths.len())
    }

    /// Add a document, reporting parse failures against `name`
    fn add_named_document(&mut self, name: &str, json: &str) -> Result<()> {
        self.add_document(json).map_err(|e| match e {
            PolicyError::Json(e) => PolicyError::data_load(name, e.to_string()),
            other => other,
        })
    }

    /// Parse one Service Reference document and add (or replace) its service
    pub fn add_document(&mut self, json: &str) -> Result<()> {
        let reference: ServiceReference = serde_json::from_str(json)?;
        let service = reference.name.to_lowercase();
        log::trace!(
            "Adding service {} with {} actions",
            service,
            reference.actions.len()
        );
        self.services.insert(service, reference.into());
        Ok(())
    }
}

impl ActionDatabase for ServiceReferenceDatabase {
    fn services(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    fn service_actions(&self, service: &str) -> Option<&[ActionEntry]> {
        self.services
            .get(&service.to_lowercase())
            .map(|definition| definition.actions.as_slice())
    }

    fn service_arn_types(&self, service: &str) -> Option<&[ArnTypeEntry]> {
        self.services
            .get(&service.to_lowercase())
            .map(|definition| definition.arn_types.as_slice())
    }

    fn lookup(&self, service: &str, action: &str) -> Option<&ActionEntry> {
        let definition = self.services.get(&service.to_lowercase())?;
        let position = definition.index.get(&action.to_lowercase())?;
        definition.actions.get(*position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Name": "sample",
        "Actions": [
            {
                "Name": "GetThing",
                "Annotations": {"Properties": {"IsList": false, "IsPermissionManagement": false, "IsTaggingOnly": false, "IsWrite": false}},
                "Resources": [{"Name": "thing"}]
            },
            {
                "Name": "ListThings",
                "Annotations": {"Properties": {"IsList": true, "IsPermissionManagement": false, "IsTaggingOnly": false, "IsWrite": false}}
            },
            {
                "Name": "PutThingPolicy",
                "Annotations": {"Properties": {"IsList": false, "IsPermissionManagement": true, "IsTaggingOnly": false, "IsWrite": true}},
                "Resources": [{"Name": "thing"}]
            },
            {
                "Name": "TagThing",
                "Annotations": {"Properties": {"IsList": false, "IsPermissionManagement": false, "IsTaggingOnly": true, "IsWrite": true}},
                "Resources": [{"Name": "thing"}]
            },
            {
                "Name": "UpdateThing",
                "Annotations": {"Properties": {"IsList": false, "IsPermissionManagement": false, "IsTaggingOnly": false, "IsWrite": true}},
                "Resources": [{"Name": "thing"}]
            },
            {
                "Name": "DescribeMystery"
            }
        ],
        "Resources": [
            {"Name": "thing", "ARNFormats": ["arn:${Partition}:sample:${Region}:${Account}:thing/${ThingId}"]}
        ],
        "Version": "v1.3"
    }"#;

    #[test]
    fn test_access_levels_from_annotations() {
        let db = ServiceReferenceDatabase::from_documents([SAMPLE]).unwrap();
        let level = |name: &str| db.lookup("sample", name).unwrap().access_level;

        assert_eq!(level("GetThing"), Some(AccessLevel::Read));
        assert_eq!(level("ListThings"), Some(AccessLevel::List));
        assert_eq!(level("PutThingPolicy"), Some(AccessLevel::PermissionsManagement));
        assert_eq!(level("TagThing"), Some(AccessLevel::Tagging));
        assert_eq!(level("UpdateThing"), Some(AccessLevel::Write));
        assert_eq!(level("DescribeMystery"), None);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let db = ServiceReferenceDatabase::from_documents([SAMPLE]).unwrap();
        let entry = db.lookup("SAMPLE", "getthing").unwrap();
        assert_eq!(entry.name, "GetThing");
        assert_eq!(entry.arn_types, vec!["thing"]);
        assert!(db.lookup("sample", "FlyThing").is_none());
        assert!(db.lookup("other", "GetThing").is_none());
    }

    #[test]
    fn test_service_listing_and_arn_types() {
        let db = ServiceReferenceDatabase::from_documents([SAMPLE]).unwrap();
        assert_eq!(db.services(), vec!["sample"]);
        assert_eq!(db.service_actions("sample").unwrap().len(), 6);

        let arn_types = db.service_arn_types("sample").unwrap();
        assert_eq!(arn_types[0].name, "thing");
        assert_eq!(arn_types[0].arn_formats.len(), 1);
    }

    #[test]
    fn test_embedded_documents_load() {
        let db = ServiceReferenceDatabase::embedded().unwrap();
        for service in ["s3", "lambda", "events", "wafv2", "ssm", "ec2", "es"] {
            assert!(
                db.service_actions(service).is_some_and(|a| !a.is_empty()),
                "missing embedded service {}",
                service
            );
        }
    }

    #[test]
    fn test_from_dir_loads_json_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sample.json"), SAMPLE).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a service").unwrap();

        let db = ServiceReferenceDatabase::from_dir(dir.path()).unwrap();
        assert_eq!(db.services(), vec!["sample"]);
        assert_eq!(
            db.lookup("sample", "ListThings").unwrap().access_level,
            Some(AccessLevel::List)
        );
    }

    #[test]
    fn test_add_dir_replaces_embedded_service() {
        let dir = tempfile::tempdir().unwrap();
        let s3 = SAMPLE.replace("\"Name\": \"sample\"", "\"Name\": \"s3\"");
        fs::write(dir.path().join("s3.json"), s3).unwrap();

        let mut db = ServiceReferenceDatabase::embedded().unwrap();
        assert_eq!(db.add_dir(dir.path()).unwrap(), 1);

        assert!(db.lookup("s3", "GetThing").is_some());
        assert!(db.lookup("s3", "GetObject").is_none());
        assert!(db.lookup("lambda", "GetFunction").is_some());
    }

    #[test]
    fn test_from_dir_reports_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            ServiceReferenceDatabase::from_dir(&missing),
            Err(PolicyError::DataLoad { .. })
        ));

        fs::write(dir.path().join("broken.json"), "{").unwrap();
        let err = ServiceReferenceDatabase::from_dir(dir.path()).unwrap_err();
        match err {
            PolicyError::DataLoad { source_name, .. } => {
                assert!(source_name.ends_with("broken.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let result = ServiceReferenceDatabase::from_documents(["{\"Actions\": []}"]);
        assert!(matches!(result, Err(PolicyError::Json(_))));
    }
}
