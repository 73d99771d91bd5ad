//! Application mapping: which tag goes on which schema.
//!
//! Stored as a JSON object keyed by application key:
//!
//! ```json
//! {
//!     "ATS_ODS_DEV": {
//!         "tag_name": "ATS",
//!         "service": "Operational Data Store DEV",
//!         "database": "odsdev",
//!         "schema": "ATS_REPLICATION"
//!     }
//! }
//! ```

use crate::error::{Result, TaggerError};
use crate::normalize::NameNormalizer;
use crate::resolve::{Scope, TABLE_FQN_PARTS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tagsync_catalog_client::TagFqn;

/// One application's tag and discovery scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMapping {
    pub tag_name: String,
    pub service: String,
    pub database: String,
    pub schema: String,
}

impl ApplicationMapping {
    pub fn scope(&self) -> Scope {
        Scope::new(&self.service, &self.database, &self.schema)
    }

    pub fn tag(&self, classification: &str) -> TagFqn {
        TagFqn::new(classification, &self.tag_name)
    }

    fn validate(&self, key: &str) -> Result<()> {
        let fields = [
            ("tag_name", &self.tag_name),
            ("service", &self.service),
            ("database", &self.database),
            ("schema", &self.schema),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(TaggerError::InvalidMapping {
                    key: key.to_string(),
                    reason: format!("{} is empty", field),
                });
            }
        }
        Ok(())
    }
}

/// Application key → mapping, in key order.
pub type Mappings = BTreeMap<String, ApplicationMapping>;

/// Load and validate a mapping file. Any bad entry fails the whole load.
pub fn load_mappings(path: impl AsRef<Path>) -> Result<Mappings> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| TaggerError::io(path, e))?;
    let mappings = parse_mappings(&raw)?;
    tracing::info!(path = %path.display(), applications = mappings.len(), "Loaded application mapping");
    Ok(mappings)
}

pub fn parse_mappings(raw: &str) -> Result<Mappings> {
    let mappings: Mappings = serde_json::from_str(raw)?;
    for (key, mapping) in &mappings {
        if key.trim().is_empty() {
            return Err(TaggerError::InvalidMapping {
                key: key.clone(),
                reason: "empty application key".to_string(),
            });
        }
        mapping.validate(key)?;
    }
    Ok(mappings)
}

/// Write a mapping file, pretty-printed, creating parent directories.
pub fn save_mappings(path: impl AsRef<Path>, mappings: &Mappings) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TaggerError::io(parent, e))?;
    }
    let body = serde_json::to_string_pretty(mappings)?;
    std::fs::write(path, body).map_err(|e| TaggerError::io(path, e))?;
    tracing::info!(path = %path.display(), applications = mappings.len(), "Saved application mapping");
    Ok(())
}

/// One entry per distinct `service.database.schema` among the table FQNs.
///
/// Key and tag name are `"<SCHEMA upper> - <database>"`.
pub fn generate_from_fqns<I, S>(fqns: I) -> Mappings
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scopes: BTreeMap<Scope, usize> = BTreeMap::new();
    for fqn in fqns {
        let parts: Vec<&str> = fqn.as_ref().trim().split('.').collect();
        if parts.len() < TABLE_FQN_PARTS {
            continue;
        }
        *scopes
            .entry(Scope::new(parts[0], parts[1], parts[2]))
            .or_default() += 1;
    }

    let mut mappings = Mappings::new();
    for (scope, tables) in scopes {
        let key = format!("{} - {}", scope.schema.to_uppercase(), scope.database);
        tracing::info!(application = %key, scope = %scope, tables, "Discovered application");

        let mapping = ApplicationMapping {
            tag_name: key.clone(),
            service: scope.service,
            database: scope.database,
            schema: scope.schema,
        };
        if let Some(previous) = mappings.insert(key.clone(), mapping) {
            tracing::warn!(
                application = %key,
                replaced_service = %previous.service,
                "Two services produce the same application key, keeping the later one"
            );
        }
    }
    mappings
}

/// Result of cleaning a generated mapping.
#[derive(Debug, Clone, Default)]
pub struct CleanedMappings {
    pub mappings: Mappings,
    pub excluded: Vec<String>,
    /// `(original key, new key)` for every entry whose key changed
    pub renamed: Vec<(String, String)>,
}

/// Drop excluded applications, clean tag names, and re-key entries as
/// `<cleaned name>_<service label>`.
pub fn clean_mappings(mappings: &Mappings, normalizer: &NameNormalizer) -> CleanedMappings {
    let mut cleaned = CleanedMappings::default();

    for (key, mapping) in mappings {
        if !normalizer.should_include(key) {
            tracing::info!(application = %key, "Excluding application");
            cleaned.excluded.push(key.clone());
            continue;
        }

        let name = normalizer.clean(key);
        let unique_key = normalizer.create_unique_key(&name, &mapping.service);
        let entry = ApplicationMapping {
            tag_name: normalizer.clean(&mapping.tag_name),
            ..mapping.clone()
        };

        if unique_key != *key {
            tracing::debug!(original = %key, cleaned = %name, key = %unique_key, "Renamed application");
            cleaned.renamed.push((key.clone(), unique_key.clone()));
        }
        if let Some(previous) = cleaned.mappings.insert(unique_key.clone(), entry) {
            tracing::warn!(
                application = %unique_key,
                replaced_schema = %previous.schema,
                "Cleaned key collides with an earlier entry, keeping the later one"
            );
        }
    }

    tracing::info!(
        input = mappings.len(),
        kept = cleaned.mappings.len(),
        excluded = cleaned.excluded.len(),
        "Cleaned application mapping"
    );
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn entry(tag: &str, service: &str, database: &str, schema: &str) -> ApplicationMapping {
        ApplicationMapping {
            tag_name: tag.to_string(),
            service: service.to_string(),
            database: database.to_string(),
            schema: schema.to_string(),
        }
    }

    #[test]
    fn test_load_mapping_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ATS": {{"tag_name": "ATS", "service": "SVC", "database": "DB", "schema": "SCHEMA", "total_tables": 4}}}}"#
        )
        .unwrap();

        let mappings = load_mappings(file.path()).unwrap();
        let ats = &mappings["ATS"];
        assert_eq!(ats.scope().fqn(), "SVC.DB.SCHEMA");
        assert_eq!(ats.tag("Application System").as_str(), "Application System.ATS");
    }

    #[test]
    fn test_load_rejects_incomplete_entry() {
        let err = parse_mappings(r#"{"ATS": {"tag_name": "ATS", "service": "SVC", "database": "DB"}}"#)
            .unwrap_err();
        assert!(matches!(err, TaggerError::Json(_)));

        let err = parse_mappings(
            r#"{"ATS": {"tag_name": " ", "service": "SVC", "database": "DB", "schema": "S"}}"#,
        )
        .unwrap_err();
        match err {
            TaggerError::InvalidMapping { key, reason } => {
                assert_eq!(key, "ATS");
                assert!(reason.contains("tag_name"));
            }
            other => panic!("Expected InvalidMapping, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_mappings("/nonexistent/application_mapping.json").unwrap_err();
        assert!(matches!(err, TaggerError::Io { .. }));
    }

    #[test]
    fn test_generate_groups_by_schema() {
        let mappings = generate_from_fqns([
            "ODS.odsdev.ats_replication.orders",
            "ODS.odsdev.ats_replication.customers",
            "GEO.geotst.fta.invoices",
            "GEO.geotst",
        ]);

        assert_eq!(mappings.len(), 2);
        assert_eq!(
            mappings["ATS_REPLICATION - odsdev"],
            entry("ATS_REPLICATION - odsdev", "ODS", "odsdev", "ats_replication")
        );
        assert_eq!(mappings["FTA - geotst"].service, "GEO");
    }

    #[test]
    fn test_clean_rekeys_and_excludes() {
        let mut mappings = Mappings::new();
        mappings.insert(
            "ATS_REPLICATION - odsdev".into(),
            entry(
                "ATS_REPLICATION - odsdev",
                "Operational Data Store DEV",
                "odsdev",
                "ats_replication",
            ),
        );
        mappings.insert(
            "CONSEP_X - odsdev".into(),
            entry("CONSEP_X - odsdev", "SVC", "odsdev", "consep_x"),
        );

        let cleaned = clean_mappings(&mappings, &NameNormalizer::default());

        assert_eq!(cleaned.excluded, vec!["CONSEP_X - odsdev"]);
        let ats = &cleaned.mappings["ATS_ODS_DEV"];
        assert_eq!(ats.tag_name, "ATS");
        assert_eq!(ats.schema, "ats_replication");
        assert_eq!(
            cleaned.renamed,
            vec![("ATS_REPLICATION - odsdev".to_string(), "ATS_ODS_DEV".to_string())]
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("application_mapping.json");

        let mut mappings = Mappings::new();
        mappings.insert("ATS".into(), entry("ATS", "SVC", "DB", "SCHEMA"));
        save_mappings(&path, &mappings).unwrap();

        assert_eq!(load_mappings(&path).unwrap(), mappings);
    }
}
