//! Application name normalization.
//!
//! Catalog-derived application names carry environment suffixes
//! (`"ATS - GEOTST"`) and replication markers (`"ATS_REPLICATION"`). The
//! normalizer reduces them to the bare application name and builds unique
//! mapping keys from the name and its service.

/// Prefixes of application names that are never tagged.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["CONSEP", "THE"];

const ENVIRONMENT_SEPARATOR: &str = " - ";
const REPLICATION_MARKER: &str = "_REPLICATION";
const TEST_DATABASE_SUFFIX: &str = " Test Database";
const ODS_SERVICE: &str = "Operational Data Store";

/// Pure string normalizer. Holds only its exclusion list.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    excluded_prefixes: Vec<String>,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::with_excluded_prefixes(DEFAULT_EXCLUDED_PREFIXES.iter().copied())
    }
}

impl NameNormalizer {
    pub fn with_excluded_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Reduce a raw application name to its bare form.
    ///
    /// Truncates at the first `" - "`, then removes every `_REPLICATION`,
    /// then trims surrounding whitespace.
    pub fn clean(&self, raw: &str) -> String {
        let head = raw
            .split_once(ENVIRONMENT_SEPARATOR)
            .map_or(raw, |(head, _)| head);
        head.replace(REPLICATION_MARKER, "").trim().to_string()
    }

    /// False when the name starts with an excluded prefix.
    pub fn should_include(&self, name: &str) -> bool {
        !self
            .excluded_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Short service label used in mapping keys.
    pub fn clean_service_name(&self, service: &str) -> String {
        let service = service.replace(TEST_DATABASE_SUFFIX, "");
        if service.contains(ODS_SERVICE) {
            if service.contains("DEV") {
                return "ODS_DEV".to_string();
            }
            if service.contains("TEST") {
                return "ODS_TEST".to_string();
            }
            return "ODS".to_string();
        }
        service
    }

    /// `"<cleaned>_<service label>"`.
    pub fn create_unique_key(&self, cleaned: &str, service: &str) -> String {
        format!("{}_{}", cleaned, self.clean_service_name(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_environment_and_replication() {
        let n = NameNormalizer::default();
        assert_eq!(n.clean("ATS_REPLICATION - odsdev"), "ATS");
        assert_eq!(n.clean("ATS - GEOTST"), "ATS");
        assert_eq!(n.clean("FTA_REPLICATION - odstst"), "FTA");
    }

    #[test]
    fn test_clean_only_truncates_at_first_separator() {
        let n = NameNormalizer::default();
        assert_eq!(n.clean("A - B - C"), "A");
        assert_eq!(n.clean("  PLAIN  "), "PLAIN");
        assert_eq!(n.clean("NO-SPACES-DASH"), "NO-SPACES-DASH");
        assert_eq!(n.clean("X_REPLICATION_REPLICATION"), "X");
    }

    #[test]
    fn test_should_include() {
        let n = NameNormalizer::default();
        assert!(!n.should_include("CONSEP_FOO"));
        assert!(!n.should_include("THE_BAR"));
        assert!(n.should_include("ATS"));
        // Prefix match is case-sensitive
        assert!(n.should_include("the_bar"));
    }

    #[test]
    fn test_custom_prefixes() {
        let n = NameNormalizer::with_excluded_prefixes(["TMP"]);
        assert!(!n.should_include("TMP_STAGING"));
        assert!(n.should_include("CONSEP_FOO"));
    }

    #[test]
    fn test_clean_service_name() {
        let n = NameNormalizer::default();
        assert_eq!(n.clean_service_name("Operational Data Store DEV"), "ODS_DEV");
        assert_eq!(
            n.clean_service_name("Operational Data Store TEST Test Database"),
            "ODS_TEST"
        );
        assert_eq!(n.clean_service_name("Operational Data Store"), "ODS");
        assert_eq!(n.clean_service_name("GEO Test Database"), "GEO");
        assert_eq!(n.clean_service_name("Warehouse"), "Warehouse");
    }

    #[test]
    fn test_create_unique_key() {
        let n = NameNormalizer::default();
        let cleaned = n.clean("ATS_REPLICATION - odsdev");
        assert_eq!(
            n.create_unique_key(&cleaned, "Operational Data Store DEV"),
            "ATS_ODS_DEV"
        );
        assert_eq!(n.create_unique_key("FTA", "GEO Test Database"), "FTA_GEO");
    }
}
