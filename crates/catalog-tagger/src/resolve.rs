//! Identity resolution from external table names to catalog FQNs.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Number of dotted parts in a table FQN: `service.database.schema.table`.
pub const TABLE_FQN_PARTS: usize = 4;

/// The `(service, database, schema)` a bare table name is resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    pub service: String,
    pub database: String,
    pub schema: String,
}

impl Scope {
    pub fn new(
        service: impl Into<String>,
        database: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            database: database.into(),
            schema: schema.into(),
        }
    }

    /// Schema FQN, `service.database.schema`.
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}", self.service, self.database, self.schema)
    }

    /// Candidate table FQN for a bare name. The name is lower-cased.
    pub fn table_fqn(&self, table: &str) -> String {
        format!("{}.{}", self.fqn(), table.to_lowercase())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.service, self.database, self.schema)
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split('.').collect();
        match parts.as_slice() {
            [service, database, schema]
                if !service.is_empty() && !database.is_empty() && !schema.is_empty() =>
            {
                Ok(Scope::new(*service, *database, *schema))
            }
            _ => Err(format!(
                "expected service.database.schema, got '{}'",
                raw
            )),
        }
    }
}

/// Outcome of resolving one raw identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Unresolved,
}

impl Resolution {
    pub fn fqn(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(fqn) => Some(fqn),
            Resolution::Unresolved => None,
        }
    }
}

/// Whether a string is a dotted table FQN with four non-empty parts.
pub fn is_table_fqn(raw: &str) -> bool {
    let parts: Vec<&str> = raw.split('.').collect();
    parts.len() == TABLE_FQN_PARTS && parts.iter().all(|p| !p.is_empty())
}

/// Maps external table names onto catalog FQNs.
///
/// Optionally backed by a lookup built from an exported FQN list, keyed by
/// lower-cased table name.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    lookup: Option<HashMap<String, String>>,
}

impl IdentityResolver {
    /// Resolver without a lookup: bare names resolve only against a scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the lookup from exported FQNs.
    ///
    /// Entries that are not 4-part FQNs are ignored. When two FQNs share a
    /// lower-cased table name the later one wins and a warning is logged.
    pub fn from_fqns<I, S>(fqns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lookup = HashMap::new();
        let mut ignored = 0usize;

        for fqn in fqns {
            let fqn = fqn.as_ref().trim();
            if !is_table_fqn(fqn) {
                ignored += 1;
                continue;
            }
            let Some(table) = fqn.rsplit('.').next() else {
                continue;
            };
            if let Some(previous) = lookup.insert(table.to_lowercase(), fqn.to_string()) {
                if previous != fqn {
                    tracing::warn!(
                        table = %table,
                        previous = %previous,
                        replacement = %fqn,
                        "Duplicate table name in FQN lookup, keeping the later entry"
                    );
                }
            }
        }

        tracing::info!(entries = lookup.len(), ignored, "Loaded FQN lookup");
        Self {
            lookup: Some(lookup),
        }
    }

    pub fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    pub fn len(&self) -> usize {
        self.lookup.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a raw identifier, optionally within a scope.
    pub fn resolve(&self, raw: &str, scope: Option<&Scope>) -> Resolution {
        let raw = raw.trim();
        if raw.is_empty() {
            return Resolution::Unresolved;
        }
        if is_table_fqn(raw) {
            return Resolution::Resolved(raw.to_string());
        }

        if let Some(lookup) = &self.lookup {
            return match lookup.get(&raw.to_lowercase()) {
                Some(fqn) => Resolution::Resolved(fqn.clone()),
                None => {
                    tracing::debug!(table = %raw, "Table not present in FQN lookup");
                    Resolution::Unresolved
                }
            };
        }

        match scope {
            Some(scope) => Resolution::Resolved(scope.table_fqn(raw)),
            None => Resolution::Unresolved,
        }
    }
}
