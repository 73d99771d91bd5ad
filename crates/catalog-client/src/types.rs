//! Request and response types for the catalog API.
//!
//! These types mirror the OpenMetadata wire format for the small part of the
//! API used for tagging: entity snapshots, tag labels, owner references,
//! list pages, and JSON-patch documents.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Fully qualified tag name, `"<Classification>.<TagName>"`.
///
/// Compared by exact, case-sensitive string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagFqn(String);

impl TagFqn {
    /// Build a tag FQN from its classification and tag name.
    pub fn new(classification: &str, tag_name: &str) -> Self {
        Self(format!("{}.{}", classification, tag_name))
    }

    /// Wrap an already-qualified tag name.
    pub fn parse(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The classification prefix (everything before the first dot).
    pub fn classification(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(c, _)| c)
    }

    /// The tag name within its classification.
    pub fn name(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, n)| n)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagFqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagFqn {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Kind of catalog entity, mapped to its REST collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EntityType {
    #[default]
    Table,
    Schema,
    Dashboard,
}

impl EntityType {
    /// Path segment of the entity collection under `/v1`.
    pub fn collection(self) -> &'static str {
        match self {
            EntityType::Table => "tables",
            EntityType::Schema => "databaseSchemas",
            EntityType::Dashboard => "dashboards",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityType::Table => "table",
            EntityType::Schema => "schema",
            EntityType::Dashboard => "dashboard",
        };
        f.write_str(label)
    }
}

/// A tag attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagLabel {
    #[serde(rename = "tagFQN")]
    pub tag_fqn: TagFqn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl TagLabel {
    /// Minimal label carrying only the tag FQN, as sent in patches.
    pub fn reference(tag: &TagFqn) -> Self {
        Self {
            tag_fqn: tag.clone(),
            source: None,
            label_type: None,
            state: None,
        }
    }
}

/// Reference to another entity, used for owners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
}

impl EntityReference {
    /// Owner reference as sent in patches: id and type only.
    pub fn owner(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            fully_qualified_name: None,
        }
    }

    /// Identity comparison on id and type, ignoring display fields.
    pub fn same_as(&self, other: &EntityReference) -> bool {
        self.id == other.id && self.kind.eq_ignore_ascii_case(&other.kind)
    }
}

/// Snapshot of a catalog entity's tagging state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntity {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<TagLabel>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub owners: Vec<EntityReference>,
    /// Set by the client from the endpoint that produced the snapshot
    #[serde(skip)]
    pub entity_type: EntityType,
}

impl CatalogEntity {
    /// Whether the snapshot carries the given tag.
    pub fn has_tag(&self, tag: &TagFqn) -> bool {
        self.tags.iter().any(|label| &label.tag_fqn == tag)
    }

    /// Tag FQNs currently applied, in catalog order.
    pub fn tag_fqns(&self) -> Vec<&str> {
        self.tags.iter().map(|label| label.tag_fqn.as_str()).collect()
    }

    /// Whether the entity is owned by exactly this one owner.
    pub fn owned_solely_by(&self, owner: &EntityReference) -> bool {
        self.owners.len() == 1 && self.owners[0].same_as(owner)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Cursor information on list responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityList {
    #[serde(default)]
    pub data: Vec<CatalogEntity>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl EntityList {
    /// Cursor for the next page, if any.
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.after.as_deref())
            .filter(|after| !after.is_empty())
    }
}

/// Value carried by a patch operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    Tag(TagLabel),
    Tags(Vec<TagLabel>),
    Owners(Vec<EntityReference>),
}

/// A single JSON-patch operation. The vocabulary is closed to the three
/// operations the tagger issues.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: PatchValue },
    Remove { path: String, value: PatchValue },
    Replace { path: String, value: PatchValue },
}

impl PatchOperation {
    /// Append one tag: `{op: add, path: "/tags/-", value: {tagFQN}}`.
    pub fn add_tag(tag: &TagFqn) -> Self {
        PatchOperation::Add {
            path: "/tags/-".to_string(),
            value: PatchValue::Tag(TagLabel::reference(tag)),
        }
    }

    /// Remove a tag: `{op: remove, path: "/tags", value: [{tagFQN}]}`.
    pub fn remove_tag(tag: &TagFqn) -> Self {
        PatchOperation::Remove {
            path: "/tags".to_string(),
            value: PatchValue::Tags(vec![TagLabel::reference(tag)]),
        }
    }

    /// Replace all owners: `{op: replace, path: "/owners", value: [owner]}`.
    pub fn replace_owners(owner: &EntityReference) -> Self {
        PatchOperation::Replace {
            path: "/owners".to_string(),
            value: PatchValue::Owners(vec![owner.clone()]),
        }
    }
}

/// Error body returned by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}
