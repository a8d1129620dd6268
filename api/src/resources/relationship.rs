use serde::{Deserialize, Serialize};

use crate::resources::dataset::Id as DatasetId;

/// Directed dataset relationships understood by the catalog.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    ChildOf,
    ParentOf,
    DependsOn,
    DependencyOf,
    DerivesFrom,
    HasDerivation,
    LinksTo,
    LinkedFrom,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NewRelationship {
    pub subject: DatasetId,
    pub object: DatasetId,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Relationship {
    pub subject: String,
    pub object: String,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
