use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::{
    error::{Error, Result},
    resources::user::Id as UserId,
};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Id(pub String);

/// The URL slug of a dataset, unique among datasets that are not deleted.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Name(pub String);

impl FromStr for Name {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        if !string.is_empty()
            && string
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            Ok(Name(string.into()))
        } else {
            Err(Error::invalid_field(
                "name",
                "Must be purely lowercase alphanumeric (ascii) characters and these symbols: -_",
            ))
        }
    }
}

impl Display for Name {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Active,
    Draft,
    Deleted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Name>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_modified: Option<String>,
    /// Schema specific fields the catalog stores alongside the core ones.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl Dataset {
    /// Datasets read back from the catalog always carry an id.
    pub fn required_id(&self) -> Result<&Id> {
        self.id.as_ref().ok_or_else(|| Error::BadProtocol {
            status_code: reqwest::StatusCode::OK,
            message: format!(
                "Dataset `{}` has no id",
                self.name.as_ref().map(|name| name.0.as_str()).unwrap_or_default()
            ),
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.state == Some(State::Deleted)
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.name.as_str())
    }

    /// Overlay `fields` on top of this dataset, the overlay wins on conflicts.
    pub fn merged_with(self, fields: &Map<String, Value>) -> Result<Dataset> {
        let mut merged = match serde_json::to_value(self) {
            Ok(Value::Object(merged)) => merged,
            Ok(other) => {
                return Err(Error::invalid(format!(
                    "Dataset did not serialise to an object: {other}"
                )))
            }
            Err(source) => {
                return Err(Error::Unknown {
                    message: "Could not serialise dataset".to_owned(),
                    source: Box::new(source),
                })
            }
        };
        merged.extend(fields.iter().map(|(key, value)| (key.clone(), value.clone())));
        Dataset::from_fields(merged)
    }

    pub fn from_fields(fields: Map<String, Value>) -> Result<Dataset> {
        serde_json::from_value(Value::Object(fields))
            .map_err(|error| Error::invalid(format!("Invalid dataset fields: {error}")))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ResourceId(pub String);

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<Id>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
