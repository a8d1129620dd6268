use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::{
    error::{Error, Result},
    resources::{dataset::Id as DatasetId, user::Id as UserId},
};

/// Organizations and groups share this shape in the catalog.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Capacity>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    Member,
    Editor,
    Admin,
}

impl Capacity {
    pub fn can_edit(self) -> bool {
        self >= Capacity::Editor
    }
}

impl FromStr for Capacity {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        match string {
            "member" => Ok(Capacity::Member),
            "editor" => Ok(Capacity::Editor),
            "admin" => Ok(Capacity::Admin),
            _ => Err(Error::invalid_field(
                "capacity",
                format!("Unknown capacity `{string}`"),
            )),
        }
    }
}

impl Display for Capacity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(match self {
            Capacity::Member => "member",
            Capacity::Editor => "editor",
            Capacity::Admin => "admin",
        })
    }
}

/// The permission names accepted by `organization_list_for_user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    CreateDataset,
    UpdateDataset,
    ManageGroup,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::CreateDataset => "create_dataset",
            Permission::UpdateDataset => "update_dataset",
            Permission::ManageGroup => "manage_group",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewMember<'request> {
    pub id: &'request str,
    pub username: &'request str,
    pub role: Capacity,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Collaborator {
    pub package_id: DatasetId,
    pub user_id: UserId,
    pub capacity: Capacity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NewCollaborator {
    pub id: String,
    pub user_id: String,
    pub capacity: Capacity,
}
