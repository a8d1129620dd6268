use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Id(pub String);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Username(pub String);

impl FromStr for Username {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        if string.len() >= 2
            && string
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            Ok(Username(string.into()))
        } else {
            Err(Error::invalid_field(
                "name",
                "Must be purely lowercase alphanumeric (ascii) characters and these symbols: -_",
            ))
        }
    }
}

impl Display for Username {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Email(pub String);

impl Email {
    /// The part of the address before the `@`.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl FromStr for Email {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        Ok(Email(string.into()))
    }
}

/// A user account, either an id or a login name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        if string.trim().is_empty() {
            Err(Error::invalid_field("id", "Missing value"))
        } else {
            Ok(Identifier(string.trim().into()))
        }
    }
}

impl From<&User> for Identifier {
    fn from(user: &User) -> Self {
        Identifier(user.id.0.clone())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub name: Username,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub sysadmin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

impl User {
    /// Whether `identifier` names this account by id or login.
    pub fn is_identified_by(&self, identifier: &str) -> bool {
        self.id.0 == identifier || self.name.0 == identifier
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NewUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Username>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_email_local_part() {
        assert_eq!(Email("test@test.org".to_owned()).local_part(), "test");
        assert_eq!(Email("no-at-sign".to_owned()).local_part(), "no-at-sign");
    }

    #[test]
    fn test_username_from_str() {
        assert!("fjelltopp_editor".parse::<Username>().is_ok());
        assert!("Upper".parse::<Username>().is_err());
        assert!("a".parse::<Username>().is_err());
    }

    #[test]
    fn test_is_identified_by() {
        let user = User {
            id: Id("7f88caf3".to_owned()),
            name: Username("fjelltopp_editor".to_owned()),
            email: None,
            fullname: None,
            display_name: None,
            sysadmin: false,
            state: None,
            created: None,
        };
        assert!(user.is_identified_by("7f88caf3"));
        assert!(user.is_identified_by("fjelltopp_editor"));
        assert!(!user.is_identified_by("someone_else"));
    }
}
