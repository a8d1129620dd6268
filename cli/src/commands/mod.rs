use anyhow::{anyhow, Context as _, Error, Result};
use log::warn;
use serde_json::{Map, Value};
use std::{str::FromStr, sync::Arc};
use who_romania_client::Context;

use crate::{actions::Extension, authn};

pub mod config;
pub mod create;
pub mod dataset;
pub mod get;
pub mod lambda;
pub mod serve;

/// An extension plus the identity operator commands run with.
pub struct Session {
    pub extension: Arc<Extension>,
    token: String,
    as_user: Option<String>,
}

impl Session {
    pub fn new(extension: Arc<Extension>, token: String, as_user: Option<String>) -> Self {
        Self {
            extension,
            token,
            as_user,
        }
    }

    /// The token's owner, or the account it substitutes with `--as-user`.
    ///
    /// Resolved the same way the HTTP service resolves a request's headers.
    pub fn context(&self) -> Result<Context> {
        let catalog = self.extension.catalog.as_ref();
        let caller = authn::authenticate(catalog, Some(self.token.as_str()))
            .context("Could not resolve the API token in use")?;
        let context = authn::substitute_user(catalog, caller, self.as_user.as_deref())
            .with_context(|| {
                format!(
                    "Could not act as `{}`",
                    self.as_user.as_deref().unwrap_or_default()
                )
            })?;
        if context.user.is_none() {
            warn!("The API token in use does not belong to any account, acting anonymously.");
        }
        Ok(context)
    }
}

/// A JSON object given on the command line.
#[derive(Debug, Clone, Default)]
pub struct JsonObject(pub Map<String, Value>);

impl FromStr for JsonObject {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        match serde_json::from_str(string).context("Invalid JSON")? {
            Value::Object(object) => Ok(JsonObject(object)),
            _ => Err(anyhow!("Expected a JSON object, got `{}`", string)),
        }
    }
}
