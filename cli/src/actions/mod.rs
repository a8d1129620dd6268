//! The extension's actions, callable by name with a JSON payload.
//!
//! Actions that wrap a catalog action of the same name take the next stage
//! explicitly and call it last, so the chain is visible at the call site.

pub mod collaborator;
pub mod dataset;
pub mod lambda;
pub mod slug;
pub mod user;

use log::error;
use serde::Serialize;
use serde_json::{Map, Value};
use std::{fmt::Display, sync::Arc};
use who_romania_client::{Catalog, Context, Error, FunctionService, Result};

use crate::config::Settings;

/// Everything an action needs besides the request itself.
pub struct Extension {
    pub catalog: Arc<dyn Catalog>,
    pub functions: Arc<dyn FunctionService>,
    pub settings: Settings,
}

impl Extension {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        functions: Arc<dyn FunctionService>,
        settings: Settings,
    ) -> Self {
        Self {
            catalog,
            functions,
            settings,
        }
    }

    /// Run the action called `name`. Unknown names are reported as not found.
    pub fn call(&self, context: &Context, name: &str, data: Map<String, Value>) -> Result<Value> {
        let mut rng = rand::thread_rng();
        match name {
            "user_show_me" => to_value(user::user_show_me(context)?),
            "user_create" => to_value(user::user_create(self, context, data, &mut rng)?),
            "user_list" => to_value(user::user_list(self, context, data)?),
            "package_create" => {
                to_value(dataset::package_create(self, context, data, &mut rng)?)
            }
            "package_update" => {
                to_value(dataset::package_update(self, context, data, &mut rng)?)
            }
            "dataset_duplicate" => {
                to_value(dataset::dataset_duplicate(self, context, data, &mut rng)?)
            }
            "dataset_tag_replace" => to_value(dataset::dataset_tag_replace(self, context, data)?),
            "package_collaborator_list" => {
                to_value(collaborator::package_collaborator_list(self, context, data)?)
            }
            "package_collaborator_create" => {
                to_value(collaborator::package_collaborator_create(self, context, data)?)
            }
            "package_collaborator_delete" => {
                collaborator::package_collaborator_delete(self, context, data)?;
                Ok(Value::Null)
            }
            "lambda_invoke" => lambda::lambda_invoke(self, context, data),
            "lambda_logs" => to_value(lambda::lambda_logs(self, context, data)?),
            _ => Err(Error::not_found(format!("Action name not known: {name}"))),
        }
    }
}

/// Run a side effect whose failure must not fail the surrounding action.
pub fn best_effort<T>(description: impl Display, operation: impl FnOnce() -> Result<T>) -> Option<T> {
    match operation() {
        Ok(value) => Some(value),
        Err(error) => {
            error!("Failed to {description}: {error}");
            None
        }
    }
}

/// A required, non-empty field of an action payload.
pub fn required<'data>(data: &'data Map<String, Value>, field: &str) -> Result<&'data Value> {
    match data.get(field) {
        None | Some(Value::Null) => Err(Error::invalid_field(field, "Missing value")),
        Some(Value::String(value)) if value.is_empty() => {
            Err(Error::invalid_field(field, "Missing value"))
        }
        Some(value) => Ok(value),
    }
}

pub fn required_str<'data>(data: &'data Map<String, Value>, field: &str) -> Result<&'data str> {
    required(data, field)?
        .as_str()
        .ok_or_else(|| Error::invalid_field(field, "Must be a string"))
}

/// A string form of `value` for use in identifiers, numbers included.
pub fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(string) => Some(string.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn to_value(result: impl Serialize) -> Result<Value> {
    serde_json::to_value(result).map_err(|source| Error::Unknown {
        message: "Could not serialise action result".to_owned(),
        source: Box::new(source),
    })
}
