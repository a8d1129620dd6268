//! Collaborator management where a dataset's creator is always allowed in.

use serde_json::{Map, Value};
use who_romania_client::{Capacity, Collaborator, Context, NewCollaborator, Result};

use crate::{
    actions::{required_str, Extension},
    authz,
};

/// The context the catalog call runs under: the service's own when the acting
/// user created the dataset, otherwise the caller's so the catalog's own rule
/// decides.
fn collaborator_context(extension: &Extension, context: &Context, id: &str) -> Result<Context> {
    let dataset = extension.catalog.package_show(&Context::site(), id)?;
    if authz::is_dataset_creator(context, &dataset) {
        Ok(Context::site())
    } else {
        Ok(context.clone())
    }
}

pub fn package_collaborator_list(
    extension: &Extension,
    context: &Context,
    data: Map<String, Value>,
) -> Result<Vec<Collaborator>> {
    let id = required_str(&data, "id")?;
    let context = collaborator_context(extension, context, id)?;
    extension.catalog.package_collaborator_list(&context, id)
}

pub fn package_collaborator_create(
    extension: &Extension,
    context: &Context,
    data: Map<String, Value>,
) -> Result<Collaborator> {
    let id = required_str(&data, "id")?;
    let user_id = required_str(&data, "user_id")?;
    let capacity: Capacity = required_str(&data, "capacity")?.parse()?;

    let context = collaborator_context(extension, context, id)?;
    extension.catalog.package_collaborator_create(
        &context,
        &NewCollaborator {
            id: id.to_owned(),
            user_id: user_id.to_owned(),
            capacity,
        },
    )
}

pub fn package_collaborator_delete(
    extension: &Extension,
    context: &Context,
    data: Map<String, Value>,
) -> Result<()> {
    let id = required_str(&data, "id")?;
    let user_id = required_str(&data, "user_id")?;

    let context = collaborator_context(extension, context, id)?;
    extension
        .catalog
        .package_collaborator_delete(&context, id, user_id)
}
