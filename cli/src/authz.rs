//! Authorization decisions the extension makes itself, from catalog data.

use who_romania_client::{Context, Dataset, Error, Permission, Result};

use crate::{actions::Extension, config::Settings};

/// May the acting user edit `dataset`?
///
/// Sysadmins may edit anything, editors and admins of the owning organization
/// may edit its datasets, and so may collaborators with edit rights.
pub fn authorize_dataset_update(
    extension: &Extension,
    context: &Context,
    dataset: &Dataset,
) -> Result<()> {
    if context.ignore_auth || context.is_sysadmin() {
        return Ok(());
    }
    let user = match &context.user {
        Some(user) => user,
        None => return Err(not_authorized_to_edit("anonymous", dataset)),
    };
    let site = Context::site();
    let dataset_id = dataset.required_id()?;

    if let Some(owner_org) = &dataset.owner_org {
        let organizations = extension.catalog.organization_list_for_user(
            &site,
            &user.id.0,
            Permission::UpdateDataset,
        )?;
        if organizations
            .iter()
            .any(|organization| &organization.id == owner_org || &organization.name == owner_org)
        {
            return Ok(());
        }
    }

    let collaborators = extension
        .catalog
        .package_collaborator_list(&site, &dataset_id.0)?;
    if collaborators
        .iter()
        .any(|collaborator| collaborator.user_id == user.id && collaborator.capacity.can_edit())
    {
        return Ok(());
    }

    Err(not_authorized_to_edit(&user.name.0, dataset))
}

pub fn authorize_dataset_update_by_id(
    extension: &Extension,
    context: &Context,
    id_or_name: &str,
) -> Result<Dataset> {
    let dataset = extension.catalog.package_show(&Context::site(), id_or_name)?;
    authorize_dataset_update(extension, context, &dataset)?;
    Ok(dataset)
}

fn not_authorized_to_edit(user_name: &str, dataset: &Dataset) -> Error {
    Error::not_authorized(format!(
        "User {} not authorized to edit package {}",
        user_name,
        dataset
            .id
            .as_ref()
            .map(|id| id.0.as_str())
            .unwrap_or_default()
    ))
}

/// Only users on the invoke allow-list, and sysadmins, may run remote functions.
pub fn authorize_lambda_invoke(settings: &Settings, context: &Context) -> Result<()> {
    if context.ignore_auth || context.is_sysadmin() {
        return Ok(());
    }
    match context.user_name() {
        Some(name) if settings.lambda_invoke_users().any(|allowed| allowed == name) => Ok(()),
        _ => Err(Error::not_authorized(
            "You are not authorized to carry out this action",
        )),
    }
}

/// Did the acting user create `dataset`?
pub fn is_dataset_creator(context: &Context, dataset: &Dataset) -> bool {
    match (&context.user, &dataset.creator_user_id) {
        (Some(user), Some(creator)) => &user.id == creator,
        _ => false,
    }
}
