//! Who a request acts as: the owner of its API token, or the account a
//! sysadmin names in the substitute-user header.

use axum::http::StatusCode;
use log::debug;
use serde_json::{json, Value};
use who_romania_client::{Catalog, Context, Error};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Only sysadmins may use the CKAN-Substitute-User header")]
    NotSysadmin,

    #[error("CKAN-Substitute-User header does not identify a valid CKAN user")]
    UnknownUser,

    #[error("Could not resolve the request's identity")]
    Catalog(#[source] Error),
}

impl IdentityError {
    pub fn status(&self) -> StatusCode {
        match self {
            IdentityError::NotSysadmin => StatusCode::FORBIDDEN,
            IdentityError::UnknownUser => StatusCode::BAD_REQUEST,
            IdentityError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The response body, in the catalog's action envelope.
    pub fn body(&self) -> Value {
        let kind = match self {
            IdentityError::NotSysadmin => "Not Authorized",
            IdentityError::UnknownUser => "Bad Request",
            IdentityError::Catalog(_) => "Internal Server Error",
        };
        json!({
            "success": false,
            "error": {"__type": kind, "message": self.to_string()},
        })
    }
}

/// Resolve an API token. Unknown tokens leave the request anonymous.
pub fn authenticate(catalog: &dyn Catalog, token: Option<&str>) -> Result<Context, IdentityError> {
    let token = match token.map(str::trim).filter(|token| !token.is_empty()) {
        Some(token) => token,
        None => return Ok(Context::anonymous()),
    };
    match catalog.authenticate(token).map_err(IdentityError::Catalog)? {
        Some(user) => Ok(Context::for_user(user)),
        None => {
            debug!("Request carried an unknown API token");
            Ok(Context::anonymous())
        }
    }
}

/// Swap the caller for the account named by `substitute_user_id` (an id or a
/// login name). Only sysadmins may do this.
pub fn substitute_user(
    catalog: &dyn Catalog,
    caller: Context,
    substitute_user_id: Option<&str>,
) -> Result<Context, IdentityError> {
    let substitute_user_id = match substitute_user_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => return Ok(caller),
    };
    if !caller.is_sysadmin() {
        return Err(IdentityError::NotSysadmin);
    }

    match catalog.user_show(&Context::site(), substitute_user_id) {
        Ok(user) => {
            debug!(
                "`{}` is acting as `{}`",
                caller.user_name().unwrap_or_default(),
                user.name
            );
            Ok(Context::for_user(user))
        }
        Err(error) if error.is_not_found() => Err(IdentityError::UnknownUser),
        Err(error) => Err(IdentityError::Catalog(error)),
    }
}
