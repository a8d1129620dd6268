//! The subset of the catalog's action API the extension is written against.
//!
//! Every call carries an explicit [`Context`] naming who the request acts on
//! behalf of. Implementations decide how that identity reaches the catalog; the
//! HTTP [`Client`](crate::Client) forwards it with the substitute-user header.

use serde_json::{Map, Value};

use crate::{
    error::Result,
    resources::{
        activity::Activity,
        dataset::Dataset,
        organization::{Collaborator, NewCollaborator, NewMember, Organization, Permission},
        relationship::{NewRelationship, Relationship},
        search::{SearchParams, SearchResults},
        user::{NewUser, User},
    },
};

/// Request scoped identity. Built once per request and passed down to every
/// action rather than looked up from ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub user: Option<User>,
    /// Skip authorization checks. Only ever set by the service itself.
    pub ignore_auth: bool,
}

impl Context {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: User) -> Self {
        Self {
            user: Some(user),
            ignore_auth: false,
        }
    }

    /// The service acting with its own credentials.
    pub fn site() -> Self {
        Self {
            user: None,
            ignore_auth: true,
        }
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.name.0.as_str())
    }

    pub fn is_sysadmin(&self) -> bool {
        self.user.as_ref().map_or(false, |user| user.sysadmin)
    }
}

pub trait Catalog: Send + Sync {
    /// Resolve an API token to the account that owns it.
    fn authenticate(&self, token: &str) -> Result<Option<User>>;

    fn package_show(&self, context: &Context, id_or_name: &str) -> Result<Dataset>;

    fn package_create(&self, context: &Context, dataset: &Dataset) -> Result<Dataset>;

    fn package_update(&self, context: &Context, dataset: &Dataset) -> Result<Dataset>;

    fn package_patch(
        &self,
        context: &Context,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Dataset>;

    fn package_search(&self, context: &Context, params: &SearchParams) -> Result<SearchResults>;

    /// Newest first.
    fn package_activity_list(&self, context: &Context, id: &str) -> Result<Vec<Activity>>;

    fn package_relationship_create(
        &self,
        context: &Context,
        relationship: &NewRelationship,
    ) -> Result<Relationship>;

    /// Names of the dataset schemas registered with the catalog.
    fn dataset_schema_types(&self, context: &Context) -> Result<Vec<String>>;

    fn user_show(&self, context: &Context, id_or_name: &str) -> Result<User>;

    fn user_list(&self, context: &Context, q: Option<&str>) -> Result<Vec<User>>;

    fn user_create(&self, context: &Context, user: &NewUser) -> Result<User>;

    fn organization_member_create(&self, context: &Context, member: &NewMember) -> Result<()>;

    fn organization_list_for_user(
        &self,
        context: &Context,
        user_id: &str,
        permission: Permission,
    ) -> Result<Vec<Organization>>;

    fn package_collaborator_list(&self, context: &Context, id: &str)
        -> Result<Vec<Collaborator>>;

    fn package_collaborator_create(
        &self,
        context: &Context,
        collaborator: &NewCollaborator,
    ) -> Result<Collaborator>;

    fn package_collaborator_delete(&self, context: &Context, id: &str, user_id: &str)
        -> Result<()>;

    fn group_list(&self, context: &Context) -> Result<Vec<Organization>>;
}
