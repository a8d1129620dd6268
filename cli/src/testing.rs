//! In-memory stand-ins for the catalog and the remote function service.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};
use who_romania_client::{
    Activity, ActivityId, Capacity, Catalog, Collaborator, Context, Dataset, DatasetId,
    DatasetName, DatasetState, Error, FunctionService, Invocation, LogEvent, LogEvents,
    NewCollaborator, NewMember, NewRelationship, NewUser, Organization, Permission, Relationship,
    Resource, ResourceId, Result, SearchParams, SearchResults, Tag, User, UserId, Username,
};

use crate::{actions::Extension, config::Settings};

static FQ_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"tags:([^\s()]+)").unwrap());

pub fn dataset(id: &str, name: &str) -> Dataset {
    Dataset {
        id: Some(DatasetId(id.to_owned())),
        name: Some(DatasetName(name.to_owned())),
        title: Some(name.replace('-', " ")),
        state: Some(DatasetState::Active),
        ..Default::default()
    }
}

pub fn tagged(mut dataset: Dataset, tags: &[&str]) -> Dataset {
    dataset.tags = tags.iter().map(|name| Tag::new(*name)).collect();
    dataset
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: UserId(id.to_owned()),
        name: Username(name.to_owned()),
        email: None,
        fullname: Some(format!("Full {name}")),
        display_name: None,
        sysadmin: false,
        state: Some("active".to_owned()),
        created: None,
    }
}

pub fn sysadmin(id: &str, name: &str) -> User {
    User {
        sysadmin: true,
        ..user(id, name)
    }
}

pub fn extension(catalog: FakeCatalog) -> (Extension, Arc<FakeCatalog>) {
    let (extension, catalog, _) =
        extension_with(catalog, FakeFunctions::default(), Settings::default());
    (extension, catalog)
}

pub fn extension_with(
    catalog: FakeCatalog,
    functions: FakeFunctions,
    settings: Settings,
) -> (Extension, Arc<FakeCatalog>, Arc<FakeFunctions>) {
    let catalog = Arc::new(catalog);
    let functions = Arc::new(functions);
    (
        Extension::new(catalog.clone(), functions.clone(), settings),
        catalog,
        functions,
    )
}

fn failure(message: &str) -> Error {
    Error::Api {
        status_code: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.to_owned(),
    }
}

#[derive(Default)]
struct CatalogState {
    datasets: Vec<Dataset>,
    users: Vec<User>,
    tokens: HashMap<String, String>,
    activities: HashMap<String, Vec<Activity>>,
    relationships: Vec<NewRelationship>,
    schema_types: Vec<String>,
    memberships: Vec<(String, String, Capacity)>,
    collaborators: Vec<Collaborator>,
    groups: Vec<Organization>,
    calls: Vec<(&'static str, Context)>,
    searches: Vec<SearchParams>,
    patches: Vec<(String, Map<String, Value>)>,
    new_users: Vec<NewUser>,
    all_names_taken: bool,
    failing: HashSet<&'static str>,
    next_id: usize,
}

/// A catalog kept in memory. Authorization is only enforced where the
/// extension defers to the catalog's own rules.
#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
}

impl FakeCatalog {
    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap()
    }

    fn record(&self, action: &'static str, context: &Context) -> Result<()> {
        let mut state = self.state();
        state.calls.push((action, context.clone()));
        if state.failing.contains(action) {
            Err(failure(&format!("{action} is down")))
        } else {
            Ok(())
        }
    }

    pub fn with_datasets(self, datasets: Vec<Dataset>) -> Self {
        self.state().datasets.extend(datasets);
        self
    }

    pub fn with_users(self, users: Vec<User>) -> Self {
        self.state().users.extend(users);
        self
    }

    pub fn with_token(self, token: &str, user_id: &str) -> Self {
        self.state()
            .tokens
            .insert(token.to_owned(), user_id.to_owned());
        self
    }

    pub fn with_activities(self, dataset_id: &str, activity_ids: &[&str]) -> Self {
        let activities = activity_ids
            .iter()
            .map(|id| Activity {
                id: ActivityId((*id).to_owned()),
                activity_type: "changed package".to_owned(),
                object_id: Some(dataset_id.to_owned()),
                user_id: None,
                timestamp: None,
            })
            .collect();
        self.state()
            .activities
            .insert(dataset_id.to_owned(), activities);
        self
    }

    pub fn with_schema_types(self, types: &[&str]) -> Self {
        self.state().schema_types = types.iter().map(|name| (*name).to_owned()).collect();
        self
    }

    pub fn with_membership(self, organization: &str, user_id: &str, capacity: Capacity) -> Self {
        self.state()
            .memberships
            .push((organization.to_owned(), user_id.to_owned(), capacity));
        self
    }

    pub fn with_collaborator(self, dataset_id: &str, user_id: &str, capacity: Capacity) -> Self {
        self.state().collaborators.push(Collaborator {
            package_id: DatasetId(dataset_id.to_owned()),
            user_id: UserId(user_id.to_owned()),
            capacity,
            modified: None,
        });
        self
    }

    pub fn with_groups(self, names: &[&str]) -> Self {
        self.state().groups = names
            .iter()
            .map(|name| organization(name, Some(Capacity::Member)))
            .collect();
        self
    }

    /// Every name looks taken by an active dataset.
    pub fn with_all_names_taken(self) -> Self {
        self.state().all_names_taken = true;
        self
    }

    pub fn failing(self, action: &'static str) -> Self {
        self.state().failing.insert(action);
        self
    }

    pub fn calls_to(&self, action: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|(called, _)| *called == action)
            .count()
    }

    pub fn contexts_for(&self, action: &str) -> Vec<Context> {
        self.state()
            .calls
            .iter()
            .filter(|(called, _)| *called == action)
            .map(|(_, context)| context.clone())
            .collect()
    }

    pub fn stored_dataset(&self, id_or_name: &str) -> Option<Dataset> {
        find_dataset(&self.state().datasets, id_or_name).cloned()
    }

    pub fn stored_user(&self, id_or_name: &str) -> Option<User> {
        self.state()
            .users
            .iter()
            .find(|user| user.is_identified_by(id_or_name))
            .cloned()
    }

    pub fn relationships(&self) -> Vec<NewRelationship> {
        self.state().relationships.clone()
    }

    pub fn memberships(&self) -> Vec<(String, String, Capacity)> {
        self.state().memberships.clone()
    }

    pub fn searches(&self) -> Vec<SearchParams> {
        self.state().searches.clone()
    }

    pub fn patches(&self) -> Vec<(String, Map<String, Value>)> {
        self.state().patches.clone()
    }

    pub fn collaborators(&self) -> Vec<Collaborator> {
        self.state().collaborators.clone()
    }

    /// Every account request `user_create` received, as sent.
    pub fn new_users(&self) -> Vec<NewUser> {
        self.state().new_users.clone()
    }

    fn allow_collaborator_change(&self, context: &Context) -> Result<()> {
        if context.ignore_auth || context.is_sysadmin() {
            Ok(())
        } else {
            Err(Error::not_authorized("User not authorized to manage collaborators"))
        }
    }
}

fn find_dataset<'a>(datasets: &'a [Dataset], id_or_name: &str) -> Option<&'a Dataset> {
    datasets.iter().find(|dataset| {
        dataset.id.as_ref().map(|id| id.0.as_str()) == Some(id_or_name)
            || dataset.name.as_ref().map(|name| name.0.as_str()) == Some(id_or_name)
    })
}

fn organization(name: &str, capacity: Option<Capacity>) -> Organization {
    Organization {
        id: format!("{name}-id"),
        name: name.to_owned(),
        title: name.to_owned(),
        display_name: None,
        package_count: None,
        capacity,
    }
}

impl Catalog for FakeCatalog {
    fn authenticate(&self, token: &str) -> Result<Option<User>> {
        self.record("authenticate", &Context::site())?;
        let user_id = self.state().tokens.get(token).cloned();
        Ok(user_id.and_then(|user_id| self.stored_user(&user_id)))
    }

    fn package_show(&self, context: &Context, id_or_name: &str) -> Result<Dataset> {
        self.record("package_show", context)?;
        let state = self.state();
        if state.all_names_taken {
            return Ok(dataset("taken", id_or_name));
        }
        find_dataset(&state.datasets, id_or_name)
            .cloned()
            .ok_or_else(|| Error::not_found("Dataset not found"))
    }

    fn package_create(&self, context: &Context, dataset: &Dataset) -> Result<Dataset> {
        self.record("package_create", context)?;
        let mut state = self.state();
        let name = match &dataset.name {
            Some(name) if !name.0.is_empty() => name.clone(),
            _ => return Err(Error::invalid_field("name", "Missing value")),
        };
        if state
            .datasets
            .iter()
            .any(|existing| existing.name.as_ref() == Some(&name) && !existing.is_deleted())
        {
            return Err(Error::invalid_field("name", "That URL is already in use."));
        }

        state.next_id += 1;
        let id = DatasetId(format!("ds-{}", state.next_id));
        let mut created = dataset.clone();
        created.id = Some(id.clone());
        created.state = Some(DatasetState::Active);
        created.creator_user_id = context.user.as_ref().map(|user| user.id.clone());
        for (index, resource) in created.resources.iter_mut().enumerate() {
            *resource = Resource {
                id: Some(ResourceId(format!("{}-res-{}", id.0, index))),
                package_id: Some(id.clone()),
                extras: resource.extras.clone(),
            };
        }
        state.datasets.push(created.clone());
        Ok(created)
    }

    fn package_update(&self, context: &Context, dataset: &Dataset) -> Result<Dataset> {
        self.record("package_update", context)?;
        let mut state = self.state();
        let id = dataset
            .id
            .as_ref()
            .ok_or_else(|| Error::invalid_field("id", "Missing value"))?;
        let stored = state
            .datasets
            .iter_mut()
            .find(|stored| stored.id.as_ref() == Some(id))
            .ok_or_else(|| Error::not_found("Dataset not found"))?;
        *stored = dataset.clone();
        Ok(stored.clone())
    }

    fn package_patch(
        &self,
        context: &Context,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Dataset> {
        self.record("package_patch", context)?;
        let mut state = self.state();
        state.patches.push((id.to_owned(), fields.clone()));
        let stored = state
            .datasets
            .iter_mut()
            .find(|stored| stored.id.as_ref().map(|id| id.0.as_str()) == Some(id))
            .ok_or_else(|| Error::not_found("Dataset not found"))?;
        *stored = stored.clone().merged_with(fields)?;
        Ok(stored.clone())
    }

    fn package_search(&self, context: &Context, params: &SearchParams) -> Result<SearchResults> {
        self.record("package_search", context)?;
        let mut state = self.state();
        state.searches.push(params.clone());
        let wanted: Vec<String> = params
            .fq
            .as_deref()
            .map(|fq| {
                FQ_TAG
                    .captures_iter(fq)
                    .map(|captures| captures[1].to_owned())
                    .collect()
            })
            .unwrap_or_default();
        let results: Vec<Dataset> = state
            .datasets
            .iter()
            .filter(|dataset| !dataset.is_deleted())
            .filter(|dataset| {
                wanted.is_empty()
                    || dataset
                        .tag_names()
                        .any(|tag| wanted.iter().any(|wanted| wanted == tag))
            })
            .take(params.rows.map_or(usize::MAX, |rows| rows as usize))
            .cloned()
            .collect();
        Ok(SearchResults {
            count: results.len() as u64,
            results,
            search_facets: Default::default(),
        })
    }

    fn package_activity_list(&self, context: &Context, id: &str) -> Result<Vec<Activity>> {
        self.record("package_activity_list", context)?;
        Ok(self.state().activities.get(id).cloned().unwrap_or_default())
    }

    fn package_relationship_create(
        &self,
        context: &Context,
        relationship: &NewRelationship,
    ) -> Result<Relationship> {
        self.record("package_relationship_create", context)?;
        self.state().relationships.push(relationship.clone());
        Ok(Relationship {
            subject: relationship.subject.0.clone(),
            object: relationship.object.0.clone(),
            kind: relationship.kind,
            comment: relationship.comment.clone(),
        })
    }

    fn dataset_schema_types(&self, context: &Context) -> Result<Vec<String>> {
        self.record("dataset_schema_types", context)?;
        Ok(self.state().schema_types.clone())
    }

    fn user_show(&self, context: &Context, id_or_name: &str) -> Result<User> {
        self.record("user_show", context)?;
        self.stored_user(id_or_name)
            .ok_or_else(|| Error::not_found("User not found"))
    }

    fn user_list(&self, context: &Context, q: Option<&str>) -> Result<Vec<User>> {
        self.record("user_list", context)?;
        Ok(self
            .state()
            .users
            .iter()
            .filter(|user| q.map_or(true, |q| user.name.0.contains(q)))
            .cloned()
            .collect())
    }

    fn user_create(&self, context: &Context, new_user: &NewUser) -> Result<User> {
        self.record("user_create", context)?;
        let mut state = self.state();
        state.new_users.push(new_user.clone());
        let name = new_user
            .name
            .clone()
            .ok_or_else(|| Error::invalid_field("name", "Missing value"))?;
        if state.users.iter().any(|user| user.name == name) {
            return Err(Error::invalid_field(
                "name",
                "That login name is not available.",
            ));
        }
        state.next_id += 1;
        let created = User {
            id: UserId(
                new_user
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("user-{}", state.next_id)),
            ),
            name,
            email: new_user.email.clone(),
            fullname: new_user.fullname.clone(),
            display_name: None,
            sysadmin: false,
            state: Some("active".to_owned()),
            created: None,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    fn organization_member_create(&self, context: &Context, member: &NewMember) -> Result<()> {
        self.record("organization_member_create", context)?;
        let mut state = self.state();
        let user_id = state
            .users
            .iter()
            .find(|user| user.is_identified_by(member.username))
            .map(|user| user.id.0.clone())
            .unwrap_or_else(|| member.username.to_owned());
        state
            .memberships
            .push((member.id.to_owned(), user_id, member.role));
        Ok(())
    }

    fn organization_list_for_user(
        &self,
        context: &Context,
        user_id: &str,
        permission: Permission,
    ) -> Result<Vec<Organization>> {
        self.record("organization_list_for_user", context)?;
        Ok(self
            .state()
            .memberships
            .iter()
            .filter(|(_, member, capacity)| {
                member == user_id
                    && match permission {
                        Permission::Read => true,
                        Permission::CreateDataset | Permission::UpdateDataset => {
                            capacity.can_edit()
                        }
                        Permission::ManageGroup => *capacity == Capacity::Admin,
                    }
            })
            .map(|(name, _, capacity)| organization(name, Some(*capacity)))
            .collect())
    }

    fn package_collaborator_list(
        &self,
        context: &Context,
        id: &str,
    ) -> Result<Vec<Collaborator>> {
        self.record("package_collaborator_list", context)?;
        Ok(self
            .state()
            .collaborators
            .iter()
            .filter(|collaborator| collaborator.package_id.0 == id)
            .cloned()
            .collect())
    }

    fn package_collaborator_create(
        &self,
        context: &Context,
        collaborator: &NewCollaborator,
    ) -> Result<Collaborator> {
        self.record("package_collaborator_create", context)?;
        self.allow_collaborator_change(context)?;
        let created = Collaborator {
            package_id: DatasetId(collaborator.id.clone()),
            user_id: UserId(collaborator.user_id.clone()),
            capacity: collaborator.capacity,
            modified: None,
        };
        self.state().collaborators.push(created.clone());
        Ok(created)
    }

    fn package_collaborator_delete(
        &self,
        context: &Context,
        id: &str,
        user_id: &str,
    ) -> Result<()> {
        self.record("package_collaborator_delete", context)?;
        self.allow_collaborator_change(context)?;
        self.state().collaborators.retain(|collaborator| {
            !(collaborator.package_id.0 == id && collaborator.user_id.0 == user_id)
        });
        Ok(())
    }

    fn group_list(&self, context: &Context) -> Result<Vec<Organization>> {
        self.record("group_list", context)?;
        Ok(self.state().groups.clone())
    }
}

#[derive(Default)]
struct FunctionsState {
    invocations: Vec<(String, Value)>,
    streams: HashMap<String, String>,
    events: Vec<LogEvent>,
    log_requests: Vec<(String, String, i64)>,
    failing: Option<String>,
}

#[derive(Default)]
pub struct FakeFunctions {
    state: Mutex<FunctionsState>,
}

impl FakeFunctions {
    fn state(&self) -> MutexGuard<'_, FunctionsState> {
        self.state.lock().unwrap()
    }

    pub fn with_stream(self, log_group: &str, stream: &str) -> Self {
        self.state()
            .streams
            .insert(log_group.to_owned(), stream.to_owned());
        self
    }

    pub fn with_events(self, messages: &[&str]) -> Self {
        self.state().events = messages
            .iter()
            .enumerate()
            .map(|(index, message)| LogEvent {
                timestamp: index as i64,
                message: (*message).to_owned(),
                ingestion_time: index as i64,
            })
            .collect();
        self
    }

    pub fn failing_with(self, message: &str) -> Self {
        self.state().failing = Some(message.to_owned());
        self
    }

    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.state().invocations.clone()
    }

    pub fn log_requests(&self) -> Vec<(String, String, i64)> {
        self.state().log_requests.clone()
    }

    fn check(&self) -> Result<()> {
        match &self.state().failing {
            Some(message) => Err(failure(message)),
            None => Ok(()),
        }
    }
}

impl FunctionService for FakeFunctions {
    fn invoke_event(&self, function: &str, payload: &Value) -> Result<Invocation> {
        self.check()?;
        self.state()
            .invocations
            .push((function.to_owned(), payload.clone()));
        Ok(Invocation { status_code: 202 })
    }

    fn latest_log_stream(&self, log_group: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.state().streams.get(log_group).cloned())
    }

    fn log_events(&self, log_group: &str, log_stream: &str, start_time: i64) -> Result<LogEvents> {
        self.check()?;
        let mut state = self.state();
        state
            .log_requests
            .push((log_group.to_owned(), log_stream.to_owned(), start_time));
        Ok(LogEvents {
            events: state.events.clone(),
            next_forward_token: None,
            next_backward_token: None,
        })
    }
}

/// Shorthand for building action payloads in tests.
pub fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
