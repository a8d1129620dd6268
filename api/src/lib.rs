#![deny(clippy::all)]
mod catalog;
mod error;
pub mod functions;
pub mod resources;
pub mod retry;

use log::{debug, warn};
use once_cell::sync::Lazy;
use reqwest::{
    blocking::{Client as HttpClient, Response as HttpResponse},
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Proxy, Result as ReqwestResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use url::Url;

use crate::{
    resources::Response,
    retry::{Retrier, RetryConfig},
};

pub use crate::{
    catalog::{Catalog, Context},
    error::{Error, Result, ValidationErrors},
    functions::{FunctionService, FunctionsClient, FunctionsConfig, Invocation, LogEvent, LogEvents},
    resources::{
        activity::{Activity, Id as ActivityId},
        dataset::{
            Dataset, Id as DatasetId, Name as DatasetName, Resource, ResourceId, State as DatasetState,
            Tag,
        },
        organization::{
            Capacity, Collaborator, NewCollaborator, NewMember, Organization, Permission,
        },
        relationship::{NewRelationship, Relationship, RelationshipType},
        search::{FacetItem, SearchFacet, SearchParams, SearchResults},
        user::{
            Email as UserEmail, Id as UserId, Identifier as UserIdentifier, NewUser, User,
            Username,
        },
    },
};

/// Lets a sysadmin token act as another account for the rest of a request.
pub const SUBSTITUTE_USER_HEADER: &str = "CKAN-Substitute-User";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token(pub String);

pub struct Config {
    pub endpoint: Url,
    /// The service account's API token. Requests made for a user are sent
    /// with it plus the substitute-user header.
    pub token: Token,
    pub accept_invalid_certificates: bool,
    pub proxy: Option<Url>,
    /// Applies to reads only, writes are never retried.
    pub retry_config: Option<RetryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: DEFAULT_ENDPOINT.clone(),
            token: Token("".to_owned()),
            accept_invalid_certificates: false,
            proxy: None,
            retry_config: None,
        }
    }
}

#[derive(Debug)]
pub struct Client {
    endpoints: Endpoints,
    http_client: HttpClient,
    token: HeaderValue,
    retrier: Option<Retrier>,
}

#[derive(Serialize)]
struct IdRequest<'request> {
    id: &'request str,
}

#[derive(Serialize)]
struct OrganizationsForUserRequest<'request> {
    id: &'request str,
    permission: &'static str,
}

#[derive(Serialize)]
struct CollaboratorRequest<'request> {
    id: &'request str,
    user_id: &'request str,
}

#[derive(Serialize)]
struct UserListRequest<'request> {
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<&'request str>,
}

impl Client {
    pub fn new(config: Config) -> Result<Client> {
        let http_client =
            build_http_client(config.accept_invalid_certificates, config.proxy.as_ref())?;
        let token = token_header(&config.token)?;
        let endpoints = Endpoints::new(config.endpoint)?;
        let retrier = config.retry_config.map(Retrier::new);
        Ok(Client {
            endpoints,
            http_client,
            token,
            retrier,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.endpoints.base
    }

    /// Headers that carry `context`'s identity to the catalog.
    fn headers_for(&self, context: &Context) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if context.ignore_auth {
            headers.insert(header::AUTHORIZATION, self.token.clone());
        } else if let Some(user) = &context.user {
            headers.insert(header::AUTHORIZATION, self.token.clone());
            headers.insert(
                HeaderName::from_static("ckan-substitute-user"),
                HeaderValue::from_str(&user.id.0).map_err(|_| Error::BadHeader {
                    name: SUBSTITUTE_USER_HEADER,
                    value: user.id.0.clone(),
                })?,
            );
        }
        Ok(headers)
    }

    fn read<RequestT, SuccessT>(
        &self,
        context: &Context,
        action: &str,
        body: &RequestT,
    ) -> Result<SuccessT>
    where
        RequestT: Serialize,
        for<'de> SuccessT: Deserialize<'de>,
    {
        let headers = self.headers_for(context)?;
        self.action(action, headers, body, Retry::Yes)?
            .ok_or_else(|| missing_result(action))
    }

    fn write<RequestT, SuccessT>(
        &self,
        context: &Context,
        action: &str,
        body: &RequestT,
    ) -> Result<SuccessT>
    where
        RequestT: Serialize,
        for<'de> SuccessT: Deserialize<'de>,
    {
        let headers = self.headers_for(context)?;
        self.action(action, headers, body, Retry::No)?
            .ok_or_else(|| missing_result(action))
    }

    fn action<RequestT, SuccessT>(
        &self,
        action: &str,
        headers: HeaderMap,
        body: &RequestT,
        retry: Retry,
    ) -> Result<Option<SuccessT>>
    where
        RequestT: Serialize,
        for<'de> SuccessT: Deserialize<'de>,
    {
        let url = self.endpoints.action(action)?;
        debug!("Attempting POST `{}`", url);

        let do_request = || {
            self.http_client
                .post(url.clone())
                .headers(headers.clone())
                .json(body)
                .send()
        };
        let http_response = match retry {
            Retry::Yes => self.with_retries(do_request),
            Retry::No => do_request(),
        }
        .map_err(|source| Error::ReqwestError {
            source,
            message: format!("Action `{action}` failed."),
        })?;

        let status = http_response.status();
        http_response
            .json::<Response<SuccessT>>()
            .map_err(Error::BadJsonResponse)?
            .into_result(status)
    }

    fn with_retries(
        &self,
        send_request: impl Fn() -> ReqwestResult<HttpResponse>,
    ) -> ReqwestResult<HttpResponse> {
        match &self.retrier {
            Some(retrier) => retrier.with_retries(send_request),
            None => send_request(),
        }
    }
}

impl Catalog for Client {
    fn authenticate(&self, token: &str) -> Result<Option<User>> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            token_header(&Token(token.to_owned()))?,
        );
        match self.action("user_show_me", headers, &json!({}), Retry::Yes) {
            Ok(user) => Ok(user),
            Err(error) if error.is_not_authorized() => Ok(None),
            Err(error) if error.is_not_found() => {
                warn!(
                    "The catalog at `{}` has no `user_show_me` action ({}), treating the \
                     request as anonymous.",
                    self.base_url(),
                    error
                );
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn package_show(&self, context: &Context, id_or_name: &str) -> Result<Dataset> {
        self.read(context, "package_show", &IdRequest { id: id_or_name })
    }

    fn package_create(&self, context: &Context, dataset: &Dataset) -> Result<Dataset> {
        self.write(context, "package_create", dataset)
    }

    fn package_update(&self, context: &Context, dataset: &Dataset) -> Result<Dataset> {
        self.write(context, "package_update", dataset)
    }

    fn package_patch(
        &self,
        context: &Context,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Dataset> {
        let mut body = fields.clone();
        body.insert("id".to_owned(), Value::String(id.to_owned()));
        self.write(context, "package_patch", &body)
    }

    fn package_search(&self, context: &Context, params: &SearchParams) -> Result<SearchResults> {
        self.read(context, "package_search", params)
    }

    fn package_activity_list(&self, context: &Context, id: &str) -> Result<Vec<Activity>> {
        self.read(context, "package_activity_list", &IdRequest { id })
    }

    fn package_relationship_create(
        &self,
        context: &Context,
        relationship: &NewRelationship,
    ) -> Result<Relationship> {
        self.write(context, "package_relationship_create", relationship)
    }

    fn dataset_schema_types(&self, context: &Context) -> Result<Vec<String>> {
        self.read(context, "scheming_dataset_schema_list", &json!({}))
    }

    fn user_show(&self, context: &Context, id_or_name: &str) -> Result<User> {
        self.read(context, "user_show", &IdRequest { id: id_or_name })
    }

    fn user_list(&self, context: &Context, q: Option<&str>) -> Result<Vec<User>> {
        self.read(context, "user_list", &UserListRequest { q })
    }

    fn user_create(&self, context: &Context, user: &NewUser) -> Result<User> {
        self.write(context, "user_create", user)
    }

    fn organization_member_create(&self, context: &Context, member: &NewMember) -> Result<()> {
        let headers = self.headers_for(context)?;
        self.action::<_, Value>("organization_member_create", headers, member, Retry::No)?;
        Ok(())
    }

    fn organization_list_for_user(
        &self,
        context: &Context,
        user_id: &str,
        permission: Permission,
    ) -> Result<Vec<Organization>> {
        self.read(
            context,
            "organization_list_for_user",
            &OrganizationsForUserRequest {
                id: user_id,
                permission: permission.as_str(),
            },
        )
    }

    fn package_collaborator_list(
        &self,
        context: &Context,
        id: &str,
    ) -> Result<Vec<Collaborator>> {
        self.read(context, "package_collaborator_list", &IdRequest { id })
    }

    fn package_collaborator_create(
        &self,
        context: &Context,
        collaborator: &NewCollaborator,
    ) -> Result<Collaborator> {
        self.write(context, "package_collaborator_create", collaborator)
    }

    fn package_collaborator_delete(
        &self,
        context: &Context,
        id: &str,
        user_id: &str,
    ) -> Result<()> {
        let headers = self.headers_for(context)?;
        self.action::<_, Value>(
            "package_collaborator_delete",
            headers,
            &CollaboratorRequest { id, user_id },
            Retry::No,
        )?;
        Ok(())
    }

    fn group_list(&self, context: &Context) -> Result<Vec<Organization>> {
        self.read(
            context,
            "group_list",
            &json!({"sort": "title asc", "all_fields": true}),
        )
    }
}

#[derive(Copy, Clone)]
enum Retry {
    Yes,
    No,
}

fn missing_result(action: &str) -> Error {
    Error::BadProtocol {
        status_code: reqwest::StatusCode::OK,
        message: format!("`{action}` returned no result"),
    }
}

#[derive(Debug)]
struct Endpoints {
    base: Url,
    actions: Url,
}

pub(crate) fn construct_endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut endpoint = base.clone();

    let mut endpoint_segments = endpoint
        .path_segments_mut()
        .map_err(|_| Error::BadEndpoint {
            endpoint: base.clone(),
        })?;

    endpoint_segments.pop_if_empty();
    for segment in segments {
        endpoint_segments.push(segment);
    }

    drop(endpoint_segments);

    Ok(endpoint)
}

impl Endpoints {
    pub fn new(base: Url) -> Result<Self> {
        let actions = construct_endpoint(&base, &["api", "3", "action"])?;
        Ok(Endpoints { base, actions })
    }

    fn action(&self, name: &str) -> Result<Url> {
        construct_endpoint(&self.actions, &[name])
    }
}

const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 120;

fn build_http_client(
    accept_invalid_certificates: bool,
    proxy: Option<&Url>,
) -> Result<HttpClient> {
    let mut builder = HttpClient::builder()
        .gzip(true)
        .danger_accept_invalid_certs(accept_invalid_certificates)
        .timeout(Some(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS)));

    if let Some(proxy) = proxy.cloned() {
        builder = builder.proxy(Proxy::all(proxy).map_err(Error::BuildHttpClient)?);
    }
    builder.build().map_err(Error::BuildHttpClient)
}

/// Catalog API tokens go in the `Authorization` header as they are, no scheme.
fn token_header(token: &Token) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&token.0).map_err(|_| Error::BadToken {
        token: token.0.clone(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}

pub static DEFAULT_ENDPOINT: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost:5000").expect("Default URL is well-formed"));
