//! `GET|POST /api/3/action/:name` and `/api/3/helper/:name`, answered in the
//! catalog's action envelope.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use who_romania_client::{Context, Error};

use crate::{actions::Extension, helpers};

type Payload = Map<String, Value>;

#[derive(Clone, Copy)]
enum Target {
    Action,
    Helper,
}

pub async fn get_action(
    State(extension): State<Arc<Extension>>,
    axum::Extension(context): axum::Extension<Context>,
    Path(name): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    run(extension, context, Target::Action, name, from_query(query)).await
}

pub async fn post_action(
    State(extension): State<Arc<Extension>>,
    axum::Extension(context): axum::Extension<Context>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    match from_body(&body) {
        Ok(data) => run(extension, context, Target::Action, name, data).await,
        Err(response) => response,
    }
}

pub async fn get_helper(
    State(extension): State<Arc<Extension>>,
    axum::Extension(context): axum::Extension<Context>,
    Path(name): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    run(extension, context, Target::Helper, name, from_query(query)).await
}

pub async fn post_helper(
    State(extension): State<Arc<Extension>>,
    axum::Extension(context): axum::Extension<Context>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    match from_body(&body) {
        Ok(data) => run(extension, context, Target::Helper, name, data).await,
        Err(response) => response,
    }
}

fn from_query(query: Vec<(String, String)>) -> Payload {
    query
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

/// An empty body is an empty payload. Anything else must be a JSON object.
fn from_body(body: &[u8]) -> Result<Payload, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(data)) => Ok(data),
        Ok(_) => Err(bad_request("Request data must be a JSON object")),
        Err(error) => Err(bad_request(&format!("JSON Error: {error}"))),
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": {"__type": "Bad request", "message": format!("Bad request - {message}")},
        })),
    )
        .into_response()
}

async fn run(
    extension: Arc<Extension>,
    context: Context,
    target: Target,
    name: String,
    data: Payload,
) -> Response {
    let outcome = tokio::task::spawn_blocking(move || match target {
        Target::Action => extension.call(&context, &name, data),
        Target::Helper => helpers::call(&extension, &context, &name, data),
    })
    .await;

    match outcome {
        Ok(Ok(result)) => Json(json!({"success": true, "result": result})).into_response(),
        Ok(Err(error)) => error_response(&error),
        Err(join_error) => {
            error!("Action panicked or was cancelled: {join_error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": {"__type": "Internal Server Error", "message": "Internal server error"},
                })),
            )
                .into_response()
        }
    }
}

pub fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) => StatusCode::CONFLICT,
        Error::NotAuthorized { .. } => StatusCode::FORBIDDEN,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The `error` member of a failed action's envelope.
pub fn error_body(error: &Error) -> Value {
    match error {
        Error::Validation(errors) => {
            let mut body = match serde_json::to_value(errors) {
                Ok(Value::Object(body)) => body,
                _ => Map::new(),
            };
            body.insert("__type".to_owned(), json!("Validation Error"));
            Value::Object(body)
        }
        Error::NotAuthorized { message } => {
            json!({"__type": "Authorization Error", "message": message})
        }
        Error::NotFound { message } => json!({"__type": "Not Found Error", "message": message}),
        other => json!({"__type": "Internal Server Error", "message": other.to_string()}),
    }
}

fn error_response(error: &Error) -> Response {
    let status = error_status(error);
    if status.is_server_error() {
        error!("Action failed: {error}");
    }
    (
        status,
        Json(json!({"success": false, "error": error_body(error)})),
    )
        .into_response()
}
