use axum::{
    extract::{Request, State},
    http::{
        header::{self, HeaderName, HeaderValue},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use std::sync::Arc;
use who_romania_client::SUBSTITUTE_USER_HEADER;

use crate::{
    actions::Extension,
    authn::{self, IdentityError},
};

const SECURITY_HEADERS: [(HeaderName, &str); 7] = [
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (
        HeaderName::from_static("cross-origin-opener-policy"),
        "same-origin",
    ),
    (
        HeaderName::from_static("cross-origin-resource-policy"),
        "same-origin",
    ),
    (
        HeaderName::from_static("cross-origin-embedder-policy"),
        "require-corp",
    ),
];

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; \
     style-src 'self' 'unsafe-inline'; img-src 'self' data:; object-src 'none'; \
     frame-ancestors 'self'; base-uri 'self'";

const CLEAR_SITE_DATA: HeaderName = HeaderName::from_static("clear-site-data");

fn header_str(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Attach the acting [`Context`](who_romania_client::Context) to the request.
pub async fn identify(
    State(extension): State<Arc<Extension>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = header_str(&request, header::AUTHORIZATION.as_str()).map(|token| {
        token
            .strip_prefix("Bearer ")
            .map(str::to_owned)
            .unwrap_or(token)
    });
    let substitute = header_str(&request, SUBSTITUTE_USER_HEADER);

    let resolved = tokio::task::spawn_blocking(move || {
        let caller = authn::authenticate(extension.catalog.as_ref(), token.as_deref())?;
        authn::substitute_user(extension.catalog.as_ref(), caller, substitute.as_deref())
    })
    .await;

    match resolved {
        Ok(Ok(context)) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Ok(Err(identity_error)) => {
            if let IdentityError::Catalog(source) = &identity_error {
                error!("Could not resolve request identity: {source}");
            }
            (identity_error.status(), Json(identity_error.body())).into_response()
        }
        Err(join_error) => {
            error!("Identity lookup panicked or was cancelled: {join_error}");
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

/// Security policy headers on every response.
///
/// Pages under a `view` path segment may be framed by other sites, and
/// redirects away from the logout path clear the browser's stored site data.
pub async fn security_headers(
    State(extension): State<Arc<Extension>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;
    let is_redirect = response.status().is_redirection();

    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    if !path.split('/').any(|segment| segment == "view") {
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
    }
    if is_redirect && path == extension.settings.logout_path {
        headers.insert(
            CLEAR_SITE_DATA,
            HeaderValue::from_static("\"cache\", \"cookies\", \"storage\""),
        );
    }
    response
}
