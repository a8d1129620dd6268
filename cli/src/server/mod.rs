//! The extension's HTTP service: the action API, template helpers, and the
//! `/lambda` pages, behind the identity and security header layers.

mod action;
mod lambda;
mod middleware;

use anyhow::{Context as _, Result};
use axum::{
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use log::info;
use std::{net::SocketAddr, sync::Arc};

use crate::actions::Extension;

pub use self::middleware::{identify, security_headers};

pub fn build_router(extension: Arc<Extension>) -> Router {
    Router::new()
        .route(
            "/api/3/action/:name",
            get(action::get_action).post(action::post_action),
        )
        .route(
            "/api/3/helper/:name",
            get(action::get_helper).post(action::post_helper),
        )
        .route("/lambda/logs/:function", get(lambda::view_logs))
        .route(
            "/lambda/family-medicine/:dataset_id",
            get(lambda::family_medicine).post(lambda::family_medicine),
        )
        .layer(from_fn_with_state(extension.clone(), identify))
        .layer(from_fn_with_state(extension.clone(), security_headers))
        .with_state(extension)
}

/// Serve until the process is stopped.
pub async fn serve(extension: Arc<Extension>, address: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Could not listen on `{address}`"))?;
    info!("Listening on http://{}", address);
    axum::serve(listener, build_router(extension))
        .await
        .context("Server stopped unexpectedly")
}
