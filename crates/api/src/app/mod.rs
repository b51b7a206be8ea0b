//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (stores, locks, the battle worker)
//! - `routes.rs`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(api_key: String) -> Router {
    let auth_state = middleware::AuthState {
        api_key: Arc::new(api_key),
    };

    let services = Arc::new(services::build_services());

    // Protected routes: everything except the health probe needs the key.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
