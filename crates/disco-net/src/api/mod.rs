//! HTTP API routes.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};

use disco_pair::JoinService;
use disco_store::{Catalog, Store};

pub mod error;
pub mod join;
pub mod store;

pub use error::{ApiError, ErrorBody, StatusBody};

use crate::auth::require_user;

/// Prefix of every API route.
pub const API_PREFIX: &str = "/api/v1";

/// Shared state of all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn Store>,
    pub catalog: Arc<dyn Catalog>,
    pub join: Arc<JoinService>,
}

async fn ping() -> &'static str {
    "."
}

async fn not_found(headers: HeaderMap) -> Response {
    let accept = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok());

    match accept {
        Some(accept) if accept.contains("application/json") => {
            ApiError::NotFound("not found".to_string()).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// All API routes with `state` applied.
///
/// Store routes require an authenticated user; `/join` and `/ping` don't.
pub fn router(state: ApiState) -> Router {
    let store_routes = Router::new()
        .route(
            "/value/*key",
            get(store::get_value)
                .post(store::set_value)
                .delete(store::delete_value),
        )
        .route("/keys", get(store::list_all_keys))
        .route("/keys/*prefix", get(store::list_keys))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let api = Router::new()
        .route("/join", post(join::handler))
        .route("/ping", get(ping))
        .nest("/store", store_routes);

    Router::new()
        .nest(API_PREFIX, api)
        .fallback(not_found)
        .with_state(state)
}
