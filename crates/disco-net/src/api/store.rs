//! Store endpoints.
//!
//! Every handler runs behind [`require_user`](crate::auth::require_user) and
//! checks the user's permission on `{namespace}:store:{key}` before touching
//! the store.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use disco_identity::{Action, User};
use disco_store::{validate_namespace, Keys, DEFAULT_NAMESPACE};

use super::{ApiError, ApiState, StatusBody};

#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Body of `GET /store/keys`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysBody {
    #[serde(flatten)]
    pub status: StatusBody,
    pub keys: Keys,
}

/// Check that `user` may perform `action` on `key`.
///
/// The namespace is validated first so a malformed one is a 400 for every
/// caller, not a 403 for some.
fn authorize(user: &User, action: Action, namespace: &str, key: &str) -> Result<(), ApiError> {
    validate_namespace(namespace)?;
    let target = format!("{}:store:{}", namespace, key);
    if user.can(action.name(), &target) {
        Ok(())
    } else {
        tracing::warn!(user = %user.name, action = %action, target = %target, "permission denied");
        Err(ApiError::Forbidden)
    }
}

pub async fn get_value(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(key): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Response, ApiError> {
    authorize(&user, Action::Read, &query.namespace, &key)?;
    match state.store.get(&query.namespace, &key).await? {
        Some(value) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            value,
        )
            .into_response()),
        None => Err(ApiError::NotFound(format!(
            "key '{}' doesn't exist in the '{}' namespace",
            key, query.namespace
        ))),
    }
}

pub async fn set_value(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(key): Path<String>,
    Query(query): Query<NamespaceQuery>,
    body: Bytes,
) -> Result<Json<StatusBody>, ApiError> {
    authorize(&user, Action::Write, &query.namespace, &key)?;
    state.store.set(&query.namespace, &key, &body).await?;
    tracing::debug!(user = %user.name, namespace = %query.namespace, key = %key, "value set");
    Ok(Json(StatusBody::ok()))
}

pub async fn delete_value(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(key): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Json<StatusBody>, ApiError> {
    authorize(&user, Action::Delete, &query.namespace, &key)?;
    state.store.delete(&query.namespace, &key).await?;
    tracing::debug!(user = %user.name, namespace = %query.namespace, key = %key, "value deleted");
    Ok(Json(StatusBody::ok()))
}

pub async fn list_all_keys(
    state: State<ApiState>,
    user: Extension<User>,
    query: Query<NamespaceQuery>,
) -> Result<Json<KeysBody>, ApiError> {
    list(state, user, String::new(), query).await
}

pub async fn list_keys(
    state: State<ApiState>,
    user: Extension<User>,
    Path(prefix): Path<String>,
    query: Query<NamespaceQuery>,
) -> Result<Json<KeysBody>, ApiError> {
    list(state, user, prefix, query).await
}

async fn list(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    prefix: String,
    Query(query): Query<NamespaceQuery>,
) -> Result<Json<KeysBody>, ApiError> {
    let mut keys = state.store.list(&query.namespace, &prefix).await?;

    // Only keys the user may read are listed.
    for (namespace, names) in keys.iter_mut() {
        names.retain(|key| user.can(Action::Read.name(), &format!("{}:store:{}", namespace, key)));
    }
    keys.retain(|_, names| !names.is_empty());

    Ok(Json(KeysBody {
        status: StatusBody::from(StatusCode::OK),
        keys,
    }))
}
