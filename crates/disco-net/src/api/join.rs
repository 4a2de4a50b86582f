//! `POST /api/v1/join`

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use disco_pair::{JoinRequest, JoinResponse};

use super::{ApiError, ApiState, StatusBody};

/// Join response body: the status envelope plus the sealed credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinBody {
    #[serde(flatten)]
    pub status: StatusBody,
    #[serde(flatten)]
    pub response: JoinResponse,
}

pub async fn handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<JoinBody>, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let request = JoinRequest {
        token,
        public_key: body,
    };

    let response = state.join.handle_join(&request).await?;
    Ok(Json(JoinBody {
        status: StatusBody::from(StatusCode::OK),
        response,
    }))
}
