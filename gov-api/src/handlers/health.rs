use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use gov_common::health::HealthStatus;

use crate::state::AppState;

/// Wraps `gov_common::health::HealthStatus` the way
/// `hook_common::health::HealthStatus`'s own `IntoResponse` impl does: 200
/// when every registered component is healthy, 500 otherwise, body is the
/// debug-printed component map.
struct HealthResponse(HealthStatus);

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let body = format!("{:?}", self.0.components);
        let status = if self.0.healthy {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, body).into_response()
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    HealthResponse(state.health.get_status())
}
