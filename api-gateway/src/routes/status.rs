use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Response body for `GET /status`.
#[derive(Serialize)]
pub struct StatusResponse {
    pub height: u32,
    pub validator: bool,
}

/// `GET /status`
///
/// Reports the current chain height and whether this node holds a
/// validator key, read straight off the running node's chain snapshot.
pub async fn status(State(state): State<SharedState>) -> (StatusCode, Json<StatusResponse>) {
    let response = StatusResponse {
        height: state.chain.height(),
        validator: state.is_validator,
    };
    (StatusCode::OK, Json(response))
}
