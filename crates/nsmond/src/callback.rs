//! Acknowledgment callback listener
//!
//! - `POST /slack/interactions`: Slack block-actions callback (Resolve button)
//! - `POST /acknowledge`: plain JSON `{"reference": ..., "actor": ...}`
//! - `GET /healthz`: liveness

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Form, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use nsmon_core::{AckHandler, AckResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Shared handler state
#[derive(Clone)]
pub struct CallbackState {
    ack: Arc<AckHandler>,
}

#[derive(Debug, Deserialize)]
struct InteractionForm {
    payload: String,
}

#[derive(Debug, Deserialize)]
struct AckRequest {
    reference: String,
    #[serde(default)]
    actor: String,
}

/// Build the callback router
pub fn router(ack: Arc<AckHandler>) -> Router {
    Router::new()
        .route("/slack/interactions", post(slack_interaction))
        .route("/acknowledge", post(acknowledge))
        .route("/healthz", get(healthz))
        .with_state(CallbackState { ack })
}

async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

fn bad_request(message: String) -> Response {
    warn!(error = %message, "Rejected malformed callback");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "bad_request", "error": message})),
    )
        .into_response()
}

async fn slack_interaction(
    State(state): State<CallbackState>,
    form: Result<Form<InteractionForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    match nsmon_notify_slack::parse_interaction(&form.payload) {
        Ok(Some(action)) => ack_response(&state, &action.reference, &action.actor).await,
        Ok(None) => {
            debug!("Slack interaction without a resolve action");
            Json(json!({"status": "ignored"})).into_response()
        }
        Err(e) => bad_request(e.to_string()),
    }
}

async fn acknowledge(
    State(state): State<CallbackState>,
    request: Result<Json<AckRequest>, JsonRejection>,
) -> Response {
    match request {
        Ok(Json(request)) => ack_response(&state, &request.reference, &request.actor).await,
        Err(rejection) => bad_request(rejection.body_text()),
    }
}

async fn ack_response(state: &CallbackState, reference: &str, actor: &str) -> Response {
    match state.ack.acknowledge(reference, actor).await {
        Ok(AckResult::Acknowledged(_)) => {
            (StatusCode::OK, Json(json!({"status": "acknowledged"}))).into_response()
        }
        Ok(AckResult::AlreadyAcknowledged(_)) => {
            (StatusCode::OK, Json(json!({"status": "already_acknowledged"}))).into_response()
        }
        Ok(AckResult::NotFound) => {
            (StatusCode::NOT_FOUND, Json(json!({"status": "not_found"}))).into_response()
        }
        Err(e) => {
            error!(reference = %reference, error = %e, "Failed to persist acknowledgment");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error"})),
            )
                .into_response()
        }
    }
}
