//! Authentication outcome endpoints.
//!
//! The authentication pipeline reports each attempt here once it has decided
//! the outcome. The handlers are the wrapped actions; the throttle runs around
//! them and never changes the status they report.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

use crate::hardening::{notice::Notice, throttle::LoginThrottle};

#[derive(Deserialize, Debug, Default)]
pub struct AuthenticationAttempt {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct AuthenticationOutcome {
    status: &'static str,
    messages: Vec<Notice>,
}

#[instrument(skip_all)]
pub async fn failure(
    Extension(throttle): Extension<Arc<LoginThrottle>>,
    payload: Option<Json<AuthenticationAttempt>>,
) -> Response {
    let attempt = payload.map(|Json(attempt)| attempt).unwrap_or_default();

    throttle
        .on_authentication_failure(attempt.username.as_deref(), |notice| async move {
            authentication_failed(notice)
        })
        .await
}

#[instrument(skip_all)]
pub async fn success(
    Extension(throttle): Extension<Arc<LoginThrottle>>,
    payload: Option<Json<AuthenticationAttempt>>,
) -> Response {
    let attempt = payload.map(|Json(attempt)| attempt).unwrap_or_default();

    throttle
        .on_authentication_success(attempt.username.as_deref(), || async {
            authenticated()
        })
        .await
}

fn authentication_failed(notice: Option<Notice>) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(AuthenticationOutcome {
            status: "authentication_failed",
            messages: notice.into_iter().collect(),
        }),
    )
        .into_response()
}

fn authenticated() -> Response {
    (
        StatusCode::OK,
        Json(AuthenticationOutcome {
            status: "authenticated",
            messages: Vec::new(),
        }),
    )
        .into_response()
}
