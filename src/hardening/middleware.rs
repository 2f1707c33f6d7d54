//! axum adapters for the reset gate.
//!
//! The authentication pipeline in front of this service sets
//! `x-authenticated-user`; [`authenticate`] resolves it into a [`CurrentUser`]
//! extension that the gate adapters read.

use axum::{
    extract::{Request, State},
    http::{header::LOCATION, uri::PathAndQuery, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    directory::{User, UserDirectory},
    gate::{GateError, GateOutcome, ResetGate},
};

pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user";

/// The authenticated backend user for this request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

pub async fn authenticate(
    State(directory): State<Arc<dyn UserDirectory>>,
    mut request: Request,
    next: Next,
) -> Response {
    let username = request
        .headers()
        .get(AUTHENTICATED_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    if let Some(username) = username {
        match directory.find_by_username(&username).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(CurrentUser(user));
            }
            Ok(None) => debug!("Unknown authenticated user: {username}"),
            Err(err) => {
                error!("Failed to resolve authenticated user: {err}");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
        }
    }

    next.run(request).await
}

/// Runs [`ResetGate::guard_primary_entry`] around the backend UI.
pub async fn primary_entry(
    State(gate): State<Arc<ResetGate>>,
    request: Request,
    next: Next,
) -> Response {
    let user = current_user(&request);

    let outcome = gate
        .guard_primary_entry(user.as_ref(), || next.run(request))
        .await;

    respond(outcome)
}

/// Runs [`ResetGate::guard_module_entry`] around module pages.
pub async fn module_entry(
    State(gate): State<Arc<ResetGate>>,
    request: Request,
    next: Next,
) -> Response {
    let user = current_user(&request);
    let path = request
        .uri()
        .path_and_query()
        .map_or(request.uri().path(), PathAndQuery::as_str)
        .to_owned();

    let outcome = gate
        .guard_module_entry(user.as_ref(), &path, || next.run(request))
        .await;

    respond(outcome)
}

fn current_user(request: &Request) -> Option<User> {
    request
        .extensions()
        .get::<CurrentUser>()
        .map(|current| current.0.clone())
}

fn respond(outcome: Result<GateOutcome<Response>, GateError>) -> Response {
    match outcome {
        Ok(GateOutcome::Proceed(response)) => response,
        Ok(GateOutcome::Redirect(location)) => found(&location),
        Err(err) => err.into_response(),
    }
}

fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(err) => {
            error!("Invalid redirect location {location}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        error!("Password reset check failed: {self}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
            .into_response()
    }
}
