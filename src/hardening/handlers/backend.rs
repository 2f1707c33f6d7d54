//! Stand-in backend pages.
//!
//! They only report what was requested; the interesting part is the gate in
//! front of them.

use axum::{
    extract::{Extension, Path},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::instrument;

use crate::hardening::middleware::CurrentUser;

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Page {
    page: String,
    user: Option<String>,
}

fn username(current: Option<Extension<CurrentUser>>) -> Option<String> {
    current.map(|Extension(CurrentUser(user))| user.username().to_string())
}

#[instrument(skip_all)]
pub async fn home(current: Option<Extension<CurrentUser>>) -> impl IntoResponse {
    Json(Page {
        page: "ui".to_string(),
        user: username(current),
    })
}

#[instrument(skip_all)]
pub async fn module(
    Path(params): Path<HashMap<String, String>>,
    current: Option<Extension<CurrentUser>>,
) -> impl IntoResponse {
    let module = params.get("module").map_or("", String::as_str);
    let page = match params.get("action") {
        Some(action) => format!("{module}/{action}"),
        None => module.to_string(),
    };

    Json(Page {
        page,
        user: username(current),
    })
}
