// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::Access;
use crate::error::{AppError, Result};
use crate::middleware::gate::RequestSession;
use crate::models::{Profile, ProfileLookup, User};
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes. Anonymous callers never reach these: the session gate
/// redirects them to sign-in first.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/session", get(get_session))
}

/// Data the authenticated layout renders with.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub user: User,
    /// `None` when the profile could not be loaded; the page degrades
    /// instead of failing.
    pub profile: Option<Profile>,
}

/// Current user and profile, bootstrapping a default profile on first visit.
async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<RequestSession>,
) -> Result<Json<SessionResponse>> {
    let (Some(user), Some(token)) = (current.user.clone(), current.access_token()) else {
        return Err(AppError::Unauthorized);
    };

    let profile = match state.profiles.ensure_profile(Access::User(token), &user).await {
        ProfileLookup::Found(profile) => Some(profile),
        ProfileLookup::NotFound => None,
        ProfileLookup::TransientError(msg) => {
            tracing::warn!(user_id = %user.id, error = %msg, "Rendering without profile");
            None
        }
    };

    Ok(Json(SessionResponse { user, profile }))
}
