// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile creation endpoints called by the sign-up and onboarding flows.
//!
//! These run with service credentials. Backend failures are returned to the
//! caller verbatim as `500 {"error": ...}`.

use crate::error::{AppError, Result};
use crate::middleware::RequestSession;
use crate::models::{NewProfile, Role};
use crate::services::RoleProfileOutcome;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

pub const PROFILE_EXISTS_MESSAGE: &str = "Profile already exists";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/create-profile", post(create_profile))
        .route("/api/auth/create-client-profile", post(create_client_profile))
        .route(
            "/api/auth/create-freelancer-profile",
            post(create_freelancer_profile),
        )
}

/// Full profile submitted at sign-up.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(max = 128))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub is_freelancer: bool,
    #[serde(default)]
    pub is_client: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleProfileRequest {
    pub user_id: Uuid,
}

/// Success body shared by the creation endpoints.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateProfileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CreateProfileResponse {
    fn created() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    fn already_exists() -> Self {
        Self {
            success: true,
            message: Some(PROFILE_EXISTS_MESSAGE.to_string()),
        }
    }
}

impl From<RoleProfileOutcome> for CreateProfileResponse {
    fn from(outcome: RoleProfileOutcome) -> Self {
        match outcome {
            RoleProfileOutcome::Created => Self::created(),
            RoleProfileOutcome::AlreadyExists => Self::already_exists(),
        }
    }
}

/// Create the caller's profile.
///
/// A signed-in caller may write only their own profile and overwrites it.
/// Without a session (sign-up before email confirmation) the row is only
/// inserted if absent, so an existing profile is never changed.
async fn create_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<RequestSession>,
    Json(body): Json<CreateProfileRequest>,
) -> Result<Json<CreateProfileResponse>> {
    body.validate()?;

    let profile = NewProfile {
        id: body.user_id,
        username: Some(body.username),
        full_name: body.full_name,
        email: Some(body.email),
        is_freelancer: body.is_freelancer,
        is_client: body.is_client,
    };
    match current.user {
        Some(user) if user.id != body.user_id => {
            tracing::warn!(
                user_id = %user.id,
                target_id = %body.user_id,
                "Refusing to write another user's profile"
            );
            Err(AppError::Forbidden)
        }
        Some(_) => {
            state.profiles.create_profile(&profile).await?;
            Ok(Json(CreateProfileResponse::created()))
        }
        None => match state.profiles.create_profile_if_absent(&profile).await? {
            Some(_) => Ok(Json(CreateProfileResponse::created())),
            None => Ok(Json(CreateProfileResponse::already_exists())),
        },
    }
}

async fn create_client_profile(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoleProfileRequest>,
) -> Result<Json<CreateProfileResponse>> {
    let outcome = state
        .profiles
        .create_role_profile(body.user_id, Role::Client)
        .await?;
    Ok(Json(outcome.into()))
}

async fn create_freelancer_profile(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoleProfileRequest>,
) -> Result<Json<CreateProfileResponse>> {
    let outcome = state
        .profiles
        .create_role_profile(body.user_id, Role::Freelancer)
        .await?;
    Ok(Json(outcome.into()))
}
