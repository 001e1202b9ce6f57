// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth callback and sign-out routes.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use futures_util::FutureExt;
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::gate::SIGN_IN_PATH;
use crate::models::Session;
use crate::session_store::SessionCookies;
use crate::AppState;

pub const CONFIRMATION_SUCCESS_PATH: &str = "/auth/confirmation-success";
const EMAIL_CONFIRMATION_FLOW: &str = "email_confirmation";
/// Error marker used when the callback fails for an unexpected reason.
const CALLBACK_ERROR_MARKER: &str = "auth_callback_error";
/// Accounts younger than this get the one-time "email verified" toast.
const NEW_USER_WINDOW_MINUTES: i64 = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/callback", get(auth_callback))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/signout", post(sign_out))
}

/// Query parameters of the auth callback. All optional.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default, rename = "type")]
    flow_type: Option<String>,
}

/// `302 Found` to a path on this site.
fn found(config: &Config, path_and_query: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, config.site_path(path_and_query))],
    )
        .into_response()
}

fn sign_in_with_error(message: &str) -> String {
    format!("{}?error={}", SIGN_IN_PATH, urlencoding::encode(message))
}

/// Auth callback: exchange the one-time code, set session cookies, redirect.
///
/// Always answers with a redirect; errors and panics inside the handler are
/// turned into a redirect to sign-in with a generic error marker.
async fn auth_callback(State(state): State<Arc<AppState>>, jar: CookieJar, uri: Uri) -> Response {
    let outcome = AssertUnwindSafe(handle_callback(&state, jar, &uri))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Auth callback failed");
            found(&state.config, &sign_in_with_error(CALLBACK_ERROR_MARKER))
        }
        Err(_) => {
            tracing::error!("Auth callback panicked");
            found(&state.config, &sign_in_with_error(CALLBACK_ERROR_MARKER))
        }
    }
}

async fn handle_callback(state: &AppState, jar: CookieJar, uri: &Uri) -> Result<Response> {
    let Query(params) = Query::<CallbackParams>::try_from_uri(uri)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let cookies = SessionCookies::new(&state.config);
    let mut jar = jar;
    let mut session: Option<Session> = None;

    if let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) {
        let verifier = cookies.code_verifier(&jar);

        tracing::info!("Exchanging authorization code for session");
        match state.identity.exchange_code(code, verifier.as_deref()).await {
            Ok(exchanged) => {
                jar = cookies
                    .write(jar, &exchanged)
                    .map_err(|e| AppError::Internal(e.into()))?;
                jar = cookies.clear_code_verifier(jar);
                session = Some(exchanged);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Code exchange failed");
                return Ok(found(&state.config, &sign_in_with_error(&e.to_string())));
            }
        }
    }

    let mut target = resolve_redirect_target(params.next.as_deref(), params.flow_type.as_deref());

    if target == "/" {
        if let Some(session) = &session {
            if is_new_user(state, session).await {
                target = "/?email_verified=true".to_string();
            }
        }
    }

    tracing::info!(target = %target, exchanged = session.is_some(), "Auth callback complete");
    Ok((jar, found(&state.config, &target)).into_response())
}

/// Post-login landing page: explicit `next`, then the confirmation page for
/// email-confirmation flows, then the site root.
pub fn resolve_redirect_target(next: Option<&str>, flow_type: Option<&str>) -> String {
    if let Some(next) = next.filter(|n| is_site_relative_path(n)) {
        return next.to_string();
    }
    if flow_type == Some(EMAIL_CONFIRMATION_FLOW) {
        return CONFIRMATION_SUCCESS_PATH.to_string();
    }
    "/".to_string()
}

/// Accept only paths on this site (no scheme-relative `//host` or `\`
/// tricks, no control characters).
fn is_site_relative_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

/// Best-effort check whether the just-authenticated account is brand new.
/// Lookup failures count as "not new".
async fn is_new_user(state: &AppState, session: &Session) -> bool {
    match state.identity.get_user(&session.access_token).await {
        Ok(user) => user.created_within(
            chrono::Duration::minutes(NEW_USER_WINDOW_MINUTES),
            chrono::Utc::now(),
        ),
        Err(e) => {
            tracing::debug!(error = %e, "New-user lookup failed, skipping verification marker");
            false
        }
    }
}

/// Sign out: revoke the session at the backend (best-effort), clear cookies.
async fn sign_out(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let cookies = SessionCookies::new(&state.config);

    if let Some(session) = cookies.read(&jar) {
        if let Err(e) = state.identity.sign_out(&session.access_token).await {
            tracing::warn!(error = %e, "Backend sign-out failed, clearing cookies anyway");
        }
    }

    (cookies.clear(jar), Redirect::to(SIGN_IN_PATH))
}
