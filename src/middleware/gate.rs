// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session gate middleware.
//!
//! Runs on every request: re-validates the cookie session against the
//! identity backend, refreshes it when expired, and redirects anonymous
//! callers away from protected paths.

use crate::error::BackendError;
use crate::models::{Session, User};
use crate::session_store::SessionCookies;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub const SIGN_IN_PATH: &str = "/sign-in";

/// Framework asset paths. Requests here skip the gate entirely.
const ASSET_PREFIXES: &[&str] = &["/_next/"];
const ASSET_PATHS: &[&str] = &["/favicon.ico"];

/// Paths reachable without a session, besides exact matches below.
const PUBLIC_PREFIXES: &[&str] = &["/auth/", "/api/auth/"];
const PUBLIC_PATHS: &[&str] = &["/", SIGN_IN_PATH, "/auth", "/health"];

/// Verified session attached to the request by [`session_gate`].
#[derive(Debug, Clone, Default)]
pub struct RequestSession {
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl RequestSession {
    /// Access token of a verified session.
    pub fn access_token(&self) -> Option<&str> {
        self.user.as_ref()?;
        self.session.as_ref().map(|s| s.access_token.as_str())
    }
}

pub fn is_asset_path(path: &str) -> bool {
    ASSET_PATHS.contains(&path) || ASSET_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Route policy: whether an anonymous caller may request `path`.
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
        || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
        || is_asset_path(path)
}

/// Outcome of re-validating the cookie session.
struct Revalidation {
    user: Option<User>,
    session: Option<Session>,
    /// Session cookies need to be rewritten (rotated) or cleared.
    cookies_changed: bool,
}

impl Revalidation {
    fn anonymous(cookies_changed: bool) -> Self {
        Self {
            user: None,
            session: None,
            cookies_changed,
        }
    }
}

/// Middleware that re-validates the session on every request.
pub async fn session_gate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_asset_path(&path) {
        return next.run(request).await;
    }

    let cookies = SessionCookies::new(&state.config);
    let revalidation = match cookies.read(&jar) {
        Some(session) => revalidate(&state, session).await,
        None => Revalidation::anonymous(false),
    };

    let jar = if revalidation.cookies_changed {
        match &revalidation.session {
            Some(session) => match cookies.write(jar, session) {
                Ok(jar) => jar,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode rotated session");
                    cookies.clear(CookieJar::from_headers(request.headers()))
                }
            },
            None => cookies.clear(jar),
        }
    } else {
        jar
    };

    if revalidation.user.is_none() && !is_public_path(&path) {
        tracing::debug!(path = %path, "Anonymous request to protected path, redirecting");
        return (jar, Redirect::temporary(SIGN_IN_PATH)).into_response();
    }

    if revalidation.cookies_changed {
        cookies.rewrite_request_cookies(request.headers_mut(), revalidation.session.as_ref());
    }
    request.extensions_mut().insert(RequestSession {
        user: revalidation.user,
        session: revalidation.session,
    });

    let response = next.run(request).await;

    // A handler that wrote the session itself (sign-in, sign-out) has the
    // newer view; the gate's rotation or removal must not follow it.
    if revalidation.cookies_changed && cookies.sets_session_cookie(response.headers()) {
        tracing::debug!(path = %path, "Handler wrote session cookies, dropping gate changes");
        return response;
    }
    (jar, response).into_response()
}

/// Refresh the session if expired, then verify it with the identity backend.
/// Each backend call is attempted once.
async fn revalidate(state: &AppState, session: Session) -> Revalidation {
    let (session, refreshed) = if session.is_expired() {
        match state.identity.refresh_session(&session.refresh_token).await {
            Ok(rotated) => {
                tracing::debug!("Refreshed expired session");
                (rotated, true)
            }
            Err(e) => {
                tracing::info!(error = %e, "Session refresh failed, treating as anonymous");
                return Revalidation::anonymous(e.is_auth_rejection());
            }
        }
    } else {
        (session, false)
    };

    match state.identity.get_user(&session.access_token).await {
        Ok(user) => Revalidation {
            user: Some(user),
            session: Some(session),
            cookies_changed: refreshed,
        },
        Err(e @ BackendError::Unauthorized(_)) => {
            tracing::info!(error = %e, "Session rejected by identity backend");
            Revalidation::anonymous(true)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session verification failed, treating as anonymous");
            Revalidation::anonymous(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/"));
        assert!(is_public_path("/sign-in"));
        assert!(is_public_path("/auth/callback"));
        assert!(is_public_path("/auth/confirmation-success"));
        assert!(is_public_path("/api/auth/create-profile"));
        assert!(is_public_path("/_next/static/chunk.js"));
        assert!(is_public_path("/health"));
    }

    #[test]
    fn test_protected_paths() {
        assert!(!is_public_path("/dashboard"));
        assert!(!is_public_path("/projects/new"));
        assert!(!is_public_path("/sign-in/extra"));
        assert!(!is_public_path("/authors"));
        assert!(!is_public_path("/api/session"));
    }

    #[test]
    fn test_access_token_requires_verified_user() {
        let session = Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 0,
            user: None,
        };
        let unverified = RequestSession {
            user: None,
            session: Some(session),
        };
        assert_eq!(unverified.access_token(), None);
    }
}
