// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity backend client.
//!
//! Handles:
//! - One-time code exchange (PKCE grant)
//! - Refresh-token rotation
//! - Access-token verification (`get_user`)
//! - Server-side sign-out

use crate::error::BackendError;
use crate::models::session::TokenResponse;
use crate::models::{Session, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations the auth flow needs from the identity backend.
///
/// Every call is attempted once; callers decide how to degrade on failure.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange a one-time authorization code for a session.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, BackendError>;

    /// Rotate a refresh token into a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError>;

    /// Verify an access token against the backend and return its user.
    async fn get_user(&self, access_token: &str) -> Result<User, BackendError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
}

/// HTTP client for the hosted identity API.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

/// Error body returned by the identity API. Older endpoints use the OAuth
/// `error`/`error_description` pair, newer ones `msg`/`error_code`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Which kind of endpoint a response came from; decides how rejections map.
#[derive(Clone, Copy)]
enum Endpoint {
    Token,
    User,
}

impl IdentityClient {
    /// Create a client for `<backend_url>/auth/v1`.
    pub fn new(backend_url: &str, anon_key: String) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/auth/v1", backend_url.trim_end_matches('/')),
            anon_key,
        })
    }

    async fn token_grant<B: Serialize>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<Session, BackendError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await?;

        let token: TokenResponse = Self::check_response_json(response, Endpoint::Token).await?;
        Ok(token.into_session(chrono::Utc::now().timestamp()))
    }

    /// Check response status and return error if not successful.
    async fn check_response(
        response: reqwest::Response,
        endpoint: Endpoint,
    ) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

        match (endpoint, status.as_u16()) {
            (Endpoint::Token, 400 | 401 | 403 | 404 | 422) => {
                Err(BackendError::InvalidGrant(message))
            }
            (Endpoint::User, 401 | 403) => Err(BackendError::Unauthorized(message)),
            (_, code) => Err(BackendError::Api {
                status: code,
                message,
            }),
        }
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
        endpoint: Endpoint,
    ) -> Result<T, BackendError> {
        Self::check_response(response, endpoint)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, BackendError> {
        self.token_grant(
            "pkce",
            &PkceGrant {
                auth_code: code,
                code_verifier,
            },
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.token_grant("refresh_token", &RefreshGrant { refresh_token })
            .await
    }

    async fn get_user(&self, access_token: &str) -> Result<User, BackendError> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::check_response_json(response, Endpoint::User).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .query(&[("scope", "local")])
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::check_response(response, Endpoint::User).await?;
        tracing::info!("Identity backend sign-out successful");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_precedence() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Already Used"}"#,
        )
        .unwrap();
        assert_eq!(
            body.into_message().as_deref(),
            Some("Invalid Refresh Token: Already Used")
        );

        let body: ApiErrorBody = serde_json::from_str(
            r#"{"code":400,"error_code":"bad_code_verifier","msg":"code challenge does not match"}"#,
        )
        .unwrap();
        assert_eq!(
            body.into_message().as_deref(),
            Some("code challenge does not match")
        );
    }

    #[test]
    fn test_pkce_grant_omits_missing_verifier() {
        let json = serde_json::to_value(PkceGrant {
            auth_code: "abc",
            code_verifier: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"auth_code": "abc"}));
    }
}
