// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client for the hosted table API (PostgREST dialect).

use crate::db::{tables, Access, ProfileStore};
use crate::error::BackendError;
use crate::models::{NewProfile, Profile, Role, RoleProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use reqwest::StatusCode;
use std::time::Duration;
use uuid::Uuid;

/// Error code returned when a single-object request matches no rows.
const NO_ROWS_CODE: &str = "PGRST116";
/// Postgres `insufficient_privilege`, raised by row-level policies.
const INSUFFICIENT_PRIVILEGE_CODE: &str = "42501";
/// Postgres `unique_violation`.
const UNIQUE_VIOLATION_CODE: &str = "23505";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Table API client.
#[derive(Clone)]
pub struct TableClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

/// Error body returned by the table API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct ProfileUpsert<'a> {
    #[serde(flatten)]
    profile: &'a NewProfile,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: Uuid,
}

impl TableClient {
    /// Create a client for `<backend_url>/rest/v1`.
    pub fn new(
        backend_url: &str,
        anon_key: String,
        service_role_key: String,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/rest/v1", backend_url.trim_end_matches('/')),
            anon_key,
            service_role_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    /// Attach credentials for the given access scope.
    fn authorize(
        &self,
        builder: reqwest::RequestBuilder,
        access: Access<'_>,
    ) -> reqwest::RequestBuilder {
        match access {
            Access::User(token) => builder.header("apikey", &self.anon_key).bearer_auth(token),
            Access::Service => builder
                .header("apikey", &self.service_role_key)
                .bearer_auth(&self.service_role_key),
        }
    }

    /// Check response status and return error if not successful.
    async fn check_response(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();
        let code = parsed.as_ref().and_then(|b| b.code.as_deref());
        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

        if code == Some(NO_ROWS_CODE) {
            return Err(BackendError::NotFound);
        }

        if code == Some(UNIQUE_VIOLATION_CODE) || status == StatusCode::CONFLICT {
            return Err(BackendError::Conflict(message));
        }

        if code == Some(INSUFFICIENT_PRIVILEGE_CODE)
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
        {
            return Err(BackendError::PermissionDenied(message));
        }

        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl ProfileStore for TableClient {
    async fn get_profile(&self, access: Access<'_>, id: Uuid) -> Result<Profile, BackendError> {
        let request = self
            .http
            .get(self.table_url(tables::PROFILES))
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT);

        let response = self.authorize(request, access).send().await?;
        Self::parse_json(response).await
    }

    async fn upsert_profile(
        &self,
        access: Access<'_>,
        profile: &NewProfile,
    ) -> Result<Profile, BackendError> {
        let body = ProfileUpsert {
            profile,
            updated_at: Utc::now(),
        };

        let request = self
            .http
            .post(self.table_url(tables::PROFILES))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .json(&body);

        let response = self.authorize(request, access).send().await?;
        Self::parse_json(response).await
    }

    async fn insert_profile(
        &self,
        access: Access<'_>,
        profile: &NewProfile,
    ) -> Result<Option<Profile>, BackendError> {
        let body = ProfileUpsert {
            profile,
            updated_at: Utc::now(),
        };

        // With ignore-duplicates a conflicting row is skipped and the
        // representation comes back empty.
        let request = self
            .http
            .post(self.table_url(tables::PROFILES))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&body);

        let response = self.authorize(request, access).send().await?;
        let rows: Vec<Profile> = Self::parse_json(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn set_role_flag(
        &self,
        access: Access<'_>,
        id: Uuid,
        role: Role,
    ) -> Result<(), BackendError> {
        let mut body = serde_json::Map::new();
        body.insert(role.flag_column().to_string(), serde_json::Value::Bool(true));
        body.insert(
            "updated_at".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );

        let request = self
            .http
            .patch(self.table_url(tables::PROFILES))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(&body);

        let response = self.authorize(request, access).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn role_profile_exists(
        &self,
        access: Access<'_>,
        id: Uuid,
        role: Role,
    ) -> Result<bool, BackendError> {
        let request = self
            .http
            .get(self.table_url(role.table()))
            .query(&[("id", format!("eq.{}", id)), ("select", "id".to_string())]);

        let response = self.authorize(request, access).send().await?;
        let rows: Vec<IdRow> = Self::parse_json(response).await?;
        Ok(!rows.is_empty())
    }

    async fn insert_role_profile(
        &self,
        access: Access<'_>,
        row: &RoleProfile,
    ) -> Result<(), BackendError> {
        let request = self
            .http
            .post(self.table_url(row.role().table()))
            .header("Prefer", "return=minimal")
            .json(row);

        let response = self.authorize(request, access).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}
