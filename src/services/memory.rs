// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory backend for tests and offline development.
//!
//! Behaves like the hosted backend where the auth flow depends on it:
//! - authorization codes are single-use
//! - refresh tokens rotate (each one can be redeemed once)
//! - access tokens are HS256 JWTs verified on every `get_user`
//! - user-scoped table access only sees the caller's own rows, and
//!   role-extension tables have no user insert policy

use crate::db::{Access, ProfileStore};
use crate::error::BackendError;
use crate::models::{
    ClientProfile, FreelancerProfile, NewProfile, Profile, Role, RoleProfile, Session, User,
};
use crate::services::identity::IdentityProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

const DEFAULT_ACCESS_TTL_SECS: i64 = 3600;

/// Injectable failures, keyed by the operation they affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `get_profile` fails with a non-not-found error.
    ProfileRead,
    /// Role flag updates and role-extension inserts fail.
    RoleWrite,
}

/// Access token claims.
#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: Uuid,
    /// Session id, used for revocation on sign-out
    sid: Uuid,
    exp: i64,
    iat: i64,
}

/// In-memory identity service and profile tables.
pub struct MemoryBackend {
    jwt_secret: Vec<u8>,
    access_ttl_secs: i64,
    users: DashMap<Uuid, User>,
    codes: DashMap<String, Uuid>,
    refresh_tokens: DashMap<String, (Uuid, Uuid)>,
    revoked_sessions: DashSet<Uuid>,
    profiles: DashMap<Uuid, Profile>,
    client_profiles: DashMap<Uuid, ClientProfile>,
    freelancer_profiles: DashMap<Uuid, FreelancerProfile>,
    profile_inserts: AtomicUsize,
    faults: DashMap<Fault, String>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(b"memory_backend_jwt_secret_32_bytes!".to_vec())
    }
}

impl MemoryBackend {
    pub fn new(jwt_secret: Vec<u8>) -> Self {
        Self {
            jwt_secret,
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            users: DashMap::new(),
            codes: DashMap::new(),
            refresh_tokens: DashMap::new(),
            revoked_sessions: DashSet::new(),
            profiles: DashMap::new(),
            client_profiles: DashMap::new(),
            freelancer_profiles: DashMap::new(),
            profile_inserts: AtomicUsize::new(0),
            faults: DashMap::new(),
        }
    }

    // ─── Identity seeding ────────────────────────────────────────

    /// Register a user created now.
    pub fn create_user(&self, email: &str) -> User {
        self.create_user_at(email, Utc::now())
    }

    /// Register a user with an explicit creation time.
    pub fn create_user_at(&self, email: &str, created_at: DateTime<Utc>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            created_at,
        };
        self.users.insert(user.id, user.clone());
        user
    }

    /// Issue a one-time authorization code for a user.
    pub fn issue_code(&self, user_id: Uuid) -> String {
        let code = Uuid::new_v4().simple().to_string();
        self.codes.insert(code.clone(), user_id);
        code
    }

    /// Start a fresh session for a user, as a successful sign-in would.
    pub fn issue_session(&self, user_id: Uuid) -> Result<Session, BackendError> {
        let now = Utc::now().timestamp();
        let session_id = Uuid::new_v4();
        let claims = AccessClaims {
            sub: user_id,
            sid: session_id,
            exp: now + self.access_ttl_secs,
            iat: now,
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.jwt_secret),
        )
        .map_err(|e| BackendError::Api {
            status: 500,
            message: format!("JWT creation failed: {}", e),
        })?;

        let refresh_token = Uuid::new_v4().simple().to_string();
        self.refresh_tokens
            .insert(refresh_token.clone(), (user_id, session_id));

        Ok(Session {
            access_token,
            refresh_token,
            expires_at: claims.exp,
            user: self.users.get(&user_id).map(|u| u.value().clone()),
        })
    }

    fn verify_access_token(&self, token: &str) -> Result<AccessClaims, BackendError> {
        let key = DecodingKey::from_secret(&self.jwt_secret);
        let validation = Validation::new(Algorithm::HS256);

        let claims = decode::<AccessClaims>(token, &key, &validation)
            .map_err(|e| BackendError::Unauthorized(format!("invalid JWT: {}", e)))?
            .claims;

        if self.revoked_sessions.contains(&claims.sid) {
            return Err(BackendError::Unauthorized("session has been revoked".to_string()));
        }
        Ok(claims)
    }

    // ─── Fault injection ─────────────────────────────────────────

    pub fn inject_fault(&self, fault: Fault, message: &str) {
        self.faults.insert(fault, message.to_string());
    }

    pub fn clear_fault(&self, fault: Fault) {
        self.faults.remove(&fault);
    }

    fn check_fault(&self, fault: Fault) -> Result<(), BackendError> {
        match self.faults.get(&fault) {
            Some(message) => Err(BackendError::Api {
                status: 503,
                message: message.value().clone(),
            }),
            None => Ok(()),
        }
    }

    // ─── Inspection ──────────────────────────────────────────────

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        self.profiles.get(&id).map(|p| p.value().clone())
    }

    /// Number of profile rows created (merges into existing rows excluded).
    pub fn profile_insert_count(&self) -> usize {
        self.profile_inserts.load(Ordering::SeqCst)
    }

    pub fn role_profile_count(&self, role: Role) -> usize {
        match role {
            Role::Client => self.client_profiles.len(),
            Role::Freelancer => self.freelancer_profiles.len(),
        }
    }

    /// Resolve the acting user for a table request. `None` means service
    /// access, which bypasses row-level policies.
    fn acting_user(&self, access: Access<'_>) -> Result<Option<Uuid>, BackendError> {
        match access {
            Access::Service => Ok(None),
            Access::User(token) => self.verify_access_token(token).map(|c| Some(c.sub)),
        }
    }

    fn visible(&self, access: Access<'_>, id: Uuid) -> Result<bool, BackendError> {
        Ok(self.acting_user(access)?.map_or(true, |uid| uid == id))
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn exchange_code(
        &self,
        code: &str,
        _code_verifier: Option<&str>,
    ) -> Result<Session, BackendError> {
        let (_, user_id) = self.codes.remove(code).ok_or_else(|| {
            BackendError::InvalidGrant("invalid flow state, no valid flow state found".to_string())
        })?;
        tracing::debug!(user_id = %user_id, "Exchanged authorization code");
        self.issue_session(user_id)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let (_, (user_id, session_id)) =
            self.refresh_tokens.remove(refresh_token).ok_or_else(|| {
                BackendError::InvalidGrant(
                    "Invalid Refresh Token: Refresh Token Not Found".to_string(),
                )
            })?;

        if self.revoked_sessions.contains(&session_id) {
            return Err(BackendError::InvalidGrant(
                "Invalid Refresh Token: Session Expired".to_string(),
            ));
        }
        self.issue_session(user_id)
    }

    async fn get_user(&self, access_token: &str) -> Result<User, BackendError> {
        let claims = self.verify_access_token(access_token)?;
        self.users
            .get(&claims.sub)
            .map(|u| u.value().clone())
            .ok_or_else(|| {
                BackendError::Unauthorized("User from sub claim in JWT does not exist".to_string())
            })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let claims = self.verify_access_token(access_token)?;
        self.revoked_sessions.insert(claims.sid);
        self.refresh_tokens
            .retain(|_, (_, session_id)| *session_id != claims.sid);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn get_profile(&self, access: Access<'_>, id: Uuid) -> Result<Profile, BackendError> {
        self.check_fault(Fault::ProfileRead)?;
        if !self.visible(access, id)? {
            return Err(BackendError::NotFound);
        }
        self.profiles
            .get(&id)
            .map(|p| p.value().clone())
            .ok_or(BackendError::NotFound)
    }

    async fn upsert_profile(
        &self,
        access: Access<'_>,
        profile: &NewProfile,
    ) -> Result<Profile, BackendError> {
        if !self.visible(access, profile.id)? {
            return Err(BackendError::PermissionDenied(
                "new row violates row-level security policy for table \"profiles\"".to_string(),
            ));
        }

        let now = Utc::now();
        let mut entry = self.profiles.entry(profile.id).or_insert_with(|| {
            self.profile_inserts.fetch_add(1, Ordering::SeqCst);
            Profile {
                id: profile.id,
                username: None,
                full_name: None,
                email: None,
                is_freelancer: false,
                is_client: false,
                created_at: now,
                updated_at: now,
            }
        });

        let row = entry.value_mut();
        row.username = profile.username.clone();
        row.full_name = profile.full_name.clone();
        row.email = profile.email.clone();
        row.is_freelancer = profile.is_freelancer;
        row.is_client = profile.is_client;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn insert_profile(
        &self,
        access: Access<'_>,
        profile: &NewProfile,
    ) -> Result<Option<Profile>, BackendError> {
        if !self.visible(access, profile.id)? {
            return Err(BackendError::PermissionDenied(
                "new row violates row-level security policy for table \"profiles\"".to_string(),
            ));
        }

        match self.profiles.entry(profile.id) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let row = Profile {
                    id: profile.id,
                    username: profile.username.clone(),
                    full_name: profile.full_name.clone(),
                    email: profile.email.clone(),
                    is_freelancer: profile.is_freelancer,
                    is_client: profile.is_client,
                    created_at: now,
                    updated_at: now,
                };
                self.profile_inserts.fetch_add(1, Ordering::SeqCst);
                slot.insert(row.clone());
                Ok(Some(row))
            }
        }
    }

    async fn set_role_flag(
        &self,
        access: Access<'_>,
        id: Uuid,
        role: Role,
    ) -> Result<(), BackendError> {
        self.check_fault(Fault::RoleWrite)?;
        if !self.visible(access, id)? {
            return Ok(());
        }
        if let Some(mut row) = self.profiles.get_mut(&id) {
            match role {
                Role::Client => row.is_client = true,
                Role::Freelancer => row.is_freelancer = true,
            }
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn role_profile_exists(
        &self,
        access: Access<'_>,
        id: Uuid,
        role: Role,
    ) -> Result<bool, BackendError> {
        if !self.visible(access, id)? {
            return Ok(false);
        }
        Ok(match role {
            Role::Client => self.client_profiles.contains_key(&id),
            Role::Freelancer => self.freelancer_profiles.contains_key(&id),
        })
    }

    async fn insert_role_profile(
        &self,
        access: Access<'_>,
        row: &RoleProfile,
    ) -> Result<(), BackendError> {
        self.check_fault(Fault::RoleWrite)?;
        let table = row.role().table();
        if self.acting_user(access)?.is_some() {
            return Err(BackendError::PermissionDenied(format!(
                "new row violates row-level security policy for table \"{}\"",
                table
            )));
        }

        let duplicate = || {
            BackendError::Conflict(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                table
            ))
        };

        match row {
            RoleProfile::Client(p) => {
                if self.client_profiles.contains_key(&p.id) {
                    return Err(duplicate());
                }
                self.client_profiles.insert(p.id, p.clone());
            }
            RoleProfile::Freelancer(p) => {
                if self.freelancer_profiles.contains_key(&p.id) {
                    return Err(duplicate());
                }
                self.freelancer_profiles.insert(p.id, p.clone());
            }
        }
        Ok(())
    }
}
