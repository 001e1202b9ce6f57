//! Database layer (hosted table API).

pub mod postgrest;

pub use postgrest::TableClient;

use crate::error::BackendError;
use crate::models::{NewProfile, Profile, Role, RoleProfile};
use async_trait::async_trait;
use uuid::Uuid;

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const CLIENT_PROFILES: &str = "client_profiles";
    pub const FREELANCER_PROFILES: &str = "freelancer_profiles";
}

/// Credentials a table request runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<'a> {
    /// The signed-in user's access token; row-level policies apply.
    User(&'a str),
    /// Service-role key; bypasses row-level policies. Server-side only.
    Service,
}

/// Profile persistence. Implemented by the hosted table API client and by
/// the in-memory backend.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a profile; a missing row is `Err(BackendError::NotFound)`.
    async fn get_profile(&self, access: Access<'_>, id: Uuid) -> Result<Profile, BackendError>;

    /// Insert or merge a profile keyed by id, returning the stored row.
    async fn upsert_profile(
        &self,
        access: Access<'_>,
        profile: &NewProfile,
    ) -> Result<Profile, BackendError>;

    /// Insert a profile unless a row with the same id exists. Returns the
    /// new row, or `None` if one was already there; existing rows are never
    /// modified.
    async fn insert_profile(
        &self,
        access: Access<'_>,
        profile: &NewProfile,
    ) -> Result<Option<Profile>, BackendError>;

    /// Set the role flag on an existing profile. Missing rows are left alone.
    async fn set_role_flag(&self, access: Access<'_>, id: Uuid, role: Role)
        -> Result<(), BackendError>;

    async fn role_profile_exists(
        &self,
        access: Access<'_>,
        id: Uuid,
        role: Role,
    ) -> Result<bool, BackendError>;

    async fn insert_role_profile(
        &self,
        access: Access<'_>,
        row: &RoleProfile,
    ) -> Result<(), BackendError>;
}
