// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile bootstrap and role-profile creation.

use crate::db::{Access, ProfileStore};
use crate::error::BackendError;
use crate::models::{NewProfile, Profile, ProfileLookup, Role, RoleProfile, User};
use std::sync::Arc;
use uuid::Uuid;

/// Result of an explicit role-profile creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleProfileOutcome {
    Created,
    AlreadyExists,
}

/// Profile operations on top of a [`ProfileStore`].
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Read a profile, classifying the outcome.
    pub async fn fetch_profile(&self, access: Access<'_>, id: Uuid) -> ProfileLookup {
        match self.store.get_profile(access, id).await {
            Ok(profile) => ProfileLookup::Found(profile),
            Err(BackendError::NotFound) => ProfileLookup::NotFound,
            Err(e) => ProfileLookup::TransientError(e.to_string()),
        }
    }

    /// Make sure `user` has a profile row, creating a default one if the
    /// lookup reports not-found. Cheap no-op when the row exists.
    ///
    /// Other lookup errors are logged and returned as `TransientError`
    /// without attempting a write.
    pub async fn ensure_profile(&self, access: Access<'_>, user: &User) -> ProfileLookup {
        match self.fetch_profile(access, user.id).await {
            ProfileLookup::NotFound => {
                tracing::info!(user_id = %user.id, "No profile found, creating default profile");
                let profile = NewProfile::default_for(user.id, user.email.as_deref());
                match self.store.upsert_profile(access, &profile).await {
                    Ok(created) => ProfileLookup::Found(created),
                    Err(e) => {
                        tracing::error!(
                            user_id = %user.id,
                            error = %e,
                            "Failed to create default profile"
                        );
                        ProfileLookup::TransientError(e.to_string())
                    }
                }
            }
            ProfileLookup::TransientError(msg) => {
                tracing::warn!(user_id = %user.id, error = %msg, "Profile lookup failed");
                ProfileLookup::TransientError(msg)
            }
            found => found,
        }
    }

    /// Create or overwrite a full profile with service credentials.
    pub async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        let stored = self.store.upsert_profile(Access::Service, profile).await?;
        tracing::info!(
            user_id = %profile.id,
            is_freelancer = profile.is_freelancer,
            is_client = profile.is_client,
            "Profile created"
        );
        Ok(stored)
    }

    /// Create a profile only if the user has none yet, with service
    /// credentials. Returns `None` when a profile already exists.
    pub async fn create_profile_if_absent(
        &self,
        profile: &NewProfile,
    ) -> Result<Option<Profile>, BackendError> {
        let created = self.store.insert_profile(Access::Service, profile).await?;
        if created.is_some() {
            tracing::info!(user_id = %profile.id, "Profile created");
        } else {
            tracing::debug!(user_id = %profile.id, "Profile already exists, left unchanged");
        }
        Ok(created)
    }

    /// Opt a user into `role`: flag the profile, then add the role-extension
    /// row unless one already exists.
    ///
    /// Runs with service credentials since the user has no row-level grant
    /// on an extension row that does not exist yet.
    pub async fn create_role_profile(
        &self,
        user_id: Uuid,
        role: Role,
    ) -> Result<RoleProfileOutcome, BackendError> {
        self.store
            .set_role_flag(Access::Service, user_id, role)
            .await?;

        if self
            .store
            .role_profile_exists(Access::Service, user_id, role)
            .await?
        {
            tracing::debug!(user_id = %user_id, role = %role, "Role profile already exists");
            return Ok(RoleProfileOutcome::AlreadyExists);
        }

        let row = RoleProfile::default_for(role, user_id);
        match self.store.insert_role_profile(Access::Service, &row).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, role = %role, "Role profile created");
                Ok(RoleProfileOutcome::Created)
            }
            // A concurrent request inserted the row between check and insert.
            Err(BackendError::Conflict(msg)) => {
                tracing::debug!(
                    user_id = %user_id,
                    role = %role,
                    error = %msg,
                    "Role profile created concurrently"
                );
                Ok(RoleProfileOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Store where another request always wins the race for the role row:
    /// the existence check sees nothing, the insert then collides.
    struct RacingStore {
        insert_error: BackendError,
    }

    #[async_trait]
    impl ProfileStore for RacingStore {
        async fn get_profile(&self, _: Access<'_>, _: Uuid) -> Result<Profile, BackendError> {
            Err(BackendError::NotFound)
        }

        async fn upsert_profile(
            &self,
            _: Access<'_>,
            _: &NewProfile,
        ) -> Result<Profile, BackendError> {
            Err(BackendError::NotFound)
        }

        async fn insert_profile(
            &self,
            _: Access<'_>,
            _: &NewProfile,
        ) -> Result<Option<Profile>, BackendError> {
            Ok(None)
        }

        async fn set_role_flag(
            &self,
            _: Access<'_>,
            _: Uuid,
            _: Role,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn role_profile_exists(
            &self,
            _: Access<'_>,
            _: Uuid,
            _: Role,
        ) -> Result<bool, BackendError> {
            Ok(false)
        }

        async fn insert_role_profile(
            &self,
            _: Access<'_>,
            _: &RoleProfile,
        ) -> Result<(), BackendError> {
            Err(self.insert_error.clone())
        }
    }

    fn service(insert_error: BackendError) -> ProfileService {
        ProfileService::new(Arc::new(RacingStore { insert_error }))
    }

    #[tokio::test]
    async fn test_concurrent_role_insert_is_already_exists() {
        let profiles = service(BackendError::Conflict(
            "duplicate key value violates unique constraint \"client_profiles_pkey\"".to_string(),
        ));

        let outcome = profiles
            .create_role_profile(Uuid::new_v4(), Role::Client)
            .await
            .unwrap();
        assert_eq!(outcome, RoleProfileOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_other_insert_errors_propagate() {
        let profiles = service(BackendError::Api {
            status: 503,
            message: "unavailable".to_string(),
        });

        let result = profiles
            .create_role_profile(Uuid::new_v4(), Role::Freelancer)
            .await;
        assert!(matches!(result, Err(BackendError::Api { status: 503, .. })));
    }
}
