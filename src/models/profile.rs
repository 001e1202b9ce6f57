//! Application-level user records stored in the backend's table API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

use crate::db::tables;

/// Marketplace profile, one-to-one with the identity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    /// Same as the identity user id
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub is_freelancer: bool,
    pub is_client: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row written by a profile upsert. Timestamps are filled in by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub is_freelancer: bool,
    pub is_client: bool,
}

impl NewProfile {
    /// Default profile for a freshly authenticated user: no roles yet,
    /// username taken from the email local part.
    pub fn default_for(id: Uuid, email: Option<&str>) -> Self {
        let username = email
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .map(str::to_string);

        Self {
            id,
            username,
            full_name: None,
            email: email.map(str::to_string),
            is_freelancer: false,
            is_client: false,
        }
    }
}

/// Marketplace role a user can opt into. Roles are not exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Freelancer,
}

impl Role {
    /// Table holding the role-extension rows.
    pub fn table(self) -> &'static str {
        match self {
            Role::Client => tables::CLIENT_PROFILES,
            Role::Freelancer => tables::FREELANCER_PROFILES,
        }
    }

    /// Flag column on the `profiles` table.
    pub fn flag_column(self) -> &'static str {
        match self {
            Role::Client => "is_client",
            Role::Freelancer => "is_freelancer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Freelancer => f.write_str("freelancer"),
        }
    }
}

/// Role extension for users hiring on the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: Uuid,
    pub company_name: Option<String>,
    pub total_spent: f64,
}

/// Role extension for users offering services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreelancerProfile {
    pub id: Uuid,
    pub title: Option<String>,
    pub hourly_rate: Option<f64>,
    pub total_earnings: f64,
    pub job_success_score: f64,
}

/// A role-extension row of either kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoleProfile {
    Client(ClientProfile),
    Freelancer(FreelancerProfile),
}

impl RoleProfile {
    /// Empty extension row created when a user opts into `role`.
    pub fn default_for(role: Role, id: Uuid) -> Self {
        match role {
            Role::Client => RoleProfile::Client(ClientProfile {
                id,
                company_name: None,
                total_spent: 0.0,
            }),
            Role::Freelancer => RoleProfile::Freelancer(FreelancerProfile {
                id,
                title: None,
                hourly_rate: None,
                total_earnings: 0.0,
                job_success_score: 0.0,
            }),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Client(_) => Role::Client,
            RoleProfile::Freelancer(_) => Role::Freelancer,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            RoleProfile::Client(p) => p.id,
            RoleProfile::Freelancer(p) => p.id,
        }
    }
}

/// Outcome of a profile read.
///
/// Not-found is a distinct outcome rather than an error so callers can
/// decide per call whether to bootstrap, degrade, or propagate.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(Profile),
    NotFound,
    TransientError(String),
}

impl ProfileLookup {
    /// Fail-open view: the profile if one was found.
    pub fn into_option(self) -> Option<Profile> {
        match self {
            ProfileLookup::Found(profile) => Some(profile),
            ProfileLookup::NotFound | ProfileLookup::TransientError(_) => None,
        }
    }
}
