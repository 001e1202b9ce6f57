// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod profile;
pub mod session;
pub mod user;

pub use profile::{
    ClientProfile, FreelancerProfile, NewProfile, Profile, ProfileLookup, Role, RoleProfile,
};
pub use session::Session;
pub use user::User;
