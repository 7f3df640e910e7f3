//! Identity Service Client.
//!
//! The external identity store answers "does this email have a login". It is
//! never transactional with the relational store, so every caller must be
//! ready for the two to disagree.

pub mod http;
pub mod local;
pub mod memory;

pub use self::http::HttpIdentity;
pub use self::local::LocalIdentity;
pub use self::memory::MemoryIdentity;

use crate::error::Result;
use crate::types::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to a newly created identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityMetadata {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IdentityMetadata {
    pub fn client(name: impl Into<String>) -> Self {
        Self {
            role: Role::Client,
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub email: String,
    /// The email already had an identity; no credential was set.
    pub already_existed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityDeletion {
    Deleted,
    AlreadyAbsent,
}

pub trait IdentityService {
    /// Create an identity for `email`. An existing identity for the email is
    /// returned with `already_existed = true` rather than as an error.
    fn create_identity(
        &self,
        email: &str,
        credential: &str,
        metadata: &IdentityMetadata,
    ) -> Result<IdentityRecord>;

    fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityRecord>>;

    /// Delete by id. A missing identity is not an error.
    fn delete_identity(&self, id: Uuid) -> Result<IdentityDeletion>;
}
