use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::{Result, StudioError};
use crate::model::normalize_email;

use super::{IdentityDeletion, IdentityMetadata, IdentityRecord, IdentityService};

/// In-process identity service. Can be switched into an "unreachable" mode
/// where every call fails with `ExternalServiceUnavailable`.
#[derive(Default)]
pub struct MemoryIdentity {
    by_email: Mutex<HashMap<String, Uuid>>,
    unavailable: AtomicBool,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.by_email.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self) -> Result<MutexGuard<'_, HashMap<String, Uuid>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StudioError::ExternalServiceUnavailable(
                "identity service did not respond".to_string(),
            ));
        }
        self.by_email
            .lock()
            .map_err(|_| StudioError::Identity("identity map lock poisoned".to_string()))
    }
}

impl IdentityService for MemoryIdentity {
    fn create_identity(
        &self,
        email: &str,
        _credential: &str,
        _metadata: &IdentityMetadata,
    ) -> Result<IdentityRecord> {
        let email = normalize_email(email);
        let mut map = self.guard()?;
        if let Some(id) = map.get(&email) {
            return Ok(IdentityRecord {
                id: *id,
                email,
                already_existed: true,
            });
        }
        let id = Uuid::new_v4();
        map.insert(email.clone(), id);
        Ok(IdentityRecord {
            id,
            email,
            already_existed: false,
        })
    }

    fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityRecord>> {
        let email = normalize_email(email);
        let map = self.guard()?;
        Ok(map.get(&email).map(|id| IdentityRecord {
            id: *id,
            email: email.clone(),
            already_existed: true,
        }))
    }

    fn delete_identity(&self, id: Uuid) -> Result<IdentityDeletion> {
        let mut map = self.guard()?;
        let before = map.len();
        map.retain(|_, v| *v != id);
        if map.len() < before {
            Ok(IdentityDeletion::Deleted)
        } else {
            Ok(IdentityDeletion::AlreadyAbsent)
        }
    }
}
