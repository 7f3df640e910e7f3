//! Identity service kept in its own redb file, beside (not inside) the
//! relational store. Used when the studio runs without a hosted auth backend.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StudioError};
use crate::model::normalize_email;

use super::{IdentityDeletion, IdentityMetadata, IdentityRecord, IdentityService};

/// Key: normalised email. Value: JSON-encoded `StoredIdentity`.
const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");

fn id_err(e: impl std::fmt::Display) -> StudioError {
    StudioError::Identity(e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredIdentity {
    id: Uuid,
    email: String,
    metadata: IdentityMetadata,
    created_at: DateTime<Utc>,
}

impl StoredIdentity {
    fn record(&self, already_existed: bool) -> IdentityRecord {
        IdentityRecord {
            id: self.id,
            email: self.email.clone(),
            already_existed,
        }
    }
}

pub struct LocalIdentity {
    db: Database,
}

impl LocalIdentity {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(id_err)?;
        let wt = db.begin_write().map_err(id_err)?;
        wt.open_table(IDENTITIES).map_err(id_err)?;
        wt.commit().map_err(id_err)?;
        Ok(Self { db })
    }

    fn lookup(&self, email: &str) -> Result<Option<StoredIdentity>> {
        let rt = self.db.begin_read().map_err(id_err)?;
        let table = rt.open_table(IDENTITIES).map_err(id_err)?;
        let found = table.get(email).map_err(id_err)?;
        let stored = match found {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(stored)
    }
}

impl IdentityService for LocalIdentity {
    fn create_identity(
        &self,
        email: &str,
        _credential: &str,
        metadata: &IdentityMetadata,
    ) -> Result<IdentityRecord> {
        let email = normalize_email(email);
        if let Some(existing) = self.lookup(&email)? {
            return Ok(existing.record(true));
        }

        let stored = StoredIdentity {
            id: Uuid::new_v4(),
            email: email.clone(),
            metadata: metadata.clone(),
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&stored)?;
        let wt = self.db.begin_write().map_err(id_err)?;
        {
            let mut table = wt.open_table(IDENTITIES).map_err(id_err)?;
            table
                .insert(email.as_str(), bytes.as_slice())
                .map_err(id_err)?;
        }
        wt.commit().map_err(id_err)?;
        Ok(stored.record(false))
    }

    fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityRecord>> {
        Ok(self
            .lookup(&normalize_email(email))?
            .map(|stored| stored.record(true)))
    }

    fn delete_identity(&self, id: Uuid) -> Result<IdentityDeletion> {
        let wt = self.db.begin_write().map_err(id_err)?;
        let deleted = {
            let mut table = wt.open_table(IDENTITIES).map_err(id_err)?;
            let mut target = None;
            for entry in table.iter().map_err(id_err)? {
                let (k, v) = entry.map_err(id_err)?;
                let stored: StoredIdentity = serde_json::from_slice(v.value())?;
                if stored.id == id {
                    target = Some(k.value().to_string());
                    break;
                }
            }
            match target {
                Some(email) => {
                    table.remove(email.as_str()).map_err(id_err)?;
                    true
                }
                None => false,
            }
        };
        wt.commit().map_err(id_err)?;
        Ok(if deleted {
            IdentityDeletion::Deleted
        } else {
            IdentityDeletion::AlreadyAbsent
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, LocalIdentity) {
        let dir = TempDir::new().unwrap();
        let ids = LocalIdentity::open(&dir.path().join("identity.db")).unwrap();
        (dir, ids)
    }

    #[test]
    fn create_find_delete() {
        let (_dir, ids) = open_tmp();
        let meta = IdentityMetadata::client("Ann");
        let created = ids.create_identity("Ann@X.com", "pw", &meta).unwrap();
        assert!(!created.already_existed);
        assert_eq!(created.email, "ann@x.com");

        let again = ids.create_identity("ann@x.com", "other", &meta).unwrap();
        assert!(again.already_existed);
        assert_eq!(again.id, created.id);

        assert_eq!(
            ids.find_identity_by_email("ANN@x.com").unwrap().unwrap().id,
            created.id
        );
        assert_eq!(ids.delete_identity(created.id).unwrap(), IdentityDeletion::Deleted);
        assert_eq!(
            ids.delete_identity(created.id).unwrap(),
            IdentityDeletion::AlreadyAbsent
        );
        assert!(ids.find_identity_by_email("ann@x.com").unwrap().is_none());
    }
}
