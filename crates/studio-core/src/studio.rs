use std::path::Path;

use tracing::info;

use crate::backend::Backend;
use crate::config::{Config, IdentityConfig};
use crate::error::{Result, StudioError};
use crate::identity::{HttpIdentity, IdentityService, LocalIdentity};
use crate::io;
use crate::paths;
use crate::store::{RedbStore, Store};

/// A studio directory opened for use: config, durable store and the
/// configured identity service.
pub struct Studio {
    config: Config,
    store: RedbStore,
    identity: Box<dyn IdentityService>,
}

impl Studio {
    /// Create `.studio/` with a default config and empty databases. An
    /// existing config is left untouched. Returns true if it was written.
    pub fn init(root: &Path, name: &str) -> Result<bool> {
        io::ensure_dir(&paths::studio_dir(root))?;
        let created = if paths::config_path(root).exists() {
            false
        } else {
            Config::new(name).save(root)?;
            true
        };
        Self::open(root)?;
        info!(root = %root.display(), created, "studio initialised");
        Ok(created)
    }

    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let store = RedbStore::open(&paths::store_path(root))?;
        let identity = open_identity(root, &config.identity)?;
        Ok(Self {
            config,
            store,
            identity,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        &self.store
    }

    pub fn backend(&self) -> Backend<'_> {
        Backend::new(&self.store, &*self.identity).with_config(&self.config)
    }
}

fn open_identity(root: &Path, config: &IdentityConfig) -> Result<Box<dyn IdentityService>> {
    match config {
        IdentityConfig::Local => Ok(Box::new(LocalIdentity::open(&paths::identity_path(root))?)),
        IdentityConfig::Http {
            base_url,
            api_key_env,
            timeout_secs,
        } => {
            let api_key = std::env::var(api_key_env).map_err(|_| {
                StudioError::Validation(format!(
                    "identity.api_key_env: environment variable '{api_key_env}' is not set"
                ))
            })?;
            let client = HttpIdentity::new(
                base_url.clone(),
                api_key,
                std::time::Duration::from_secs(*timeout_secs),
            )?;
            Ok(Box::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{request_status_change, ChangeOptions, Outcome};
    use crate::model::ContactSubmission;
    use crate::types::SubmissionStatus;
    use tempfile::TempDir;

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        assert!(Studio::init(dir.path(), "Good Dog").unwrap());
        assert!(!Studio::init(dir.path(), "Other").unwrap());
        let studio = Studio::open(dir.path()).unwrap();
        assert_eq!(studio.config().studio.name, "Good Dog");
        assert!(paths::store_path(dir.path()).exists());
        assert!(paths::identity_path(dir.path()).exists());
    }

    #[test]
    fn open_without_init_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Studio::open(dir.path()),
            Err(StudioError::NotInitialized)
        ));
    }

    #[test]
    fn conversion_survives_reopen() {
        let dir = TempDir::new().unwrap();
        Studio::init(dir.path(), "Good Dog").unwrap();

        let sub = ContactSubmission::new("Ann", "a@x.com");
        let profile_id = {
            let studio = Studio::open(dir.path()).unwrap();
            studio.store().insert_submission(&sub).unwrap();
            match request_status_change(
                &studio.backend(),
                sub.id,
                SubmissionStatus::Converted,
                ChangeOptions::default(),
            )
            .unwrap()
            {
                Outcome::Converted { result, .. } => result.profile_id,
                other => panic!("unexpected {other:?}"),
            }
        };

        let studio = Studio::open(dir.path()).unwrap();
        let stored = studio.store().get_submission(sub.id).unwrap().unwrap();
        assert_eq!(stored.assigned_profile_id, Some(profile_id));
        let out = request_status_change(
            &studio.backend(),
            sub.id,
            SubmissionStatus::Converted,
            ChangeOptions::default(),
        )
        .unwrap();
        assert!(matches!(out, Outcome::Unchanged { .. }));
    }

    #[test]
    fn http_identity_requires_key() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("x");
        cfg.identity = IdentityConfig::Http {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key_env: "STUDIO_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            timeout_secs: 1,
        };
        cfg.save(dir.path()).unwrap();
        assert!(matches!(
            Studio::open(dir.path()),
            Err(StudioError::Validation(_))
        ));
    }
}
