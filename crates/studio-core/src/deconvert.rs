//! Deconversion Engine.
//!
//! `deactivate` / `reactivate` flip the active flags on the account mirror and
//! the profile. `delete_completely` walks [`DeleteStage::ORDER`]: dependents
//! first, then the profile, then the mirror, then the external identity.
//! A relational stage failure stops the walk and names the stage; the
//! external identity is removed best-effort.
//!
//! Rows created for the profile while a delete is running may survive as
//! orphans. Re-running the delete picks them up.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{Operation, Result, StudioError};
use crate::identity::IdentityDeletion;
use crate::model::{normalize_email, validate_email, ClientProfile, UserAccount};
use crate::store::Store;
use crate::types::SubmissionStatus;

// ---------------------------------------------------------------------------
// Deactivate / reactivate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ActivationChange {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<Uuid>,
    pub is_active: bool,
}

/// Mark the client inactive. Their login stays valid; every read filtered on
/// `is_active` stops seeing them.
pub fn deactivate(backend: &Backend<'_>, email: &str) -> Result<ActivationChange> {
    set_active(backend, email, false)
}

/// Undo [`deactivate`].
pub fn reactivate(backend: &Backend<'_>, email: &str) -> Result<ActivationChange> {
    set_active(backend, email, true)
}

fn set_active(backend: &Backend<'_>, email: &str, active: bool) -> Result<ActivationChange> {
    validate_email(email)?;
    let email = normalize_email(email);
    let operation = if active {
        Operation::Reactivate
    } else {
        Operation::Deactivate
    };
    let store = backend.store;

    let mut account = store
        .account_by_email(&email)?
        .ok_or_else(|| StudioError::NotFound(format!("no account for '{email}'")))?;
    account.set_active(active);
    store.upsert_account(&account)?;

    let profile = store
        .profile_by_user(account.id)
        .map_err(|e| StudioError::partial(operation, Some("account_mirror"), "profile", &e))?;
    let profile_id = match profile {
        Some(mut profile) => {
            profile.set_active(active);
            store.update_profile(&profile).map_err(|e| {
                StudioError::partial(operation, Some("account_mirror"), "profile", &e)
            })?;
            Some(profile.id)
        }
        None => None,
    };

    info!(email = %email, user = %account.id, active, "client {operation} complete");
    Ok(ActivationChange {
        user_id: account.id,
        profile_id,
        is_active: active,
    })
}

// ---------------------------------------------------------------------------
// DeleteStage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStage {
    Sessions,
    Dogs,
    ClientNotes,
    Messages,
    ReadReceipts,
    Referrals,
    Payments,
    SignupInvitations,
    SubmissionLinks,
    Profile,
    AccountMirror,
}

impl DeleteStage {
    /// Dependency-safe order: reverse of creation. The login follows the
    /// account mirror and is reported separately in [`IdentityCleanup`].
    pub const ORDER: [DeleteStage; 11] = [
        DeleteStage::Sessions,
        DeleteStage::Dogs,
        DeleteStage::ClientNotes,
        DeleteStage::Messages,
        DeleteStage::ReadReceipts,
        DeleteStage::Referrals,
        DeleteStage::Payments,
        DeleteStage::SignupInvitations,
        DeleteStage::SubmissionLinks,
        DeleteStage::Profile,
        DeleteStage::AccountMirror,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeleteStage::Sessions => "sessions",
            DeleteStage::Dogs => "dogs",
            DeleteStage::ClientNotes => "client_notes",
            DeleteStage::Messages => "messages",
            DeleteStage::ReadReceipts => "read_receipts",
            DeleteStage::Referrals => "referrals",
            DeleteStage::Payments => "payments",
            DeleteStage::SignupInvitations => "signup_invitations",
            DeleteStage::SubmissionLinks => "submission_links",
            DeleteStage::Profile => "profile",
            DeleteStage::AccountMirror => "account_mirror",
        }
    }
}

impl fmt::Display for DeleteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DeletionReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StageCount {
    pub stage: DeleteStage,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IdentityCleanup {
    Deleted,
    AlreadyAbsent,
    /// The relational delete completed; the login still exists.
    LeftBehind { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionReport {
    pub email: String,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<Uuid>,
    pub removed: Vec<StageCount>,
    pub identity: IdentityCleanup,
}

impl DeletionReport {
    pub fn rows(&self, stage: DeleteStage) -> usize {
        self.removed
            .iter()
            .find(|c| c.stage == stage)
            .map(|c| c.rows)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Cascading delete
// ---------------------------------------------------------------------------

struct Target {
    email: String,
    user_id: Uuid,
    profile: Option<ClientProfile>,
}

/// Resolve via the account mirror, else via a converted submission that still
/// points at a profile.
fn resolve_target(store: &dyn Store, email: &str) -> Result<Target> {
    if let Some(account) = store.account_by_email(email)? {
        let UserAccount { id, email, .. } = account;
        return Ok(Target {
            profile: store.profile_by_user(id)?,
            user_id: id,
            email,
        });
    }
    for submission in store.submissions_by_email(email)? {
        if submission.status != SubmissionStatus::Converted {
            continue;
        }
        let Some(profile_id) = submission.assigned_profile_id else {
            continue;
        };
        if let Some(profile) = store.get_profile(profile_id)? {
            return Ok(Target {
                email: email.to_string(),
                user_id: profile.user_id,
                profile: Some(profile),
            });
        }
    }
    Err(StudioError::NotFound(format!("no client for '{email}'")))
}

fn run_stage(store: &dyn Store, stage: DeleteStage, target: &Target) -> Result<usize> {
    let profile_id = target.profile.as_ref().map(|p| p.id);
    let by_profile = |f: &dyn Fn(Uuid) -> Result<usize>| match profile_id {
        Some(id) => f(id),
        None => Ok(0),
    };
    match stage {
        DeleteStage::Sessions => by_profile(&|id| store.delete_sessions_by_client(id)),
        DeleteStage::Dogs => by_profile(&|id| store.delete_dogs_by_owner(id)),
        DeleteStage::ClientNotes => by_profile(&|id| store.delete_notes_by_client(id)),
        DeleteStage::Messages => by_profile(&|id| store.delete_messages_for_profile(id)),
        DeleteStage::ReadReceipts => store.delete_read_receipts_by_user(target.user_id),
        DeleteStage::Referrals => by_profile(&|id| store.delete_referrals_by_referrer(id)),
        DeleteStage::Payments => by_profile(&|id| store.delete_payments_by_client(id)),
        DeleteStage::SignupInvitations => store.delete_invitations_by_email(&target.email),
        DeleteStage::SubmissionLinks => by_profile(&|id| {
            let linked = store.submissions_by_profile(id)?;
            for mut submission in linked.iter().cloned() {
                submission.unlink_profile();
                store.update_submission(&submission)?;
            }
            Ok(linked.len())
        }),
        DeleteStage::Profile => by_profile(&|id| Ok(usize::from(store.delete_profile(id)?))),
        DeleteStage::AccountMirror => Ok(usize::from(store.delete_account(target.user_id)?)),
    }
}

/// Permanently delete a client and everything they own.
pub fn delete_completely(backend: &Backend<'_>, email: &str) -> Result<DeletionReport> {
    validate_email(email)?;
    let email = normalize_email(email);
    let store = backend.store;
    let target = resolve_target(store, &email)?;

    let mut removed = Vec::with_capacity(DeleteStage::ORDER.len());
    let mut last_completed: Option<DeleteStage> = None;
    for stage in DeleteStage::ORDER {
        let rows = run_stage(store, stage, &target).map_err(|e| {
            warn!(email = %email, stage = %stage, error = %e, "client deletion stopped");
            StudioError::partial(
                Operation::Delete,
                last_completed.map(|s| s.as_str()),
                stage.as_str(),
                &e,
            )
        })?;
        removed.push(StageCount { stage, rows });
        last_completed = Some(stage);
    }

    let identity = match backend.identity.delete_identity(target.user_id) {
        Ok(IdentityDeletion::Deleted) => IdentityCleanup::Deleted,
        Ok(IdentityDeletion::AlreadyAbsent) => IdentityCleanup::AlreadyAbsent,
        Err(e) => {
            warn!(
                email = %email,
                user = %target.user_id,
                error = %e,
                "client data deleted but identity was left behind"
            );
            IdentityCleanup::LeftBehind {
                reason: e.to_string(),
            }
        }
    };

    info!(email = %email, user = %target.user_id, "client deleted");
    Ok(DeletionReport {
        email,
        user_id: target.user_id,
        profile_id: target.profile.map(|p| p.id),
        removed,
        identity,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
