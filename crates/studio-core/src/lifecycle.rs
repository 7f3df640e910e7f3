//! Lifecycle Controller: the submission status machine.
//!
//! `new`, `contacted` and `removed` move freely between each other. Entering
//! `converted` runs the Conversion Engine first; leaving it checks for a live
//! profile and, if one exists, demands an explicit [`Resolution`]. A status is
//! persisted only after its side effects succeeded.

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::backend::Backend;
use crate::convert::{convert, ConversionResult};
use crate::deconvert::{deactivate, delete_completely, ActivationChange, DeletionReport};
use crate::error::{Operation, Result, StudioError};
use crate::lookup::find_live_profile;
use crate::model::{ContactSubmission, SignupInvitation};
use crate::types::{Resolution, SubmissionStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeOptions {
    pub resolution: Option<Resolution>,
}

impl ChangeOptions {
    pub fn resolve(resolution: Resolution) -> Self {
        Self {
            resolution: Some(resolution),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Already in the requested status, or already converted.
    Unchanged { status: SubmissionStatus },
    /// Plain status update with no side effects.
    StatusChanged {
        from: SubmissionStatus,
        to: SubmissionStatus,
        /// Set when leaving `converted` without a live profile and an unused
        /// signup invitation is still valid for the email.
        #[serde(skip_serializing_if = "Option::is_none")]
        outstanding_invitation: Option<SignupInvitation>,
    },
    Converted {
        from: SubmissionStatus,
        result: ConversionResult,
    },
    Deactivated {
        to: SubmissionStatus,
        change: ActivationChange,
    },
    Deleted {
        to: SubmissionStatus,
        report: DeletionReport,
    },
    /// Nothing was changed. Repeat the request with a resolution.
    ConfirmationRequired {
        profile_id: Uuid,
        email: String,
        options: Vec<Resolution>,
    },
}

fn load(backend: &Backend<'_>, submission_id: Uuid) -> Result<ContactSubmission> {
    backend
        .store
        .get_submission(submission_id)?
        .ok_or_else(|| StudioError::NotFound(format!("submission {submission_id}")))
}

pub fn request_status_change(
    backend: &Backend<'_>,
    submission_id: Uuid,
    new_status: SubmissionStatus,
    options: ChangeOptions,
) -> Result<Outcome> {
    let mut submission = load(backend, submission_id)?;
    let from = submission.status;
    if from == new_status {
        return Ok(Outcome::Unchanged { status: from });
    }

    if new_status == SubmissionStatus::Converted {
        return match convert(backend, submission_id) {
            Ok(result) => Ok(Outcome::Converted { from, result }),
            Err(e) if e.is_noop() => Ok(Outcome::Unchanged {
                status: SubmissionStatus::Converted,
            }),
            Err(e) => Err(e),
        };
    }

    if from != SubmissionStatus::Converted {
        persist_status(backend, &mut submission, new_status)?;
        info!(submission = %submission_id, %from, to = %new_status, "status changed");
        return Ok(Outcome::StatusChanged {
            from,
            to: new_status,
            outstanding_invitation: None,
        });
    }

    // Leaving `converted`.
    let Some(profile) = find_live_profile(backend.store, &submission)? else {
        let outstanding_invitation = backend
            .store
            .invitations_by_email(&submission.email)?
            .into_iter()
            .filter(|inv| inv.is_outstanding(Utc::now()))
            .max_by_key(|inv| inv.expires_at);
        persist_status(backend, &mut submission, new_status)?;
        info!(
            submission = %submission_id,
            to = %new_status,
            invitation_outstanding = outstanding_invitation.is_some(),
            "left converted without a live profile"
        );
        return Ok(Outcome::StatusChanged {
            from,
            to: new_status,
            outstanding_invitation,
        });
    };

    let Some(resolution) = options.resolution else {
        return Ok(Outcome::ConfirmationRequired {
            profile_id: profile.id,
            email: profile.email,
            options: vec![Resolution::Deactivate, Resolution::Delete],
        });
    };

    match resolution {
        Resolution::Deactivate => {
            let change = deactivate(backend, &profile.email)?;
            persist_after(backend, submission_id, new_status, Operation::Deactivate, "profile")?;
            Ok(Outcome::Deactivated {
                to: new_status,
                change,
            })
        }
        Resolution::Delete => {
            let report = delete_completely(backend, &profile.email)?;
            persist_after(backend, submission_id, new_status, Operation::Delete, "identity")?;
            Ok(Outcome::Deleted {
                to: new_status,
                report,
            })
        }
    }
}

fn persist_status(
    backend: &Backend<'_>,
    submission: &mut ContactSubmission,
    status: SubmissionStatus,
) -> Result<()> {
    submission.set_status(status);
    backend.store.update_submission(submission)
}

/// Final status write after a deconversion. The side effect already happened,
/// so a failure here is partial. The submission is reloaded because the
/// cascade may have cleared its profile link.
fn persist_after(
    backend: &Backend<'_>,
    submission_id: Uuid,
    status: SubmissionStatus,
    operation: Operation,
    last_completed: &str,
) -> Result<()> {
    let result = load(backend, submission_id)
        .and_then(|mut submission| persist_status(backend, &mut submission, status));
    result.map_err(|e| StudioError::partial(operation, Some(last_completed), "status_update", &e))?;
    info!(submission = %submission_id, to = %status, "client {operation} complete, status updated");
    Ok(())
}

/// Hard-delete submissions that are already `removed`. Every id is checked
/// before anything is deleted.
pub fn purge_removed(backend: &Backend<'_>, ids: &[Uuid]) -> Result<usize> {
    let store = backend.store;
    for id in ids {
        let submission = load(backend, *id)?;
        if submission.status != SubmissionStatus::Removed {
            return Err(StudioError::Validation(format!(
                "submission {id} is '{}', only removed submissions can be purged",
                submission.status
            )));
        }
    }

    let mut purged = 0;
    let mut last: Option<String> = None;
    for id in ids {
        let deleted = store.delete_submission(*id).map_err(|e| {
            StudioError::partial(Operation::Purge, last.clone(), id.to_string(), &e)
        })?;
        if deleted {
            purged += 1;
        }
        last = Some(id.to_string());
    }
    info!(purged, "removed submissions purged");
    Ok(purged)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deconvert::IdentityCleanup;
    use crate::error::Recovery;
    use crate::identity::{IdentityService, MemoryIdentity};
    use crate::model::DogDetails;
    use crate::store::{MemoryStore, Store};

    fn submit(store: &MemoryStore, email: &str, dog: Option<&str>) -> Uuid {
        let sub = ContactSubmission::new("Ann", email).with_dog(DogDetails {
            name: dog.map(str::to_string),
            ..DogDetails::default()
        });
        store.insert_submission(&sub).unwrap();
        sub.id
    }

    fn status(store: &MemoryStore, id: Uuid) -> SubmissionStatus {
        store.get_submission(id).unwrap().unwrap().status
    }

    #[test]
    fn plain_transitions_have_no_side_effects() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", None);

        for to in [
            SubmissionStatus::Contacted,
            SubmissionStatus::Removed,
            SubmissionStatus::New,
        ] {
            let out = request_status_change(&backend, id, to, ChangeOptions::default()).unwrap();
            assert!(matches!(out, Outcome::StatusChanged { to: t, .. } if t == to));
            assert_eq!(status(&store, id), to);
        }
        assert!(ids.is_empty());
        assert!(store.account_by_email("a@x.com").unwrap().is_none());
    }

    #[test]
    fn same_status_is_a_noop() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", None);
        let out =
            request_status_change(&backend, id, SubmissionStatus::New, ChangeOptions::default())
                .unwrap();
        assert!(matches!(out, Outcome::Unchanged { .. }));
    }

    #[test]
    fn failed_conversion_keeps_prior_status() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        ids.set_unavailable(true);
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", None);
        request_status_change(&backend, id, SubmissionStatus::Contacted, ChangeOptions::default())
            .unwrap();

        let err = request_status_change(
            &backend,
            id,
            SubmissionStatus::Converted,
            ChangeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StudioError::ExternalServiceUnavailable(_)));
        assert_eq!(status(&store, id), SubmissionStatus::Contacted);
    }

    #[test]
    fn leaving_converted_requires_a_resolution() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", None);
        request_status_change(&backend, id, SubmissionStatus::Converted, ChangeOptions::default())
            .unwrap();

        let out = request_status_change(
            &backend,
            id,
            SubmissionStatus::Contacted,
            ChangeOptions::default(),
        )
        .unwrap();
        assert!(matches!(out, Outcome::ConfirmationRequired { .. }));
        assert_eq!(status(&store, id), SubmissionStatus::Converted);
    }

    #[test]
    fn no_profile_short_circuit_reports_invitation() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", None);
        // Marked converted before the client ever signed up.
        let mut sub = store.get_submission(id).unwrap().unwrap();
        sub.set_status(SubmissionStatus::Converted);
        store.update_submission(&sub).unwrap();
        let invitation = SignupInvitation::new("a@x.com", chrono::Duration::days(3));
        store.insert_invitation(&invitation).unwrap();

        let out = request_status_change(
            &backend,
            id,
            SubmissionStatus::Contacted,
            ChangeOptions::default(),
        )
        .unwrap();
        match out {
            Outcome::StatusChanged {
                outstanding_invitation: Some(inv),
                ..
            } => assert_eq!(inv.id, invitation.id),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(status(&store, id), SubmissionStatus::Contacted);
    }

    #[test]
    fn round_trip_relinks_existing_profile() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", Some("Rex"));

        let first = match request_status_change(
            &backend,
            id,
            SubmissionStatus::Converted,
            ChangeOptions::default(),
        )
        .unwrap()
        {
            Outcome::Converted { result, .. } => result,
            other => panic!("unexpected {other:?}"),
        };
        request_status_change(
            &backend,
            id,
            SubmissionStatus::Contacted,
            ChangeOptions::resolve(Resolution::Deactivate),
        )
        .unwrap();

        let again = match request_status_change(
            &backend,
            id,
            SubmissionStatus::Converted,
            ChangeOptions::default(),
        )
        .unwrap()
        {
            Outcome::Converted { result, .. } => result,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(again.profile_id, first.profile_id);
        assert!(again.linked_existing);
        assert!(again.reactivated);
        assert_eq!(store.dogs_by_owner(first.profile_id).unwrap().len(), 1);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn deletion_failure_leaves_status_converted() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", Some("Rex"));
        request_status_change(&backend, id, SubmissionStatus::Converted, ChangeOptions::default())
            .unwrap();

        store.fail_on("delete_payments_by_client");
        let err = request_status_change(
            &backend,
            id,
            SubmissionStatus::Removed,
            ChangeOptions::resolve(Resolution::Delete),
        )
        .unwrap_err();
        assert_eq!(err.recovery(), Recovery::Reconcile);
        assert_eq!(status(&store, id), SubmissionStatus::Converted);
    }

    #[test]
    fn delete_resolution_removes_client_and_unlinks() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", Some("Rex"));
        let result = match request_status_change(
            &backend,
            id,
            SubmissionStatus::Converted,
            ChangeOptions::default(),
        )
        .unwrap()
        {
            Outcome::Converted { result, .. } => result,
            other => panic!("unexpected {other:?}"),
        };

        let out = request_status_change(
            &backend,
            id,
            SubmissionStatus::Contacted,
            ChangeOptions::resolve(Resolution::Delete),
        )
        .unwrap();
        let report = match out {
            Outcome::Deleted { to, report } => {
                assert_eq!(to, SubmissionStatus::Contacted);
                report
            }
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(report.profile_id, Some(result.profile_id));
        assert_eq!(report.identity, IdentityCleanup::Deleted);

        let sub = store.get_submission(id).unwrap().unwrap();
        assert_eq!(sub.status, SubmissionStatus::Contacted);
        assert_eq!(sub.assigned_profile_id, None);
        assert!(ids.is_empty());
        assert!(store.get_profile(result.profile_id).unwrap().is_none());
        assert!(store.dogs_by_owner(result.profile_id).unwrap().is_empty());
        assert!(store.account_by_email("a@x.com").unwrap().is_none());
    }

    #[test]
    fn status_write_failure_after_deactivate_is_partial() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", None);
        request_status_change(&backend, id, SubmissionStatus::Converted, ChangeOptions::default())
            .unwrap();

        store.fail_on("update_submission");
        let err = request_status_change(
            &backend,
            id,
            SubmissionStatus::New,
            ChangeOptions::resolve(Resolution::Deactivate),
        )
        .unwrap_err();
        match &err {
            StudioError::PartialFailure {
                operation,
                last_completed,
                failed,
                ..
            } => {
                assert_eq!(*operation, Operation::Deactivate);
                assert_eq!(last_completed.as_deref(), Some("profile"));
                assert_eq!(failed, "status_update");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.recovery(), Recovery::Reconcile);
        assert_eq!(status(&store, id), SubmissionStatus::Converted);

        // The profile is already inactive, so repeating is a plain status change.
        store.clear_faults();
        let out =
            request_status_change(&backend, id, SubmissionStatus::New, ChangeOptions::default())
                .unwrap();
        assert!(matches!(out, Outcome::StatusChanged { .. }));
        assert_eq!(status(&store, id), SubmissionStatus::New);
    }

    #[test]
    fn rex_scenario() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let id = submit(&store, "a@x.com", Some("Rex"));

        // Convert.
        let result = match request_status_change(
            &backend,
            id,
            SubmissionStatus::Converted,
            ChangeOptions::default(),
        )
        .unwrap()
        {
            Outcome::Converted { result, .. } => result,
            other => panic!("unexpected {other:?}"),
        };
        assert!(result.temporary_credential_issued);
        let profile = store.get_profile(result.profile_id).unwrap().unwrap();
        let dogs = &profile.onboarding_data.dog_info.dogs;
        assert_eq!(dogs.len(), 1);
        assert_eq!(dogs[0].name, "Rex");

        // Convert again: no-op, same profile.
        let err = convert(&backend, id).unwrap_err();
        assert!(
            matches!(err, StudioError::AlreadyConverted { profile_id, .. } if profile_id == result.profile_id)
        );
        let out = request_status_change(
            &backend,
            id,
            SubmissionStatus::Converted,
            ChangeOptions::default(),
        )
        .unwrap();
        assert!(matches!(out, Outcome::Unchanged { .. }));

        // Back to new: confirmation, then deactivate.
        let out =
            request_status_change(&backend, id, SubmissionStatus::New, ChangeOptions::default())
                .unwrap();
        assert!(matches!(out, Outcome::ConfirmationRequired { profile_id, .. } if profile_id == result.profile_id));
        request_status_change(
            &backend,
            id,
            SubmissionStatus::New,
            ChangeOptions::resolve(Resolution::Deactivate),
        )
        .unwrap();
        assert_eq!(status(&store, id), SubmissionStatus::New);
        assert!(!store.get_profile(result.profile_id).unwrap().unwrap().is_active);
        let dogs = store.dogs_by_owner(result.profile_id).unwrap();
        assert_eq!(dogs.len(), 1);
        assert_eq!(dogs[0].name, "Rex");

        // Delete completely.
        let report = delete_completely(&backend, "a@x.com").unwrap();
        assert_eq!(report.identity, IdentityCleanup::Deleted);
        assert!(store.dogs_by_owner(result.profile_id).unwrap().is_empty());
        assert!(store.account_by_email("a@x.com").unwrap().is_none());
        assert!(ids.find_identity_by_email("a@x.com").unwrap().is_none());
    }

    #[test]
    fn purge_checks_every_id_first() {
        let store = MemoryStore::new();
        let ids = MemoryIdentity::new();
        let backend = Backend::new(&store, &ids);
        let removed = submit(&store, "a@x.com", None);
        let kept = submit(&store, "b@x.com", None);
        request_status_change(&backend, removed, SubmissionStatus::Removed, ChangeOptions::default())
            .unwrap();

        let err = purge_removed(&backend, &[removed, kept]).unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
        assert!(store.get_submission(removed).unwrap().is_some());

        assert_eq!(purge_removed(&backend, &[removed]).unwrap(), 1);
        assert!(store.get_submission(removed).unwrap().is_none());
        assert!(store.get_submission(kept).unwrap().is_some());
    }
}
