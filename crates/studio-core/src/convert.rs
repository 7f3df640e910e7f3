//! Conversion Engine: submission → identity, account mirror, profile, dog.
//!
//! Each stage commits on its own. Every stage checks for what a previous
//! (possibly concurrent or failed) attempt already wrote, so retrying a
//! partially failed conversion converges instead of duplicating rows.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::credential;
use crate::error::{Operation, Result, StudioError};
use crate::identity::IdentityMetadata;
use crate::model::{ClientProfile, ContactSubmission, Dog, UserAccount};
use crate::types::{Role, SubmissionStatus};

#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub submission_id: Uuid,
    pub user_id: Uuid,
    pub profile_id: Uuid,
    /// The one-time password to hand to the client. Only present when a new
    /// identity was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_credential: Option<String>,
    pub temporary_credential_issued: bool,
    pub dog_created: bool,
    /// The email already had an identity with a profile; the submission was
    /// linked to it.
    pub linked_existing: bool,
    /// The linked profile had been deactivated and is active again.
    pub reactivated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Convert a submission into a provisioned client.
///
/// Fails with [`StudioError::AlreadyConverted`] when the submission is already
/// `converted` and linked to a live profile.
pub fn convert(backend: &Backend<'_>, submission_id: Uuid) -> Result<ConversionResult> {
    let store = backend.store;
    let mut submission = store
        .get_submission(submission_id)?
        .ok_or_else(|| StudioError::NotFound(format!("submission {submission_id}")))?;
    submission.validate()?;

    if submission.status == SubmissionStatus::Converted {
        if let Some(profile_id) = submission.assigned_profile_id {
            let live = store.get_profile(profile_id)?.is_some_and(|p| p.is_active);
            if live {
                return Err(StudioError::AlreadyConverted {
                    submission_id,
                    profile_id,
                });
            }
        }
    }

    let email = submission.normalized_email();
    let credential = credential::generate(backend.credential);
    let identity = backend.identity.create_identity(
        &email,
        &credential,
        &IdentityMetadata::client(submission.name.clone()),
    )?;
    let user_id = identity.id;
    let issued = !identity.already_existed;

    let partial = |last: Option<&str>, failed: &str, e: &StudioError| {
        StudioError::partial(Operation::Convert, last, failed, e)
    };

    if identity.already_existed {
        let existing = store
            .profile_by_user(user_id)
            .map_err(|e| partial(Some("identity"), "profile_lookup", &e))?;
        if let Some(profile) = existing {
            return link_existing(backend, submission, user_id, profile);
        }
    }

    upsert_mirror(backend, user_id, &email).map_err(|e| partial(Some("identity"), "account_mirror", &e))?;

    let profile_id = upsert_profile(backend, user_id, &submission)
        .map_err(|e| partial(Some("account_mirror"), "profile", &e))?;

    submission.link_profile(profile_id);
    submission.set_status(SubmissionStatus::Converted);
    store
        .update_submission(&submission)
        .map_err(|e| partial(Some("profile"), "submission_link", &e))?;

    let mut warnings = Vec::new();
    let dog_created = create_dog(backend, profile_id, &submission, &mut warnings);

    info!(
        submission = %submission_id,
        user = %user_id,
        profile = %profile_id,
        credential_issued = issued,
        dog_created,
        "submission converted"
    );

    Ok(ConversionResult {
        submission_id,
        user_id,
        profile_id,
        temporary_credential: issued.then_some(credential),
        temporary_credential_issued: issued,
        dog_created,
        linked_existing: false,
        reactivated: false,
        warnings,
    })
}

/// The email's identity already owns a profile: relink, reactivate if needed,
/// and add the submission's dog only when it is not already on the profile.
fn link_existing(
    backend: &Backend<'_>,
    mut submission: ContactSubmission,
    user_id: Uuid,
    mut profile: ClientProfile,
) -> Result<ConversionResult> {
    let store = backend.store;
    let partial = |last: &str, failed: &str, e: &StudioError| {
        StudioError::partial(Operation::Convert, Some(last), failed, e)
    };

    upsert_mirror(backend, user_id, &submission.normalized_email())
        .map_err(|e| partial("identity", "account_mirror", &e))?;

    let reactivated = !profile.is_active;
    if reactivated {
        profile.set_active(true);
        store
            .update_profile(&profile)
            .map_err(|e| partial("account_mirror", "profile", &e))?;
    }

    submission.link_profile(profile.id);
    submission.set_status(SubmissionStatus::Converted);
    store
        .update_submission(&submission)
        .map_err(|e| partial("profile", "submission_link", &e))?;

    let mut warnings = Vec::new();
    let dog_created = create_dog(backend, profile.id, &submission, &mut warnings);

    info!(
        submission = %submission.id,
        user = %user_id,
        profile = %profile.id,
        reactivated,
        "submission linked to existing client"
    );

    Ok(ConversionResult {
        submission_id: submission.id,
        user_id,
        profile_id: profile.id,
        temporary_credential: None,
        temporary_credential_issued: false,
        dog_created,
        linked_existing: true,
        reactivated,
        warnings,
    })
}

/// Insert or refresh the account mirror. Admin rows keep their role.
fn upsert_mirror(backend: &Backend<'_>, user_id: Uuid, email: &str) -> Result<()> {
    let account = match backend.store.get_account(user_id)? {
        Some(mut existing) => {
            if existing.role != Role::Admin {
                existing.role = Role::Client;
            }
            existing.email = email.to_string();
            existing.set_active(true);
            existing
        }
        None => UserAccount::client(user_id, email),
    };
    backend.store.upsert_account(&account)?;
    Ok(())
}

fn upsert_profile(backend: &Backend<'_>, user_id: Uuid, submission: &ContactSubmission) -> Result<Uuid> {
    let store = backend.store;
    match store.profile_by_user(user_id)? {
        Some(mut profile) => {
            profile.refresh_from(submission, &backend.how_heard);
            store.update_profile(&profile)?;
            Ok(profile.id)
        }
        None => {
            let profile = ClientProfile::from_submission(user_id, submission, &backend.how_heard);
            store.insert_profile(&profile)?;
            Ok(profile.id)
        }
    }
}

/// Non-fatal: a failure is logged and recorded as a warning.
fn create_dog(
    backend: &Backend<'_>,
    profile_id: Uuid,
    submission: &ContactSubmission,
    warnings: &mut Vec<String>,
) -> bool {
    let Some(dog) = Dog::from_submission(profile_id, submission) else {
        return false;
    };
    let existing = match backend.store.dogs_by_owner(profile_id) {
        Ok(dogs) => dogs,
        Err(e) => {
            warn!(profile = %profile_id, error = %e, "could not check existing dogs");
            warnings.push(format!("dog '{}' not created: {e}", dog.name));
            return false;
        }
    };
    let duplicate = existing.iter().any(|d| {
        d.source_submission_id == Some(submission.id) || d.name.eq_ignore_ascii_case(&dog.name)
    });
    if duplicate {
        return false;
    }
    match backend.store.insert_dog(&dog) {
        Ok(()) => true,
        Err(e) => {
            warn!(profile = %profile_id, dog = %dog.name, error = %e, "dog creation failed");
            warnings.push(format!("dog '{}' not created: {e}", dog.name));
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
