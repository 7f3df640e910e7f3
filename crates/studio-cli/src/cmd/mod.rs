pub mod client;
pub mod config;
pub mod init;
pub mod submission;

use anyhow::Context;
use std::path::Path;
use studio_core::convert::ConversionResult;
use studio_core::deconvert::{ActivationChange, DeletionReport, IdentityCleanup};
use studio_core::error::Recovery;
use studio_core::{Studio, StudioError};

pub(crate) fn open(root: &Path) -> anyhow::Result<Studio> {
    Studio::open(root).with_context(|| format!("failed to open studio at {}", root.display()))
}

/// Attach what the admin should do next to a lifecycle error.
pub(crate) fn explain(e: StudioError) -> anyhow::Error {
    let hint = match (&e, e.recovery()) {
        (StudioError::PartialFailure { failed, .. }, Recovery::Reconcile) => {
            Some(format!("stopped at '{failed}'; re-run the same command to finish"))
        }
        (StudioError::PartialFailure { .. }, Recovery::Retry) => {
            Some("partially applied; re-running the same command resumes it".to_string())
        }
        (StudioError::ExternalServiceUnavailable(_), _) => {
            Some("nothing was changed; safe to retry".to_string())
        }
        (StudioError::Identity(_), _) => {
            Some("the identity service rejected the request; check it before retrying".to_string())
        }
        _ => None,
    };
    match hint {
        Some(hint) => anyhow::Error::new(e).context(hint),
        None => anyhow::Error::new(e),
    }
}

pub(crate) fn print_conversion(result: &ConversionResult) {
    if result.linked_existing {
        println!("Linked to existing client profile {}", result.profile_id);
        if result.reactivated {
            println!("  Profile reactivated");
        }
    } else {
        println!("Converted: client profile {}", result.profile_id);
    }
    println!("  User:       {}", result.user_id);
    match &result.temporary_credential {
        Some(cred) => println!("  Temporary password: {cred}"),
        None => println!("  Existing login kept; no new password issued"),
    }
    if result.dog_created {
        println!("  Dog record created");
    }
    for w in &result.warnings {
        println!("  warning: {w}");
    }
}

pub(crate) fn print_activation(change: &ActivationChange) {
    let state = if change.is_active { "active" } else { "inactive" };
    println!("Account {} is now {state}", change.user_id);
    if let Some(profile_id) = change.profile_id {
        println!("  Profile: {profile_id}");
    }
}

pub(crate) fn print_deletion(report: &DeletionReport) {
    println!("Deleted client {} ({})", report.email, report.user_id);
    for count in report.removed.iter().filter(|c| c.rows > 0) {
        println!("  {:<20} {}", count.stage.as_str(), count.rows);
    }
    match &report.identity {
        IdentityCleanup::Deleted => println!("  Login removed"),
        IdentityCleanup::AlreadyAbsent => println!("  Login was already gone"),
        IdentityCleanup::LeftBehind { reason } => {
            println!("  warning: login could not be removed: {reason}")
        }
    }
}
