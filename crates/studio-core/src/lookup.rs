//! Profile-existence lookup.
//!
//! Decides whether leaving `converted` needs a deactivate/delete decision.
//! Only *active* profiles count as live.

use crate::error::Result;
use crate::model::{normalize_email, ClientProfile, ContactSubmission, UserAccount};
use crate::store::Store;

/// The live profile reachable from a submission, if any.
///
/// A linked submission answers from its link alone. An unlinked one is
/// resolved by email through the account mirror's index, which covers
/// profiles created outside the conversion path and never cross-linked.
pub fn find_live_profile(
    store: &dyn Store,
    submission: &ContactSubmission,
) -> Result<Option<ClientProfile>> {
    if let Some(profile_id) = submission.assigned_profile_id {
        return Ok(store.get_profile(profile_id)?.filter(|p| p.is_active));
    }
    Ok(live_profile_for_email(store, &submission.email)?.map(|(_, profile)| profile))
}

/// Active account and active profile for an email.
pub fn live_profile_for_email(
    store: &dyn Store,
    email: &str,
) -> Result<Option<(UserAccount, ClientProfile)>> {
    let Some(account) = store.account_by_email(&normalize_email(email))? else {
        return Ok(None);
    };
    if !account.is_active {
        return Ok(None);
    }
    Ok(store
        .profile_by_user(account.id)?
        .filter(|p| p.is_active)
        .map(|profile| (account, profile)))
}
