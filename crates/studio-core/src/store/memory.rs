//! In-process [`Store`] backed by mutex-guarded maps.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::{Result, StudioError};
use crate::model::{
    normalize_email, ClientNote, ClientProfile, ContactSubmission, Dog, Message,
    MessageReadReceipt, Payment, Referral, Session, SignupInvitation, UserAccount,
};

use super::Store;

#[derive(Default)]
struct Tables {
    submissions: BTreeMap<Uuid, ContactSubmission>,
    accounts: BTreeMap<Uuid, UserAccount>,
    profiles: BTreeMap<Uuid, ClientProfile>,
    dogs: BTreeMap<Uuid, Dog>,
    sessions: BTreeMap<Uuid, Session>,
    messages: BTreeMap<Uuid, Message>,
    receipts: BTreeMap<Uuid, MessageReadReceipt>,
    notes: BTreeMap<Uuid, ClientNote>,
    referrals: BTreeMap<Uuid, Referral>,
    payments: BTreeMap<Uuid, Payment>,
    invitations: BTreeMap<Uuid, SignupInvitation>,
}

fn remove_where<T>(map: &mut BTreeMap<Uuid, T>, pred: impl Fn(&T) -> bool) -> usize {
    let before = map.len();
    map.retain(|_, v| !pred(v));
    before - map.len()
}

fn select<T: Clone>(map: &BTreeMap<Uuid, T>, pred: impl Fn(&T) -> bool) -> Vec<T> {
    map.values().filter(|v| pred(v)).cloned().collect()
}

/// Store that lives for the lifetime of the value. Useful for embedding the
/// lifecycle in another process and for tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    #[cfg(test)]
    faults: Mutex<std::collections::HashSet<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StudioError::Store("memory store lock poisoned".to_string()))
    }

    #[cfg(test)]
    fn check(&self, op: &'static str) -> Result<()> {
        let faults = self.faults.lock().expect("fault set lock");
        if faults.contains(op) {
            return Err(StudioError::Store(format!("injected failure in {op}")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check(&self, _op: &'static str) -> Result<()> {
        Ok(())
    }

    /// Make every call to `op` fail until [`MemoryStore::clear_faults`].
    #[cfg(test)]
    pub(crate) fn fail_on(&self, op: &'static str) {
        self.faults.lock().expect("fault set lock").insert(op);
    }

    #[cfg(test)]
    pub(crate) fn clear_faults(&self) {
        self.faults.lock().expect("fault set lock").clear();
    }
}

impl Store for MemoryStore {
    fn insert_submission(&self, submission: &ContactSubmission) -> Result<()> {
        self.check("insert_submission")?;
        self.tables()?
            .submissions
            .insert(submission.id, submission.clone());
        Ok(())
    }

    fn get_submission(&self, id: Uuid) -> Result<Option<ContactSubmission>> {
        self.check("get_submission")?;
        Ok(self.tables()?.submissions.get(&id).cloned())
    }

    fn update_submission(&self, submission: &ContactSubmission) -> Result<()> {
        self.check("update_submission")?;
        let mut tables = self.tables()?;
        if !tables.submissions.contains_key(&submission.id) {
            return Err(StudioError::NotFound(format!("submission {}", submission.id)));
        }
        tables.submissions.insert(submission.id, submission.clone());
        Ok(())
    }

    fn list_submissions(&self) -> Result<Vec<ContactSubmission>> {
        self.check("list_submissions")?;
        let mut all: Vec<_> = self.tables()?.submissions.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    fn submissions_by_email(&self, email: &str) -> Result<Vec<ContactSubmission>> {
        self.check("submissions_by_email")?;
        let email = normalize_email(email);
        Ok(select(&self.tables()?.submissions, |s| {
            s.normalized_email() == email
        }))
    }

    fn submissions_by_profile(&self, profile_id: Uuid) -> Result<Vec<ContactSubmission>> {
        self.check("submissions_by_profile")?;
        Ok(select(&self.tables()?.submissions, |s| {
            s.assigned_profile_id == Some(profile_id)
        }))
    }

    fn delete_submission(&self, id: Uuid) -> Result<bool> {
        self.check("delete_submission")?;
        Ok(self.tables()?.submissions.remove(&id).is_some())
    }

    fn get_account(&self, id: Uuid) -> Result<Option<UserAccount>> {
        self.check("get_account")?;
        Ok(self.tables()?.accounts.get(&id).cloned())
    }

    fn account_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        self.check("account_by_email")?;
        let email = normalize_email(email);
        Ok(self
            .tables()?
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    fn upsert_account(&self, account: &UserAccount) -> Result<bool> {
        self.check("upsert_account")?;
        let mut account = account.clone();
        account.email = normalize_email(&account.email);
        Ok(self
            .tables()?
            .accounts
            .insert(account.id, account)
            .is_none())
    }

    fn delete_account(&self, id: Uuid) -> Result<bool> {
        self.check("delete_account")?;
        Ok(self.tables()?.accounts.remove(&id).is_some())
    }

    fn get_profile(&self, id: Uuid) -> Result<Option<ClientProfile>> {
        self.check("get_profile")?;
        Ok(self.tables()?.profiles.get(&id).cloned())
    }

    fn profile_by_user(&self, user_id: Uuid) -> Result<Option<ClientProfile>> {
        self.check("profile_by_user")?;
        Ok(self
            .tables()?
            .profiles
            .values()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    fn insert_profile(&self, profile: &ClientProfile) -> Result<()> {
        self.check("insert_profile")?;
        self.tables()?.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    fn update_profile(&self, profile: &ClientProfile) -> Result<()> {
        self.check("update_profile")?;
        let mut tables = self.tables()?;
        if !tables.profiles.contains_key(&profile.id) {
            return Err(StudioError::NotFound(format!("profile {}", profile.id)));
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    fn delete_profile(&self, id: Uuid) -> Result<bool> {
        self.check("delete_profile")?;
        Ok(self.tables()?.profiles.remove(&id).is_some())
    }

    fn insert_dog(&self, dog: &Dog) -> Result<()> {
        self.check("insert_dog")?;
        self.tables()?.dogs.insert(dog.id, dog.clone());
        Ok(())
    }

    fn dogs_by_owner(&self, owner_id: Uuid) -> Result<Vec<Dog>> {
        self.check("dogs_by_owner")?;
        Ok(select(&self.tables()?.dogs, |d| d.owner_id == owner_id))
    }

    fn delete_dogs_by_owner(&self, owner_id: Uuid) -> Result<usize> {
        self.check("delete_dogs_by_owner")?;
        Ok(remove_where(&mut self.tables()?.dogs, |d| {
            d.owner_id == owner_id
        }))
    }

    fn insert_session(&self, session: &Session) -> Result<()> {
        self.check("insert_session")?;
        self.tables()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn sessions_by_client(&self, client_id: Uuid) -> Result<Vec<Session>> {
        self.check("sessions_by_client")?;
        Ok(select(&self.tables()?.sessions, |s| s.client_id == client_id))
    }

    fn delete_sessions_by_client(&self, client_id: Uuid) -> Result<usize> {
        self.check("delete_sessions_by_client")?;
        Ok(remove_where(&mut self.tables()?.sessions, |s| {
            s.client_id == client_id
        }))
    }

    fn insert_message(&self, message: &Message) -> Result<()> {
        self.check("insert_message")?;
        self.tables()?.messages.insert(message.id, message.clone());
        Ok(())
    }

    fn messages_for_profile(&self, profile_id: Uuid) -> Result<Vec<Message>> {
        self.check("messages_for_profile")?;
        Ok(select(&self.tables()?.messages, |m| m.involves(profile_id)))
    }

    fn delete_messages_for_profile(&self, profile_id: Uuid) -> Result<usize> {
        self.check("delete_messages_for_profile")?;
        Ok(remove_where(&mut self.tables()?.messages, |m| {
            m.involves(profile_id)
        }))
    }

    fn insert_read_receipt(&self, receipt: &MessageReadReceipt) -> Result<()> {
        self.check("insert_read_receipt")?;
        self.tables()?.receipts.insert(receipt.id, receipt.clone());
        Ok(())
    }

    fn read_receipts_by_user(&self, user_id: Uuid) -> Result<Vec<MessageReadReceipt>> {
        self.check("read_receipts_by_user")?;
        Ok(select(&self.tables()?.receipts, |r| r.user_id == user_id))
    }

    fn delete_read_receipts_by_user(&self, user_id: Uuid) -> Result<usize> {
        self.check("delete_read_receipts_by_user")?;
        Ok(remove_where(&mut self.tables()?.receipts, |r| {
            r.user_id == user_id
        }))
    }

    fn insert_note(&self, note: &ClientNote) -> Result<()> {
        self.check("insert_note")?;
        self.tables()?.notes.insert(note.id, note.clone());
        Ok(())
    }

    fn notes_by_client(&self, client_id: Uuid) -> Result<Vec<ClientNote>> {
        self.check("notes_by_client")?;
        Ok(select(&self.tables()?.notes, |n| n.client_id == client_id))
    }

    fn delete_notes_by_client(&self, client_id: Uuid) -> Result<usize> {
        self.check("delete_notes_by_client")?;
        Ok(remove_where(&mut self.tables()?.notes, |n| {
            n.client_id == client_id
        }))
    }

    fn insert_referral(&self, referral: &Referral) -> Result<()> {
        self.check("insert_referral")?;
        self.tables()?.referrals.insert(referral.id, referral.clone());
        Ok(())
    }

    fn referrals_by_referrer(&self, referrer_id: Uuid) -> Result<Vec<Referral>> {
        self.check("referrals_by_referrer")?;
        Ok(select(&self.tables()?.referrals, |r| {
            r.referrer_id == referrer_id
        }))
    }

    fn delete_referrals_by_referrer(&self, referrer_id: Uuid) -> Result<usize> {
        self.check("delete_referrals_by_referrer")?;
        Ok(remove_where(&mut self.tables()?.referrals, |r| {
            r.referrer_id == referrer_id
        }))
    }

    fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.check("insert_payment")?;
        self.tables()?.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    fn payments_by_client(&self, client_id: Uuid) -> Result<Vec<Payment>> {
        self.check("payments_by_client")?;
        Ok(select(&self.tables()?.payments, |p| p.client_id == client_id))
    }

    fn delete_payments_by_client(&self, client_id: Uuid) -> Result<usize> {
        self.check("delete_payments_by_client")?;
        Ok(remove_where(&mut self.tables()?.payments, |p| {
            p.client_id == client_id
        }))
    }

    fn insert_invitation(&self, invitation: &SignupInvitation) -> Result<()> {
        self.check("insert_invitation")?;
        self.tables()?
            .invitations
            .insert(invitation.id, invitation.clone());
        Ok(())
    }

    fn invitations_by_email(&self, email: &str) -> Result<Vec<SignupInvitation>> {
        self.check("invitations_by_email")?;
        let email = normalize_email(email);
        Ok(select(&self.tables()?.invitations, |i| i.email == email))
    }

    fn delete_invitations_by_email(&self, email: &str) -> Result<usize> {
        self.check("delete_invitations_by_email")?;
        let email = normalize_email(email);
        Ok(remove_where(&mut self.tables()?.invitations, |i| {
            i.email == email
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_lookup_is_case_insensitive() {
        let store = MemoryStore::new();
        let acc = UserAccount::client(Uuid::new_v4(), "Ann@X.com");
        assert!(store.upsert_account(&acc).unwrap());
        assert!(!store.upsert_account(&acc).unwrap());
        let found = store.account_by_email("  ann@x.COM").unwrap().unwrap();
        assert_eq!(found.id, acc.id);
    }

    #[test]
    fn messages_match_sender_or_recipient() {
        let store = MemoryStore::new();
        let (me, other, third) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.insert_message(&Message::new(me, other, "hi")).unwrap();
        store.insert_message(&Message::new(other, me, "hello")).unwrap();
        store.insert_message(&Message::new(other, third, "unrelated")).unwrap();

        assert_eq!(store.messages_for_profile(me).unwrap().len(), 2);
        assert_eq!(store.delete_messages_for_profile(me).unwrap(), 2);
        assert_eq!(store.messages_for_profile(other).unwrap().len(), 1);
    }

    #[test]
    fn update_missing_submission_is_not_found() {
        let store = MemoryStore::new();
        let sub = ContactSubmission::new("Ann", "a@x.com");
        assert!(matches!(
            store.update_submission(&sub),
            Err(StudioError::NotFound(_))
        ));
    }

    #[test]
    fn injected_fault_fails_only_that_operation() {
        let store = MemoryStore::new();
        store.fail_on("insert_dog");
        let owner = Uuid::new_v4();
        assert!(store.insert_dog(&Dog::new(owner, "Rex")).is_err());
        assert!(store.dogs_by_owner(owner).unwrap().is_empty());
        store.clear_faults();
        store.insert_dog(&Dog::new(owner, "Rex")).unwrap();
        assert_eq!(store.dogs_by_owner(owner).unwrap().len(), 1);
    }
}
