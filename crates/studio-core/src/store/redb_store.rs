//! Durable [`Store`] using redb.
//!
//! # Table design
//!
//! One table per entity, keyed by the 16 raw bytes of the entity's UUID, with
//! JSON-encoded values. Two secondary indexes keep the lifecycle's hot
//! lookups off full scans:
//! ```text
//! account_emails : normalised email  -> account id
//! profile_users  : account id bytes  -> profile id
//! ```
//! Both indexes are rewritten in the same write transaction as the row they
//! point at, so they never disagree with it.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, StudioError};
use crate::model::{
    normalize_email, ClientNote, ClientProfile, ContactSubmission, Dog, Message,
    MessageReadReceipt, Payment, Referral, Session, SignupInvitation, UserAccount,
};

use super::Store;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type Rows = TableDefinition<'static, &'static [u8], &'static [u8]>;

const SUBMISSIONS: Rows = TableDefinition::new("submissions");
const ACCOUNTS: Rows = TableDefinition::new("accounts");
const PROFILES: Rows = TableDefinition::new("profiles");
const DOGS: Rows = TableDefinition::new("dogs");
const SESSIONS: Rows = TableDefinition::new("sessions");
const MESSAGES: Rows = TableDefinition::new("messages");
const RECEIPTS: Rows = TableDefinition::new("message_read_receipts");
const NOTES: Rows = TableDefinition::new("client_notes");
const REFERRALS: Rows = TableDefinition::new("referrals");
const PAYMENTS: Rows = TableDefinition::new("payments");
const INVITATIONS: Rows = TableDefinition::new("signup_invitations");

const ACCOUNT_EMAILS: TableDefinition<&str, &[u8]> = TableDefinition::new("account_emails");
const PROFILE_USERS: Rows = TableDefinition::new("profile_users");

const ALL_ROWS: [Rows; 12] = [
    SUBMISSIONS,
    ACCOUNTS,
    PROFILES,
    DOGS,
    SESSIONS,
    MESSAGES,
    RECEIPTS,
    NOTES,
    REFERRALS,
    PAYMENTS,
    INVITATIONS,
    PROFILE_USERS,
];

fn db_err(e: impl std::fmt::Display) -> StudioError {
    StudioError::Store(e.to_string())
}

fn uuid_from(bytes: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(bytes).map_err(db_err)
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`, creating every table up front
    /// so that reads never hit a missing table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        for def in ALL_ROWS {
            wt.open_table(def).map_err(db_err)?;
        }
        wt.open_table(ACCOUNT_EMAILS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Generic row helpers
    // -----------------------------------------------------------------------

    fn put<T: Serialize>(&self, def: Rows, id: Uuid, value: &T) -> Result<bool> {
        let bytes = serde_json::to_vec(value)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        let existed = {
            let mut table = wt.open_table(def).map_err(db_err)?;
            let previous = table
                .insert(id.as_bytes().as_slice(), bytes.as_slice())
                .map_err(db_err)?;
            previous.is_some()
        };
        wt.commit().map_err(db_err)?;
        Ok(!existed)
    }

    fn get<T: DeserializeOwned>(&self, def: Rows, id: Uuid) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(def).map_err(db_err)?;
        let found = table.get(id.as_bytes().as_slice()).map_err(db_err)?;
        let row = match found {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(row)
    }

    fn scan<T: DeserializeOwned>(&self, def: Rows, pred: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(def).map_err(db_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            let row: T = serde_json::from_slice(v.value())?;
            if pred(&row) {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn remove(&self, def: Rows, id: Uuid) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut table = wt.open_table(def).map_err(db_err)?;
            let previous = table.remove(id.as_bytes().as_slice()).map_err(db_err)?;
            previous.is_some()
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }

    /// Delete every row matching `pred` in a single write transaction.
    fn remove_where<T: DeserializeOwned>(&self, def: Rows, pred: impl Fn(&T) -> bool) -> Result<usize> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let count = {
            let mut table = wt.open_table(def).map_err(db_err)?;
            let mut doomed = Vec::new();
            for entry in table.iter().map_err(db_err)? {
                let (k, v) = entry.map_err(db_err)?;
                let row: T = serde_json::from_slice(v.value())?;
                if pred(&row) {
                    doomed.push(k.value().to_vec());
                }
            }
            for key in &doomed {
                table.remove(key.as_slice()).map_err(db_err)?;
            }
            doomed.len()
        };
        wt.commit().map_err(db_err)?;
        Ok(count)
    }

    fn require<T: DeserializeOwned>(&self, def: Rows, id: Uuid, what: &str) -> Result<()> {
        if self.get::<T>(def, id)?.is_none() {
            return Err(StudioError::NotFound(format!("{what} {id}")));
        }
        Ok(())
    }
}

impl Store for RedbStore {
    fn insert_submission(&self, submission: &ContactSubmission) -> Result<()> {
        self.put(SUBMISSIONS, submission.id, submission).map(|_| ())
    }

    fn get_submission(&self, id: Uuid) -> Result<Option<ContactSubmission>> {
        self.get(SUBMISSIONS, id)
    }

    fn update_submission(&self, submission: &ContactSubmission) -> Result<()> {
        self.require::<ContactSubmission>(SUBMISSIONS, submission.id, "submission")?;
        self.put(SUBMISSIONS, submission.id, submission).map(|_| ())
    }

    fn list_submissions(&self) -> Result<Vec<ContactSubmission>> {
        let mut all: Vec<ContactSubmission> = self.scan(SUBMISSIONS, |_| true)?;
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    fn submissions_by_email(&self, email: &str) -> Result<Vec<ContactSubmission>> {
        let email = normalize_email(email);
        self.scan(SUBMISSIONS, |s: &ContactSubmission| {
            s.normalized_email() == email
        })
    }

    fn submissions_by_profile(&self, profile_id: Uuid) -> Result<Vec<ContactSubmission>> {
        self.scan(SUBMISSIONS, |s: &ContactSubmission| {
            s.assigned_profile_id == Some(profile_id)
        })
    }

    fn delete_submission(&self, id: Uuid) -> Result<bool> {
        self.remove(SUBMISSIONS, id)
    }

    fn get_account(&self, id: Uuid) -> Result<Option<UserAccount>> {
        self.get(ACCOUNTS, id)
    }

    fn account_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        let email = normalize_email(email);
        let id = {
            let rt = self.db.begin_read().map_err(db_err)?;
            let index = rt.open_table(ACCOUNT_EMAILS).map_err(db_err)?;
            let found = index.get(email.as_str()).map_err(db_err)?;
            let id = match found {
                Some(guard) => uuid_from(guard.value())?,
                None => return Ok(None),
            };
            id
        };
        self.get_account(id)
    }

    fn upsert_account(&self, account: &UserAccount) -> Result<bool> {
        let mut account = account.clone();
        account.email = normalize_email(&account.email);
        let bytes = serde_json::to_vec(&account)?;

        let wt = self.db.begin_write().map_err(db_err)?;
        let created = {
            let mut rows = wt.open_table(ACCOUNTS).map_err(db_err)?;
            let mut index = wt.open_table(ACCOUNT_EMAILS).map_err(db_err)?;
            let previous_email = match rows
                .insert(account.id.as_bytes().as_slice(), bytes.as_slice())
                .map_err(db_err)?
            {
                Some(prev) => {
                    let prev: UserAccount = serde_json::from_slice(prev.value())?;
                    Some(prev.email)
                }
                None => None,
            };
            if let Some(old) = previous_email.as_deref() {
                if old != account.email {
                    index.remove(old).map_err(db_err)?;
                }
            }
            index
                .insert(account.email.as_str(), account.id.as_bytes().as_slice())
                .map_err(db_err)?;
            previous_email.is_none()
        };
        wt.commit().map_err(db_err)?;
        Ok(created)
    }

    fn delete_account(&self, id: Uuid) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut rows = wt.open_table(ACCOUNTS).map_err(db_err)?;
            let mut index = wt.open_table(ACCOUNT_EMAILS).map_err(db_err)?;
            let email = match rows.remove(id.as_bytes().as_slice()).map_err(db_err)? {
                Some(prev) => {
                    let prev: UserAccount = serde_json::from_slice(prev.value())?;
                    Some(prev.email)
                }
                None => None,
            };
            if let Some(email) = email.as_deref() {
                index.remove(email).map_err(db_err)?;
            }
            email.is_some()
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }

    fn get_profile(&self, id: Uuid) -> Result<Option<ClientProfile>> {
        self.get(PROFILES, id)
    }

    fn profile_by_user(&self, user_id: Uuid) -> Result<Option<ClientProfile>> {
        let profile_id = {
            let rt = self.db.begin_read().map_err(db_err)?;
            let index = rt.open_table(PROFILE_USERS).map_err(db_err)?;
            let found = index.get(user_id.as_bytes().as_slice()).map_err(db_err)?;
            let id = match found {
                Some(guard) => uuid_from(guard.value())?,
                None => return Ok(None),
            };
            id
        };
        self.get_profile(profile_id)
    }

    fn insert_profile(&self, profile: &ClientProfile) -> Result<()> {
        let bytes = serde_json::to_vec(profile)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut rows = wt.open_table(PROFILES).map_err(db_err)?;
            let mut index = wt.open_table(PROFILE_USERS).map_err(db_err)?;
            rows.insert(profile.id.as_bytes().as_slice(), bytes.as_slice())
                .map_err(db_err)?;
            index
                .insert(
                    profile.user_id.as_bytes().as_slice(),
                    profile.id.as_bytes().as_slice(),
                )
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn update_profile(&self, profile: &ClientProfile) -> Result<()> {
        self.require::<ClientProfile>(PROFILES, profile.id, "profile")?;
        self.insert_profile(profile)
    }

    fn delete_profile(&self, id: Uuid) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut rows = wt.open_table(PROFILES).map_err(db_err)?;
            let mut index = wt.open_table(PROFILE_USERS).map_err(db_err)?;
            let user_id = match rows.remove(id.as_bytes().as_slice()).map_err(db_err)? {
                Some(prev) => {
                    let prev: ClientProfile = serde_json::from_slice(prev.value())?;
                    Some(prev.user_id)
                }
                None => None,
            };
            if let Some(user_id) = user_id {
                index.remove(user_id.as_bytes().as_slice()).map_err(db_err)?;
            }
            user_id.is_some()
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }

    fn insert_dog(&self, dog: &Dog) -> Result<()> {
        self.put(DOGS, dog.id, dog).map(|_| ())
    }

    fn dogs_by_owner(&self, owner_id: Uuid) -> Result<Vec<Dog>> {
        self.scan(DOGS, |d: &Dog| d.owner_id == owner_id)
    }

    fn delete_dogs_by_owner(&self, owner_id: Uuid) -> Result<usize> {
        self.remove_where(DOGS, |d: &Dog| d.owner_id == owner_id)
    }

    fn insert_session(&self, session: &Session) -> Result<()> {
        self.put(SESSIONS, session.id, session).map(|_| ())
    }

    fn sessions_by_client(&self, client_id: Uuid) -> Result<Vec<Session>> {
        self.scan(SESSIONS, |s: &Session| s.client_id == client_id)
    }

    fn delete_sessions_by_client(&self, client_id: Uuid) -> Result<usize> {
        self.remove_where(SESSIONS, |s: &Session| s.client_id == client_id)
    }

    fn insert_message(&self, message: &Message) -> Result<()> {
        self.put(MESSAGES, message.id, message).map(|_| ())
    }

    fn messages_for_profile(&self, profile_id: Uuid) -> Result<Vec<Message>> {
        self.scan(MESSAGES, |m: &Message| m.involves(profile_id))
    }

    fn delete_messages_for_profile(&self, profile_id: Uuid) -> Result<usize> {
        self.remove_where(MESSAGES, |m: &Message| m.involves(profile_id))
    }

    fn insert_read_receipt(&self, receipt: &MessageReadReceipt) -> Result<()> {
        self.put(RECEIPTS, receipt.id, receipt).map(|_| ())
    }

    fn read_receipts_by_user(&self, user_id: Uuid) -> Result<Vec<MessageReadReceipt>> {
        self.scan(RECEIPTS, |r: &MessageReadReceipt| r.user_id == user_id)
    }

    fn delete_read_receipts_by_user(&self, user_id: Uuid) -> Result<usize> {
        self.remove_where(RECEIPTS, |r: &MessageReadReceipt| r.user_id == user_id)
    }

    fn insert_note(&self, note: &ClientNote) -> Result<()> {
        self.put(NOTES, note.id, note).map(|_| ())
    }

    fn notes_by_client(&self, client_id: Uuid) -> Result<Vec<ClientNote>> {
        self.scan(NOTES, |n: &ClientNote| n.client_id == client_id)
    }

    fn delete_notes_by_client(&self, client_id: Uuid) -> Result<usize> {
        self.remove_where(NOTES, |n: &ClientNote| n.client_id == client_id)
    }

    fn insert_referral(&self, referral: &Referral) -> Result<()> {
        self.put(REFERRALS, referral.id, referral).map(|_| ())
    }

    fn referrals_by_referrer(&self, referrer_id: Uuid) -> Result<Vec<Referral>> {
        self.scan(REFERRALS, |r: &Referral| r.referrer_id == referrer_id)
    }

    fn delete_referrals_by_referrer(&self, referrer_id: Uuid) -> Result<usize> {
        self.remove_where(REFERRALS, |r: &Referral| r.referrer_id == referrer_id)
    }

    fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.put(PAYMENTS, payment.id, payment).map(|_| ())
    }

    fn payments_by_client(&self, client_id: Uuid) -> Result<Vec<Payment>> {
        self.scan(PAYMENTS, |p: &Payment| p.client_id == client_id)
    }

    fn delete_payments_by_client(&self, client_id: Uuid) -> Result<usize> {
        self.remove_where(PAYMENTS, |p: &Payment| p.client_id == client_id)
    }

    fn insert_invitation(&self, invitation: &SignupInvitation) -> Result<()> {
        self.put(INVITATIONS, invitation.id, invitation).map(|_| ())
    }

    fn invitations_by_email(&self, email: &str) -> Result<Vec<SignupInvitation>> {
        let email = normalize_email(email);
        self.scan(INVITATIONS, |i: &SignupInvitation| i.email == email)
    }

    fn delete_invitations_by_email(&self, email: &str) -> Result<usize> {
        let email = normalize_email(email);
        self.remove_where(INVITATIONS, |i: &SignupInvitation| i.email == email)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::DEFAULT_HOW_HEARD;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("studio.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn submission_round_trip_and_update() {
        let (_dir, store) = open_tmp();
        let mut sub = ContactSubmission::new("Ann", "a@x.com");
        store.insert_submission(&sub).unwrap();

        sub.set_status(crate::types::SubmissionStatus::Contacted);
        store.update_submission(&sub).unwrap();

        let loaded = store.get_submission(sub.id).unwrap().unwrap();
        assert_eq!(loaded.status, crate::types::SubmissionStatus::Contacted);
        assert_eq!(store.submissions_by_email("A@X.COM").unwrap().len(), 1);
    }

    #[test]
    fn email_index_follows_account_changes() {
        let (_dir, store) = open_tmp();
        let mut acc = UserAccount::client(Uuid::new_v4(), "old@x.com");
        assert!(store.upsert_account(&acc).unwrap());

        acc.email = "new@x.com".to_string();
        assert!(!store.upsert_account(&acc).unwrap());
        assert!(store.account_by_email("old@x.com").unwrap().is_none());
        assert_eq!(store.account_by_email("new@x.com").unwrap().unwrap().id, acc.id);

        assert!(store.delete_account(acc.id).unwrap());
        assert!(store.account_by_email("new@x.com").unwrap().is_none());
        assert!(!store.delete_account(acc.id).unwrap());
    }

    #[test]
    fn profile_index_by_user() {
        let (_dir, store) = open_tmp();
        let user_id = Uuid::new_v4();
        let sub = ContactSubmission::new("Ann", "a@x.com");
        let profile = ClientProfile::from_submission(user_id, &sub, DEFAULT_HOW_HEARD);
        store.insert_profile(&profile).unwrap();

        assert_eq!(store.profile_by_user(user_id).unwrap().unwrap().id, profile.id);
        assert!(store.delete_profile(profile.id).unwrap());
        assert!(store.profile_by_user(user_id).unwrap().is_none());
    }

    #[test]
    fn delete_by_owner_only_touches_owner_rows() {
        let (_dir, store) = open_tmp();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_dog(&Dog::new(a, "Rex")).unwrap();
        store.insert_dog(&Dog::new(a, "Fido")).unwrap();
        store.insert_dog(&Dog::new(b, "Max")).unwrap();

        assert_eq!(store.delete_dogs_by_owner(a).unwrap(), 2);
        assert!(store.dogs_by_owner(a).unwrap().is_empty());
        assert_eq!(store.dogs_by_owner(b).unwrap().len(), 1);
        assert_eq!(store.delete_dogs_by_owner(a).unwrap(), 0);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("studio.db");
        let sub = ContactSubmission::new("Ann", "a@x.com");
        {
            let store = RedbStore::open(&path).unwrap();
            store.insert_submission(&sub).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert!(store.get_submission(sub.id).unwrap().is_some());
    }
}
