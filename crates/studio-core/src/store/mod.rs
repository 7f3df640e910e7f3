//! Relational Store Gateway.
//!
//! Typed reads and writes for every entity the lifecycle touches, plus the
//! delete-by-owner primitives the cascading delete walks through. No business
//! logic lives here: callers decide ordering, idempotency and error handling.
//!
//! Every method is a single bounded request. There is no transaction spanning
//! calls; each call commits on its own.

pub mod memory;
pub mod redb_store;

pub use self::memory::MemoryStore;
pub use self::redb_store::RedbStore;

use crate::error::Result;
use crate::model::{
    ClientNote, ClientProfile, ContactSubmission, Dog, Message, MessageReadReceipt, Payment,
    Referral, Session, SignupInvitation, UserAccount,
};
use uuid::Uuid;

pub trait Store {
    // -- Submissions ---------------------------------------------------------

    fn insert_submission(&self, submission: &ContactSubmission) -> Result<()>;
    fn get_submission(&self, id: Uuid) -> Result<Option<ContactSubmission>>;
    fn update_submission(&self, submission: &ContactSubmission) -> Result<()>;
    fn list_submissions(&self) -> Result<Vec<ContactSubmission>>;
    /// Submissions whose normalised email matches.
    fn submissions_by_email(&self, email: &str) -> Result<Vec<ContactSubmission>>;
    fn submissions_by_profile(&self, profile_id: Uuid) -> Result<Vec<ContactSubmission>>;
    fn delete_submission(&self, id: Uuid) -> Result<bool>;

    // -- Account mirror ------------------------------------------------------

    fn get_account(&self, id: Uuid) -> Result<Option<UserAccount>>;
    fn account_by_email(&self, email: &str) -> Result<Option<UserAccount>>;
    /// Insert or overwrite the mirror row. Returns true if the row was new.
    fn upsert_account(&self, account: &UserAccount) -> Result<bool>;
    fn delete_account(&self, id: Uuid) -> Result<bool>;

    // -- Profiles ------------------------------------------------------------

    fn get_profile(&self, id: Uuid) -> Result<Option<ClientProfile>>;
    fn profile_by_user(&self, user_id: Uuid) -> Result<Option<ClientProfile>>;
    fn insert_profile(&self, profile: &ClientProfile) -> Result<()>;
    fn update_profile(&self, profile: &ClientProfile) -> Result<()>;
    fn delete_profile(&self, id: Uuid) -> Result<bool>;

    // -- Dogs and sessions ---------------------------------------------------

    fn insert_dog(&self, dog: &Dog) -> Result<()>;
    fn dogs_by_owner(&self, owner_id: Uuid) -> Result<Vec<Dog>>;
    fn delete_dogs_by_owner(&self, owner_id: Uuid) -> Result<usize>;

    fn insert_session(&self, session: &Session) -> Result<()>;
    fn sessions_by_client(&self, client_id: Uuid) -> Result<Vec<Session>>;
    fn delete_sessions_by_client(&self, client_id: Uuid) -> Result<usize>;

    // -- Messages ------------------------------------------------------------

    fn insert_message(&self, message: &Message) -> Result<()>;
    /// Messages where the profile is sender or recipient.
    fn messages_for_profile(&self, profile_id: Uuid) -> Result<Vec<Message>>;
    fn delete_messages_for_profile(&self, profile_id: Uuid) -> Result<usize>;

    fn insert_read_receipt(&self, receipt: &MessageReadReceipt) -> Result<()>;
    fn read_receipts_by_user(&self, user_id: Uuid) -> Result<Vec<MessageReadReceipt>>;
    fn delete_read_receipts_by_user(&self, user_id: Uuid) -> Result<usize>;

    // -- Notes, referrals, payments -----------------------------------------

    fn insert_note(&self, note: &ClientNote) -> Result<()>;
    fn notes_by_client(&self, client_id: Uuid) -> Result<Vec<ClientNote>>;
    fn delete_notes_by_client(&self, client_id: Uuid) -> Result<usize>;

    fn insert_referral(&self, referral: &Referral) -> Result<()>;
    fn referrals_by_referrer(&self, referrer_id: Uuid) -> Result<Vec<Referral>>;
    fn delete_referrals_by_referrer(&self, referrer_id: Uuid) -> Result<usize>;

    fn insert_payment(&self, payment: &Payment) -> Result<()>;
    fn payments_by_client(&self, client_id: Uuid) -> Result<Vec<Payment>>;
    fn delete_payments_by_client(&self, client_id: Uuid) -> Result<usize>;

    // -- Signup invitations --------------------------------------------------

    fn insert_invitation(&self, invitation: &SignupInvitation) -> Result<()>;
    fn invitations_by_email(&self, email: &str) -> Result<Vec<SignupInvitation>>;
    fn delete_invitations_by_email(&self, email: &str) -> Result<usize>;
}
