use crate::error::{Result, StudioError};
use crate::onboarding::OnboardingData;
use crate::types::{Role, SubmissionStatus};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Email helpers
// ---------------------------------------------------------------------------

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

/// Canonical form used for every email comparison and index key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(StudioError::Validation("email is required".to_string()));
    }
    if !email_re().is_match(email) {
        return Err(StudioError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// ContactSubmission
// ---------------------------------------------------------------------------

/// Dog details captured by the intake form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DogDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
}

impl DogDetails {
    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

/// An inquiry from the public intake form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub dog: DogDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_profile_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactSubmission {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            phone: None,
            dog: DogDetails::default(),
            message: None,
            status: SubmissionStatus::New,
            assigned_profile_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = non_empty(phone);
        self
    }

    pub fn with_dog(mut self, dog: DogDetails) -> Self {
        self.dog = DogDetails {
            name: non_empty(dog.name),
            breed: non_empty(dog.breed),
            birth_date: dog.birth_date,
            sex: non_empty(dog.sex),
        };
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = non_empty(message);
        self
    }

    /// Rejects input that must never reach a side effect.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StudioError::Validation("name is required".to_string()));
        }
        validate_email(&self.email)
    }

    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }

    pub fn set_status(&mut self, status: SubmissionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn link_profile(&mut self, profile_id: Uuid) {
        self.assigned_profile_id = Some(profile_id);
        self.updated_at = Utc::now();
    }

    pub fn unlink_profile(&mut self) {
        self.assigned_profile_id = None;
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// UserAccount (internal mirror of an external identity)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Same id as the external identity.
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn client(id: Uuid, email: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: normalize_email(email),
            role: Role::Client,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// ClientProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub profile_completed: bool,
    pub onboarding_step: u32,
    pub onboarding_data: OnboardingData,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientProfile {
    /// A fresh, not-yet-onboarded profile pre-populated from a submission.
    pub fn from_submission(user_id: Uuid, submission: &ContactSubmission, how_heard: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: submission.name.clone(),
            email: submission.normalized_email(),
            phone: submission.phone.clone(),
            profile_completed: false,
            onboarding_step: 0,
            onboarding_data: OnboardingData::from_submission(submission, how_heard),
            is_active: true,
            admin_notes: submission.message.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh contact fields and the onboarding snapshot from a submission,
    /// leaving onboarding progress untouched.
    pub fn refresh_from(&mut self, submission: &ContactSubmission, how_heard: &str) {
        self.name = submission.name.clone();
        self.phone = submission.phone.clone().or(self.phone.take());
        if submission.message.is_some() {
            self.admin_notes = submission.message.clone();
        }
        self.onboarding_data = OnboardingData::from_submission(submission, how_heard);
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Dependents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dog {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavioral_notes: Option<String>,
    /// Set when the dog was created by converting a submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_submission_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Dog {
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            breed: None,
            birth_date: None,
            sex: None,
            behavioral_notes: None,
            source_submission_id: None,
            created_at: Utc::now(),
        }
    }

    /// Returns `None` when the submission carries no dog name.
    pub fn from_submission(owner_id: Uuid, submission: &ContactSubmission) -> Option<Self> {
        if !submission.dog.has_name() {
            return None;
        }
        let name = submission.dog.name.clone()?;
        let mut dog = Dog::new(owner_id, name);
        dog.breed = submission.dog.breed.clone();
        dog.birth_date = submission.dog.birth_date;
        dog.sex = submission.dog.sex.clone();
        dog.behavioral_notes = submission.message.clone();
        dog.source_submission_id = Some(submission.id);
        Some(dog)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dog_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Session {
    pub fn new(client_id: Uuid, dog_id: Option<Uuid>, starts_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            dog_id,
            starts_at,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn new(sender_id: Uuid, recipient_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            recipient_id,
            body: body.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn involves(&self, profile_id: Uuid) -> bool {
        self.sender_id == profile_id || self.recipient_id == profile_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReadReceipt {
    pub id: Uuid,
    pub message_id: Uuid,
    /// Account id of the reader.
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

impl MessageReadReceipt {
    pub fn new(message_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_id,
            user_id,
            read_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientNote {
    pub id: Uuid,
    pub client_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ClientNote {
    pub fn new(client_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_email: String,
    pub created_at: DateTime<Utc>,
}

impl Referral {
    pub fn new(referrer_id: Uuid, referred_email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            referrer_id,
            referred_email: normalize_email(referred_email),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(client_id: Uuid, amount_cents: i64, currency: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            amount_cents,
            currency: currency.into(),
            paid_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupInvitation {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
}

impl SignupInvitation {
    pub fn new(email: &str, valid_for: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            client_id: None,
            created_at: now,
            expires_at: now + valid_for,
            accepted_at: None,
        }
    }

    /// Still usable to complete a signup.
    pub fn is_outstanding(&self, now: DateTime<Utc>) -> bool {
        self.accepted_at.is_none() && self.expires_at > now
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        for ok in ["a@x.com", " Jo.Smith@Example.org "] {
            validate_email(ok).unwrap_or_else(|_| panic!("expected valid: {ok}"));
        }
        for bad in ["", "   ", "no-at-sign", "two@@x.com", "a@b"] {
            assert!(validate_email(bad).is_err(), "expected invalid: {bad}");
        }
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn submission_requires_name_and_email() {
        assert!(ContactSubmission::new("", "a@x.com").validate().is_err());
        assert!(ContactSubmission::new("Ann", "").validate().is_err());
        ContactSubmission::new("Ann", "a@x.com").validate().unwrap();
    }

    #[test]
    fn blank_dog_name_means_no_dog() {
        let sub = ContactSubmission::new("Ann", "a@x.com").with_dog(DogDetails {
            name: Some("   ".into()),
            ..DogDetails::default()
        });
        assert!(!sub.dog.has_name());
        assert!(Dog::from_submission(Uuid::new_v4(), &sub).is_none());
    }

    #[test]
    fn dog_from_submission_carries_message_as_notes() {
        let sub = ContactSubmission::new("Ann", "a@x.com")
            .with_dog(DogDetails {
                name: Some("Rex".into()),
                breed: Some("Collie".into()),
                ..DogDetails::default()
            })
            .with_message(Some("Pulls on the leash".into()));
        let owner = Uuid::new_v4();
        let dog = Dog::from_submission(owner, &sub).unwrap();
        assert_eq!(dog.name, "Rex");
        assert_eq!(dog.owner_id, owner);
        assert_eq!(dog.behavioral_notes.as_deref(), Some("Pulls on the leash"));
        assert_eq!(dog.source_submission_id, Some(sub.id));
    }

    #[test]
    fn invitation_outstanding_until_accepted_or_expired() {
        let now = Utc::now();
        let mut inv = SignupInvitation::new("a@x.com", chrono::Duration::days(7));
        assert!(inv.is_outstanding(now));
        assert!(!inv.is_outstanding(now + chrono::Duration::days(8)));
        inv.accepted_at = Some(now);
        assert!(!inv.is_outstanding(now));
    }
}
