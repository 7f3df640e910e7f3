use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// SubmissionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    New,
    Contacted,
    Converted,
    Removed,
}

impl SubmissionStatus {
    pub fn all() -> &'static [SubmissionStatus] {
        &[
            SubmissionStatus::New,
            SubmissionStatus::Contacted,
            SubmissionStatus::Converted,
            SubmissionStatus::Removed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::New => "new",
            SubmissionStatus::Contacted => "contacted",
            SubmissionStatus::Converted => "converted",
            SubmissionStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = crate::error::StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(SubmissionStatus::New),
            "contacted" => Ok(SubmissionStatus::Contacted),
            "converted" => Ok(SubmissionStatus::Converted),
            "removed" => Ok(SubmissionStatus::Removed),
            _ => Err(crate::error::StudioError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// How to dispose of a live client when its submission leaves `converted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Reversible: flip `is_active` off on the account mirror and profile.
    Deactivate,
    /// Irreversible: cascade-delete the profile, its dependents and the account.
    Delete,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Deactivate => "deactivate",
            Resolution::Delete => "delete",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resolution {
    type Err = crate::error::StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deactivate" => Ok(Resolution::Deactivate),
            "delete" => Ok(Resolution::Delete),
            _ => Err(crate::error::StudioError::InvalidResolution(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_parses_every_variant() {
        for status in SubmissionStatus::all() {
            assert_eq!(SubmissionStatus::from_str(status.as_str()).unwrap(), *status);
        }
    }

    #[test]
    fn unknown_status_rejected() {
        assert!(SubmissionStatus::from_str("archived").is_err());
        assert!(SubmissionStatus::from_str("").is_err());
    }

    #[test]
    fn resolution_parse() {
        assert_eq!(Resolution::from_str("delete").unwrap(), Resolution::Delete);
        assert_eq!(
            Resolution::from_str("deactivate").unwrap(),
            Resolution::Deactivate
        );
        assert!(Resolution::from_str("archive").is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SubmissionStatus::Converted).unwrap();
        assert_eq!(json, "\"converted\"");
    }
}
