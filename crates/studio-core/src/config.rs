use crate::credential::{CredentialPolicy, MIN_SUFFIX_LEN};
use crate::error::{Result, StudioError};
use crate::onboarding::DEFAULT_HOW_HEARD;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// IdentityConfig
// ---------------------------------------------------------------------------

/// Where login identities live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityConfig {
    /// Durable identity store in `.studio/identity.db`.
    #[default]
    Local,
    /// Hosted auth admin API.
    Http {
        base_url: String,
        /// Name of the environment variable holding the service key.
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_api_key_env() -> String {
    "STUDIO_IDENTITY_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl IdentityConfig {
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            IdentityConfig::Local => None,
            IdentityConfig::Http { timeout_secs, .. } => Some(Duration::from_secs(*timeout_secs)),
        }
    }
}

// ---------------------------------------------------------------------------
// OnboardingConfig / CredentialConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingConfig {
    /// Recorded as the referral source on profiles created from the intake form.
    #[serde(default = "default_how_heard")]
    pub how_heard: String,
}

fn default_how_heard() -> String {
    DEFAULT_HOW_HEARD.to_string()
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            how_heard: default_how_heard(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_prefix_words")]
    pub prefix_words: usize,
    #[serde(default = "default_suffix_len")]
    pub suffix_len: usize,
}

fn default_prefix_words() -> usize {
    2
}

fn default_suffix_len() -> usize {
    6
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            prefix_words: default_prefix_words(),
            suffix_len: default_suffix_len(),
        }
    }
}

impl CredentialConfig {
    pub fn policy(&self) -> CredentialPolicy {
        CredentialPolicy {
            prefix_words: self.prefix_words,
            suffix_len: self.suffix_len,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub studio: StudioInfo,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(studio_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            studio: StudioInfo {
                name: studio_name.into(),
            },
            identity: IdentityConfig::default(),
            onboarding: OnboardingConfig::default(),
            credential: CredentialConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(StudioError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.studio.name.trim().is_empty() {
            push(WarnLevel::Warning, "studio.name is empty".to_string());
        }

        if let IdentityConfig::Http {
            base_url,
            api_key_env,
            timeout_secs,
        } = &self.identity
        {
            if base_url.trim().is_empty() {
                push(WarnLevel::Error, "identity.base_url is empty".to_string());
            } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                push(
                    WarnLevel::Error,
                    format!("identity.base_url '{base_url}' is not an http(s) URL"),
                );
            }
            if *timeout_secs == 0 {
                push(
                    WarnLevel::Error,
                    "identity.timeout_secs is 0; requests would never be bounded".to_string(),
                );
            }
            if std::env::var(api_key_env).map(|v| v.is_empty()).unwrap_or(true) {
                push(
                    WarnLevel::Warning,
                    format!("environment variable '{api_key_env}' is not set"),
                );
            }
        }

        if self.credential.suffix_len < MIN_SUFFIX_LEN {
            push(
                WarnLevel::Warning,
                format!(
                    "credential.suffix_len {} is below {MIN_SUFFIX_LEN}; {MIN_SUFFIX_LEN} will be used",
                    self.credential.suffix_len
                ),
            );
        }
        if self.credential.prefix_words == 0 {
            push(
                WarnLevel::Warning,
                "credential.prefix_words is 0; one word will be used".to_string(),
            );
        }
        if self.onboarding.how_heard.trim().is_empty() {
            push(WarnLevel::Warning, "onboarding.how_heard is empty".to_string());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
