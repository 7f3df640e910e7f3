use crate::config::Config;
use crate::credential::CredentialPolicy;
use crate::identity::IdentityService;
use crate::onboarding::DEFAULT_HOW_HEARD;
use crate::store::Store;

/// The collaborators every lifecycle operation runs against.
///
/// Borrowed rather than owned so the same store and identity client can be
/// shared between callers (the CLI's `Studio`, tests, an embedding server).
pub struct Backend<'a> {
    pub store: &'a dyn Store,
    pub identity: &'a dyn IdentityService,
    pub how_heard: String,
    pub credential: CredentialPolicy,
}

impl<'a> Backend<'a> {
    pub fn new(store: &'a dyn Store, identity: &'a dyn IdentityService) -> Self {
        Self {
            store,
            identity,
            how_heard: DEFAULT_HOW_HEARD.to_string(),
            credential: CredentialPolicy::default(),
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.how_heard = config.onboarding.how_heard.clone();
        self.credential = config.credential.policy();
        self
    }
}
