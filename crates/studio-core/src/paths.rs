use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STUDIO_DIR: &str = ".studio";
pub const CONFIG_FILE: &str = ".studio/config.yaml";
pub const STORE_FILE: &str = ".studio/studio.db";
pub const IDENTITY_FILE: &str = ".studio/identity.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn studio_dir(root: &Path) -> PathBuf {
    root.join(STUDIO_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn store_path(root: &Path) -> PathBuf {
    root.join(STORE_FILE)
}

pub fn identity_path(root: &Path) -> PathBuf {
    root.join(IDENTITY_FILE)
}
