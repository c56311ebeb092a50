use std::path::{Path, PathBuf};

pub const STATE_DIR: &str = ".chat_client";
pub const STATE_FILE: &str = "history.dat";

#[must_use]
pub fn state_root(base: &Path) -> PathBuf {
    base.join(STATE_DIR)
}

#[must_use]
pub fn state_file_path(base: &Path) -> PathBuf {
    state_root(base).join(STATE_FILE)
}
