//! Workspace reset: remove compiled output and materialized templates.
//!
//! Never fails. A missing directory is already reset; any other removal
//! error is logged and the build carries on.

use crate::{config::BuildConfig, log};
use std::{fs, io::ErrorKind, path::Path};

/// Delete the output and template directories.
pub fn reset_workspace(build: &BuildConfig) {
    for dir in [&build.output, &build.templates] {
        remove_dir(dir);
    }
}

fn remove_dir(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log!("reset"; "failed to remove {}: {e}", dir.display()),
    }
}
