//! Host environment utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable giving the root directory of the software tree.
///
/// Parameter files and session directories are resolved relative to this
/// root.
pub const ROOT_ENV_VAR: &str = "EXPERT_AGENT_ROOT";

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the software root directory from the environment.
///
/// Returns `Err(())` if the root environment variable is not set, callers
/// are expected to map this onto their own error types.
pub fn get_root() -> Result<PathBuf, ()> {
    match std::env::var(ROOT_ENV_VAR) {
        Ok(p) => Ok(PathBuf::from(p)),
        Err(_) => Err(()),
    }
}
