//! Cloud-init user data handed to new virtual machines.
//!
//! The driver only uses user data to authorise the generated SSH key, so the
//! document carries a single `ssh_authorized_keys` entry.

use thiserror::Error;

/// Errors raised while rendering cloud-init user data.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CloudInitError {
    /// Raised when the public key is empty or only whitespace.
    #[error("SSH public key must not be empty")]
    EmptyKey,
    /// Raised when the public key would not fit on one quoted YAML line.
    #[error("SSH public key must be a single line without double quotes")]
    MalformedKey,
}

/// Renders a `#cloud-config` document authorising `public_key`.
///
/// # Errors
///
/// Returns [`CloudInitError`] when the key is empty, spans several lines or
/// contains a double quote.
pub fn render_user_data(public_key: &str) -> Result<String, CloudInitError> {
    validate_key(public_key)?;
    Ok(format!(
        "#cloud-config\n\nssh_authorized_keys:\n  - \"{public_key}\"\n"
    ))
}

fn validate_key(public_key: &str) -> Result<(), CloudInitError> {
    if public_key.trim().is_empty() {
        return Err(CloudInitError::EmptyKey);
    }
    if public_key.contains(['\n', '\r', '"']) {
        return Err(CloudInitError::MalformedKey);
    }
    Ok(())
}
