//! SSH key pair generation for new machines.
//!
//! Key pairs live next to the machine's stored state. Generation is delegated
//! to `ssh-keygen`; an existing private key is reused rather than overwritten.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Default key generator binary.
pub const DEFAULT_SSH_KEYGEN_BIN: &str = "ssh-keygen";

/// Errors raised while generating or reading SSH keys.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum KeyError {
    /// Raised when the key path has no parent directory or file name.
    #[error("invalid SSH key path: {path}")]
    InvalidPath {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Raised when file system access fails.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the key generator cannot be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the key generator exits unsuccessfully.
    #[error("{program} exited with status {status_text}: {stderr}")]
    GenerationFailed {
        /// Program that failed.
        program: String,
        /// Human readable exit status.
        status_text: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Generates an SSH key pair at a given private key path.
pub trait KeyGenerator {
    /// Ensures a key pair exists at `private_key_path` and
    /// `<private_key_path>.pub`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the pair cannot be created.
    fn generate(&self, private_key_path: &Utf8Path) -> Result<(), KeyError>;
}

/// Key generator that shells out to `ssh-keygen`.
#[derive(Clone, Debug)]
pub struct SshKeygen {
    program: String,
}

impl SshKeygen {
    /// Uses the given `ssh-keygen` binary.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SshKeygen {
    fn default() -> Self {
        Self::new(DEFAULT_SSH_KEYGEN_BIN)
    }
}

impl KeyGenerator for SshKeygen {
    fn generate(&self, private_key_path: &Utf8Path) -> Result<(), KeyError> {
        if key_exists(private_key_path)? {
            return Ok(());
        }
        ensure_parent_dir(private_key_path)?;

        let output = Command::new(&self.program)
            .args(["-t", "rsa", "-b", "2048", "-N", "", "-q", "-f"])
            .arg(private_key_path.as_str())
            .output()
            .map_err(|err| KeyError::Spawn {
                program: self.program.clone(),
                message: err.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(KeyError::GenerationFailed {
            program: self.program.clone(),
            status_text: output
                .status
                .code()
                .map_or_else(|| String::from("unknown"), |code| code.to_string()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

/// Returns the public half of the key pair at `private_key_path`.
#[must_use]
pub fn public_key_path(private_key_path: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{private_key_path}.pub"))
}

/// Reads the public key next to `private_key_path`, trimming trailing
/// whitespace and newlines.
///
/// # Errors
///
/// Returns [`KeyError::Io`] when the file cannot be read.
pub fn read_public_key(private_key_path: &Utf8Path) -> Result<String, KeyError> {
    let path = public_key_path(private_key_path);
    let (dir, file_name) = open_parent(&path)?;
    let contents = dir.read_to_string(file_name).map_err(|err| KeyError::Io {
        path: path.clone(),
        message: err.to_string(),
    })?;
    Ok(contents.trim_end_matches(['\r', '\n', '\t', ' ']).to_owned())
}

/// Creates the directory that will hold `path`.
///
/// # Errors
///
/// Returns [`KeyError`] when the directory cannot be created.
pub fn ensure_parent_dir(path: &Utf8Path) -> Result<(), KeyError> {
    let parent = path.parent().ok_or_else(|| KeyError::InvalidPath {
        path: path.to_path_buf(),
    })?;
    if parent.as_str().is_empty() {
        return Ok(());
    }
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| KeyError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })
}

fn key_exists(path: &Utf8Path) -> Result<bool, KeyError> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let Some(file_name) = path.file_name() else {
        return Err(KeyError::InvalidPath {
            path: path.to_path_buf(),
        });
    };
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir.try_exists(file_name).map_err(|err| KeyError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(KeyError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &str), KeyError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| KeyError::InvalidPath {
        path: path.to_path_buf(),
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| KeyError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok((dir, file_name))
}
