//! On-disk machine state shared between driver invocations.
//!
//! Each machine owns `<root>/machines/<name>/`, holding its SSH key pair and a
//! `config.json` with the serialised [`DriverState`].

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DriverConfig;

const MACHINES_DIR: &str = "machines";
const STATE_FILE_NAME: &str = "config.json";

/// Returns the directory holding a machine's files.
#[must_use]
pub fn machine_dir(root: &Utf8Path, machine_name: &str) -> Utf8PathBuf {
    root.join(MACHINES_DIR).join(machine_name)
}

/// Driver fields persisted between commands.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DriverState {
    /// Local machine name.
    pub machine_name: String,
    /// Resolved configuration, including the scoped API URL.
    pub config: DriverConfig,
    /// Rancher machine id, empty until created.
    #[serde(default)]
    pub machine_id: String,
    /// Last known IP address.
    #[serde(default)]
    pub ip_address: String,
}

/// Errors raised while reading or writing machine state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Raised when no state has been saved for the machine.
    #[error("machine {name} does not exist")]
    NotFound {
        /// Machine name.
        name: String,
    },
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the state file cannot be parsed or rendered.
    #[error("invalid machine state in {path}: {message}")]
    Serde {
        /// Path of the state file.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Machine state store rooted at the host's storage path.
#[derive(Clone, Debug)]
pub struct MachineStore {
    root: Utf8PathBuf,
}

impl MachineStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the storage root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the directory holding `name`'s files.
    #[must_use]
    pub fn machine_dir(&self, name: &str) -> Utf8PathBuf {
        machine_dir(&self.root, name)
    }

    /// Loads the saved state of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when nothing was saved, or another
    /// [`StoreError`] when the file cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<DriverState, StoreError> {
        let dir_path = self.machine_dir(name);
        let path = dir_path.join(STATE_FILE_NAME);
        let dir = match Dir::open_ambient_dir(&dir_path, ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    name: name.to_owned(),
                });
            }
            Err(err) => return Err(io_error(&dir_path, &err)),
        };
        let contents = match dir.read_to_string(STATE_FILE_NAME) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    name: name.to_owned(),
                });
            }
            Err(err) => return Err(io_error(&path, &err)),
        };
        serde_json::from_str(&contents).map_err(|err| StoreError::Serde {
            path,
            message: err.to_string(),
        })
    }

    /// Saves `state`, creating the machine directory when needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory or file cannot be written.
    pub fn save(&self, state: &DriverState) -> Result<Utf8PathBuf, StoreError> {
        let dir_path = self.machine_dir(&state.machine_name);
        let path = dir_path.join(STATE_FILE_NAME);
        Dir::create_ambient_dir_all(&dir_path, ambient_authority())
            .map_err(|err| io_error(&dir_path, &err))?;
        let dir = Dir::open_ambient_dir(&dir_path, ambient_authority())
            .map_err(|err| io_error(&dir_path, &err))?;
        let rendered = serde_json::to_string_pretty(state).map_err(|err| StoreError::Serde {
            path: path.clone(),
            message: err.to_string(),
        })?;
        dir.write(STATE_FILE_NAME, rendered)
            .map_err(|err| io_error(&path, &err))?;
        Ok(path)
    }

    /// Deletes everything stored for `name`. Missing entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the directory cannot be removed.
    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let machines = self.root.join(MACHINES_DIR);
        let dir = match Dir::open_ambient_dir(&machines, ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(io_error(&machines, &err)),
        };
        match dir.remove_dir_all(name) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&self.machine_dir(name), &err)),
        }
    }
}

fn io_error(path: &Utf8Path, err: &io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
