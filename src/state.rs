//! Virtual machine status vocabulary and its canonical machine states.
//!
//! Rancher reports instance status as free-form strings. They are parsed into
//! [`VmStatus`] as soon as a response is decoded, and [`VmStatus::machine_state`]
//! folds them into the small [`MachineState`] set the host understands.

use std::fmt;

/// Canonical machine states reported to the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MachineState {
    /// The machine is being created, migrated, restored or booted.
    Starting,
    /// The machine is up.
    Running,
    /// The machine is shutting down.
    Stopping,
    /// The machine is powered off.
    Stopped,
    /// The machine failed or is being purged.
    Error,
    /// The remote reported a status this driver does not recognise.
    Unknown,
}

impl MachineState {
    /// Returns the name the host prints for this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status string reported by Rancher for a virtual machine.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(from = "String", into = "String")]
pub enum VmStatus {
    /// `creating`
    Creating,
    /// `migrating`
    Migrating,
    /// `requested`
    Requested,
    /// `restarting`
    Restarting,
    /// `restoring`
    Restoring,
    /// `starting`
    Starting,
    /// `error`
    Error,
    /// `erroring`
    Erroring,
    /// `purged`
    Purged,
    /// `purging`
    Purging,
    /// `removed`
    Removed,
    /// `removing`
    Removing,
    /// `running`
    Running,
    /// `updating-running`
    UpdatingRunning,
    /// `stopped`
    Stopped,
    /// `updating-stopped`
    UpdatingStopped,
    /// `stopping`
    Stopping,
    /// No status was reported.
    #[default]
    Missing,
    /// Any other status string, kept verbatim.
    Other(String),
}

impl VmStatus {
    /// Returns the wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Migrating => "migrating",
            Self::Requested => "requested",
            Self::Restarting => "restarting",
            Self::Restoring => "restoring",
            Self::Starting => "starting",
            Self::Error => "error",
            Self::Erroring => "erroring",
            Self::Purged => "purged",
            Self::Purging => "purging",
            Self::Removed => "removed",
            Self::Removing => "removing",
            Self::Running => "running",
            Self::UpdatingRunning => "updating-running",
            Self::Stopped => "stopped",
            Self::UpdatingStopped => "updating-stopped",
            Self::Stopping => "stopping",
            Self::Missing => "",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Maps the remote status onto the canonical machine state.
    ///
    /// Unrecognised statuses map to [`MachineState::Unknown`].
    #[must_use]
    pub const fn machine_state(&self) -> MachineState {
        match self {
            Self::Creating
            | Self::Migrating
            | Self::Requested
            | Self::Restarting
            | Self::Restoring
            | Self::Starting => MachineState::Starting,
            Self::Error
            | Self::Erroring
            | Self::Purged
            | Self::Purging
            | Self::Removed
            | Self::Removing => MachineState::Error,
            Self::Running | Self::UpdatingRunning => MachineState::Running,
            Self::Stopped | Self::UpdatingStopped => MachineState::Stopped,
            Self::Stopping => MachineState::Stopping,
            Self::Missing | Self::Other(_) => MachineState::Unknown,
        }
    }
}

impl From<&str> for VmStatus {
    fn from(value: &str) -> Self {
        match value {
            "creating" => Self::Creating,
            "migrating" => Self::Migrating,
            "requested" => Self::Requested,
            "restarting" => Self::Restarting,
            "restoring" => Self::Restoring,
            "starting" => Self::Starting,
            "error" => Self::Error,
            "erroring" => Self::Erroring,
            "purged" => Self::Purged,
            "purging" => Self::Purging,
            "removed" => Self::Removed,
            "removing" => Self::Removing,
            "running" => Self::Running,
            "updating-running" => Self::UpdatingRunning,
            "stopped" => Self::Stopped,
            "updating-stopped" => Self::UpdatingStopped,
            "stopping" => Self::Stopping,
            "" => Self::Missing,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for VmStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<VmStatus> for String {
    fn from(value: VmStatus) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
