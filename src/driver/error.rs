//! Error type for driver operations.

use thiserror::Error;

use crate::api::RequestError;
use crate::cloud_init::CloudInitError;
use crate::config::ConfigError;
use crate::rancher::ApiError;
use crate::ssh_key::KeyError;

/// Errors raised by [`crate::Driver`] operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DriverError {
    /// Configuration is incomplete or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The Rancher API failed; the message is passed through unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// A creation request could not be built.
    #[error("invalid virtual machine request: {0}")]
    Request(#[from] RequestError),
    /// The SSH key pair could not be generated or read.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// The cloud-init document could not be rendered.
    #[error(transparent)]
    CloudInit(#[from] CloudInitError),
    /// The explicitly selected environment does not exist.
    #[error("no environment with id '{id}' was found, check URL and API key")]
    ProjectNotFound {
        /// Environment id supplied by the operator.
        id: String,
    },
    /// No environment carries the requested name.
    #[error("no environment named '{name}' was found, check URL and API key")]
    NoEnvironmentNamed {
        /// Environment name supplied by the operator.
        name: String,
    },
    /// Several environments carry the requested name.
    #[error(
        "there is more than one environment named '{name}', use --rancher-project-id to choose one"
    )]
    AmbiguousEnvironmentName {
        /// Environment name supplied by the operator.
        name: String,
    },
    /// The credentials cannot see any environment.
    #[error("no environments found, check URL and API key")]
    NoEnvironments,
    /// The credentials can see several environments.
    #[error(
        "the supplied API key has access to more than one environment, use --rancher-project-id or --rancher-project-name to choose one"
    )]
    AmbiguousCredentials,
    /// The selected environment does not advertise its own URL.
    #[error("environment {id} does not expose a self link")]
    MissingProjectLink {
        /// Environment id.
        id: String,
    },
    /// The operation needs a machine that has not been created yet.
    #[error("machine id is not set; create the machine first")]
    MachineIdNotSet,
    /// The machine did not become available before the deadline.
    #[error("timed out waiting for VM {machine_id} to become available (last state: {state})")]
    CreateTimeout {
        /// Rancher machine id.
        machine_id: String,
        /// Last status reported by Rancher.
        state: String,
    },
    /// The machine is not running.
    #[error("Host is not running")]
    HostNotRunning,
    /// No usable IP address has been recorded.
    #[error("IP address is not set")]
    IpNotSet,
}
