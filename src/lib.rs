//! Core library for the Rancher docker-machine driver.
//!
//! The crate adapts the docker-machine driver lifecycle (configure →
//! pre-create check → create → query state/IP/URL → start, stop, restart,
//! remove) onto virtual machines hosted in a Rancher environment. Remote calls
//! go through the [`RancherApi`] capability trait so the lifecycle can be
//! exercised against scripted doubles.

pub mod api;
pub mod cloud_init;
pub mod config;
pub mod driver;
pub mod rancher;
pub mod ssh_key;
pub mod state;
pub mod store;
pub mod test_support;

pub use api::{
    ApiFuture, Connector, Endpoint, ProjectFilter, RancherApi, RequestError, VirtualMachineRequest,
    VirtualMachineRequestBuilder, VmAction,
};
pub use config::{ConfigError, DriverConfig, DriverOptions, OptionValue};
pub use driver::{Clock, Driver, DriverError, TokioClock};
pub use rancher::{ApiError, Project, RancherClient, RancherConnector, VirtualMachine};
pub use ssh_key::{KeyError, KeyGenerator, SshKeygen};
pub use state::{MachineState, VmStatus};
pub use store::{DriverState, MachineStore, StoreError};
