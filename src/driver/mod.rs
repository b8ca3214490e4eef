//! The docker-machine driver for Rancher virtual machines.
//!
//! A [`Driver`] carries one machine's configuration plus the id and IP address
//! learnt from Rancher. Every remote call goes through a single cached API
//! handle that is rebuilt whenever the scoped base URL changes.

mod clock;
mod create;
mod error;
mod project;

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::info;

use crate::api::{Connector, InstanceStop, RancherApi, VmAction};
use crate::config::{DriverConfig, DriverOptions};
use crate::rancher::VirtualMachine;
use crate::ssh_key::{KeyGenerator, SshKeygen};
use crate::state::MachineState;
use crate::store::{DriverState, machine_dir};

pub use clock::{Clock, SleepFuture, TokioClock};
pub use error::DriverError;

/// Name the driver reports to the host.
pub const DRIVER_NAME: &str = "rancher";
/// TCP port of the Docker engine's TLS endpoint.
pub const DOCKER_PORT: u16 = 2376;
/// SSH port of the provisioned machines.
pub const SSH_PORT: u16 = 22;
/// Interval between readiness polls while creating a machine.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

const SSH_KEY_FILE: &str = "id_rsa";

/// Driver for one Rancher-hosted machine.
pub struct Driver<C: Connector, K = SshKeygen> {
    machine_name: String,
    store_path: Utf8PathBuf,
    config: DriverConfig,
    machine_id: String,
    ip_address: String,
    connector: C,
    keygen: K,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    api: Option<C::Api>,
}

impl<C, K> Driver<C, K>
where
    C: Connector,
    K: KeyGenerator,
{
    /// Creates a driver for `machine_name` whose files live under
    /// `store_path`.
    #[must_use]
    pub fn new(
        machine_name: impl Into<String>,
        store_path: impl Into<Utf8PathBuf>,
        connector: C,
        keygen: K,
    ) -> Self {
        Self {
            machine_name: machine_name.into(),
            store_path: store_path.into(),
            config: DriverConfig::default(),
            machine_id: String::new(),
            ip_address: String::new(),
            connector,
            keygen,
            clock: Arc::new(TokioClock),
            poll_interval: POLL_INTERVAL,
            api: None,
        }
    }

    /// Restores a driver from state persisted after an earlier command.
    #[must_use]
    pub fn from_state(
        state: DriverState,
        store_path: impl Into<Utf8PathBuf>,
        connector: C,
        keygen: K,
    ) -> Self {
        let mut driver = Self::new(state.machine_name, store_path, connector, keygen);
        driver.config = state.config;
        driver.machine_id = state.machine_id;
        driver.ip_address = state.ip_address;
        driver
    }

    /// Captures the state the host persists between commands.
    #[must_use]
    pub fn to_state(&self) -> DriverState {
        DriverState {
            machine_name: self.machine_name.clone(),
            config: self.config.clone(),
            machine_id: self.machine_id.clone(),
            ip_address: self.ip_address.clone(),
        }
    }

    /// Replaces the time source used while waiting for new machines.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the interval between readiness polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns the driver name reported to the host.
    #[must_use]
    pub const fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    /// Returns the local machine name.
    #[must_use]
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Returns the Rancher id of the machine, empty before creation.
    #[must_use]
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Populates the configuration from the host's options.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when a required option is missing.
    pub fn set_config_from_flags(&mut self, options: &DriverOptions) -> Result<(), DriverError> {
        self.config = DriverConfig::from_options(options)?;
        self.api = None;
        Ok(())
    }

    /// Returns the private key path of the machine's SSH key pair.
    #[must_use]
    pub fn ssh_key_path(&self) -> Utf8PathBuf {
        machine_dir(&self.store_path, &self.machine_name).join(SSH_KEY_FILE)
    }

    /// Returns the host name used for SSH, which is the machine's IP.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::IpNotSet`] when no IP has been recorded.
    pub fn ssh_hostname(&self) -> Result<String, DriverError> {
        self.ip()
    }

    /// Returns the SSH login user of the image.
    #[must_use]
    pub fn ssh_username(&self) -> &str {
        if self.config.os_user.is_empty() {
            crate::config::DEFAULT_OS_USER
        } else {
            &self.config.os_user
        }
    }

    /// Returns the SSH port of the machine.
    #[must_use]
    pub const fn ssh_port(&self) -> u16 {
        SSH_PORT
    }

    /// Returns the cached IP address.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::IpNotSet`] when the IP is empty or `"0"`.
    pub fn ip(&self) -> Result<String, DriverError> {
        if self.ip_address.is_empty() || self.ip_address == "0" {
            return Err(DriverError::IpNotSet);
        }
        Ok(self.ip_address.clone())
    }

    /// Queries Rancher for the machine's canonical state, refreshing the
    /// cached IP when Rancher reports one.
    ///
    /// A failed query leaves the machine in [`MachineState::Error`] from the
    /// host's point of view; the error is returned so the caller can report
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the machine cannot be fetched.
    pub async fn state(&mut self) -> Result<MachineState, DriverError> {
        let api = self.api().await?;
        let machine = self.fetch_machine(&api).await?;
        if !machine.primary_ip().is_empty() {
            self.ip_address = machine.primary_ip().to_owned();
        }
        Ok(machine.state.machine_state())
    }

    /// Returns the Docker endpoint of a running machine.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::HostNotRunning`] unless the machine is running,
    /// [`DriverError::IpNotSet`] when no IP is known, or the query error.
    pub async fn url(&mut self) -> Result<String, DriverError> {
        if self.state().await? != MachineState::Running {
            return Err(DriverError::HostNotRunning);
        }
        let ip = self.ip()?;
        Ok(format!("tcp://{ip}:{DOCKER_PORT}"))
    }

    /// Powers the machine on.
    ///
    /// # Errors
    ///
    /// Returns the Rancher error unchanged.
    pub async fn start(&mut self) -> Result<(), DriverError> {
        self.perform(VmAction::Start).await
    }

    /// Powers the machine off.
    ///
    /// # Errors
    ///
    /// Returns the Rancher error unchanged.
    pub async fn stop(&mut self) -> Result<(), DriverError> {
        self.perform(VmAction::Stop(InstanceStop::default())).await
    }

    /// Reboots the machine.
    ///
    /// # Errors
    ///
    /// Returns the Rancher error unchanged.
    pub async fn restart(&mut self) -> Result<(), DriverError> {
        self.perform(VmAction::Restart).await
    }

    /// Stops the machine. Rancher offers no forceful variant.
    ///
    /// # Errors
    ///
    /// Returns the Rancher error unchanged.
    pub async fn kill(&mut self) -> Result<(), DriverError> {
        self.stop().await
    }

    /// Deletes the machine in Rancher.
    ///
    /// # Errors
    ///
    /// Returns the Rancher error unchanged.
    pub async fn remove(&mut self) -> Result<(), DriverError> {
        let api = self.api().await?;
        let machine = self.fetch_machine(&api).await?;
        info!(machine = %self.machine_name, id = %machine.id, "removing machine");
        api.delete_virtual_machine(&machine).await?;
        Ok(())
    }

    async fn perform(&mut self, action: VmAction) -> Result<(), DriverError> {
        let api = self.api().await?;
        let machine = self.fetch_machine(&api).await?;
        info!(machine = %self.machine_name, id = %machine.id, %action, "invoking machine action");
        api.virtual_machine_action(&machine, &action).await?;
        Ok(())
    }

    async fn fetch_machine(&self, api: &C::Api) -> Result<VirtualMachine, DriverError> {
        if self.machine_id.is_empty() {
            return Err(DriverError::MachineIdNotSet);
        }
        Ok(api.get_virtual_machine(&self.machine_id).await?)
    }

    /// Returns the cached API handle, connecting first when needed.
    async fn api(&mut self) -> Result<C::Api, DriverError> {
        if let Some(api) = &self.api {
            return Ok(api.clone());
        }
        self.config.validate()?;
        let api = self.connector.connect(&self.config.endpoint()).await?;
        self.api = Some(api.clone());
        Ok(api)
    }

    fn rescope(&mut self, url: &str) {
        self.api = None;
        url.clone_into(&mut self.config.url);
    }
}

#[cfg(test)]
mod tests;
