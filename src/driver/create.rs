//! Provisioning sequence for a new machine.

use tracing::{debug, info};

use crate::api::{Connector, RancherApi, VirtualMachineRequest};
use crate::cloud_init::render_user_data;
use crate::rancher::VirtualMachine;
use crate::ssh_key::{KeyGenerator, read_public_key};
use crate::state::VmStatus;

use super::{Driver, DriverError};

impl<C, K> Driver<C, K>
where
    C: Connector,
    K: KeyGenerator,
{
    /// Creates the machine and waits until it runs with an IP address.
    ///
    /// The SSH key pair is generated before any remote call, so a key
    /// failure leaves nothing behind in Rancher.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when key generation fails, Rancher rejects the
    /// request or a status poll fails, or
    /// [`DriverError::CreateTimeout`] when the deadline passes first.
    pub async fn create(&mut self) -> Result<(), DriverError> {
        let public_key = self.create_ssh_key()?;
        let user_data = render_user_data(&public_key)?;
        debug!(machine = %self.machine_name, "rendered cloud-init user data");

        let request = VirtualMachineRequest::builder()
            .name(self.machine_name.as_str())
            .image(self.config.os_image.as_str())
            .memory_mb(self.config.memory_mb)
            .vcpu(self.config.vcpu)
            .user_data(user_data)
            .build()?;

        let api = self.api().await?;
        info!(
            machine = %self.machine_name,
            image = %request.image_uuid,
            memory_mb = request.memory_mb,
            vcpu = request.vcpu,
            "creating virtual machine"
        );
        let created = api.create_virtual_machine(&request).await?;
        self.machine_id = created.id;

        self.wait_until_running(&api).await?;
        info!(machine = %self.machine_name, id = %self.machine_id, ip = %self.ip_address, "machine is running");
        Ok(())
    }

    fn create_ssh_key(&self) -> Result<String, DriverError> {
        let path = self.ssh_key_path();
        info!(path = %path, "creating SSH key");
        self.keygen.generate(&path)?;
        Ok(read_public_key(&path)?)
    }

    async fn wait_until_running(&mut self, api: &C::Api) -> Result<VirtualMachine, DriverError> {
        // A timeout too large to represent as an instant waits without a deadline.
        let deadline = self
            .config
            .create_timeout()
            .and_then(|timeout| self.clock.now().checked_add(timeout));

        loop {
            let machine = api.get_virtual_machine(&self.machine_id).await?;
            machine.primary_ip().clone_into(&mut self.ip_address);

            if machine.state == VmStatus::Running && !self.ip_address.is_empty() {
                return Ok(machine);
            }

            if deadline.is_some_and(|limit| self.clock.now() >= limit) {
                return Err(DriverError::CreateTimeout {
                    machine_id: self.machine_id.clone(),
                    state: machine.state.to_string(),
                });
            }

            info!(
                id = %self.machine_id,
                state = %machine.state,
                ip = %self.ip_address,
                "waiting for VM to become available"
            );
            self.clock.sleep(self.poll_interval).await;
        }
    }
}
