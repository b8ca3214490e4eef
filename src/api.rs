//! Capability interface over the Rancher API.
//!
//! The driver only needs a handful of remote operations. They are collected in
//! [`RancherApi`] so the lifecycle can run against the HTTP client in
//! production and against scripted doubles in tests. A [`Connector`] builds a
//! connected handle for an [`Endpoint`], failing loudly instead of yielding an
//! unusable handle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

use crate::rancher::{ApiError, Project, VirtualMachine};

/// Future returned by API operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Base URL and key pair used to reach a Rancher API.
#[derive(Clone, Eq, PartialEq)]
pub struct Endpoint {
    /// API base URL, global or project scoped.
    pub url: String,
    /// Access key, sent as the basic-auth user.
    pub access_key: String,
    /// Secret key, sent as the basic-auth password.
    pub secret_key: String,
}

impl Endpoint {
    /// Creates an endpoint from its parts.
    #[must_use]
    pub fn new(url: &str, access_key: &str, secret_key: &str) -> Self {
        Self {
            url: url.to_owned(),
            access_key: access_key.to_owned(),
            secret_key: secret_key.to_owned(),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Filter applied when listing projects.
///
/// Removed projects are always excluded and at most `limit` entries are
/// requested.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectFilter {
    /// Exact project name to match, if any.
    pub name: Option<String>,
    /// Maximum number of projects to return.
    pub limit: u32,
}

impl ProjectFilter {
    /// Lists every non-removed project, up to `limit`.
    #[must_use]
    pub const fn all(limit: u32) -> Self {
        Self { name: None, limit }
    }

    /// Lists non-removed projects named exactly `name`, up to `limit`.
    #[must_use]
    pub fn named(name: impl Into<String>, limit: u32) -> Self {
        Self {
            name: Some(name.into()),
            limit,
        }
    }

    /// Renders the filter as Rancher collection query parameters.
    #[must_use]
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::with_capacity(3);
        if let Some(name) = &self.name {
            query.push(("name", name.clone()));
        }
        query.push(("state_ne", String::from("removed")));
        query.push(("limit", self.limit.to_string()));
        query
    }
}

/// Payload of the `stop` action. Rancher accepts an empty object.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct InstanceStop {
    /// Remove the instance once stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove: Option<bool>,
    /// Seconds to wait before forcing the stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Actions the driver invokes on a virtual machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VmAction {
    /// Power the machine on.
    Start,
    /// Power the machine off.
    Stop(InstanceStop),
    /// Reboot the machine.
    Restart,
}

impl VmAction {
    /// Returns the Rancher action name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop(_) => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for VmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Creation request for a virtual machine, in Rancher's wire shape.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineRequest {
    /// Display name, the local machine name.
    pub name: String,
    /// Image reference including the `docker:` scheme.
    pub image_uuid: String,
    /// Memory in MiB.
    pub memory_mb: u32,
    /// Virtual CPU count.
    pub vcpu: u32,
    /// Cloud-init user data consumed on first boot.
    #[serde(rename = "userdata")]
    pub user_data: String,
}

impl VirtualMachineRequest {
    /// Starts a builder for a [`VirtualMachineRequest`].
    #[must_use]
    pub fn builder() -> VirtualMachineRequestBuilder {
        VirtualMachineRequestBuilder::new()
    }

    /// Validates the request, naming the first missing field.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when the name, image or user data
    /// is empty, or a size is zero.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.name.is_empty() {
            return Err(RequestError::Validation(String::from("name")));
        }
        if self.image_uuid.is_empty() {
            return Err(RequestError::Validation(String::from("image_uuid")));
        }
        if self.memory_mb == 0 {
            return Err(RequestError::Validation(String::from("memory_mb")));
        }
        if self.vcpu == 0 {
            return Err(RequestError::Validation(String::from("vcpu")));
        }
        if self.user_data.trim().is_empty() {
            return Err(RequestError::Validation(String::from("user_data")));
        }
        Ok(())
    }
}

/// Builder for [`VirtualMachineRequest`] that trims and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VirtualMachineRequestBuilder {
    name: String,
    image: String,
    memory_mb: u32,
    vcpu: u32,
    user_data: String,
}

impl VirtualMachineRequestBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the display name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the OS image without the `docker:` scheme.
    #[must_use]
    pub fn image(mut self, value: impl Into<String>) -> Self {
        self.image = value.into();
        self
    }

    /// Sets the memory size in MiB.
    #[must_use]
    pub const fn memory_mb(mut self, value: u32) -> Self {
        self.memory_mb = value;
        self
    }

    /// Sets the virtual CPU count.
    #[must_use]
    pub const fn vcpu(mut self, value: u32) -> Self {
        self.vcpu = value;
        self
    }

    /// Sets the cloud-init user data.
    #[must_use]
    pub fn user_data(mut self, value: impl Into<String>) -> Self {
        self.user_data = value.into();
        self
    }

    /// Builds and validates the request, prefixing the image with `docker:`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when a required field is empty.
    pub fn build(self) -> Result<VirtualMachineRequest, RequestError> {
        let image = self.image.trim();
        let request = VirtualMachineRequest {
            name: self.name.trim().to_owned(),
            image_uuid: if image.is_empty() {
                String::new()
            } else {
                format!("docker:{image}")
            },
            memory_mb: self.memory_mb,
            vcpu: self.vcpu,
            user_data: self.user_data,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Errors raised while building API requests.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Remote operations used by the driver.
pub trait RancherApi {
    /// Fetches a project by id.
    fn get_project<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Project>;

    /// Lists projects matching `filter`.
    fn list_projects<'a>(&'a self, filter: &'a ProjectFilter) -> ApiFuture<'a, Vec<Project>>;

    /// Submits a virtual machine creation request.
    fn create_virtual_machine<'a>(
        &'a self,
        request: &'a VirtualMachineRequest,
    ) -> ApiFuture<'a, VirtualMachine>;

    /// Fetches a virtual machine by id.
    fn get_virtual_machine<'a>(&'a self, id: &'a str) -> ApiFuture<'a, VirtualMachine>;

    /// Invokes `action` on `machine`.
    fn virtual_machine_action<'a>(
        &'a self,
        machine: &'a VirtualMachine,
        action: &'a VmAction,
    ) -> ApiFuture<'a, VirtualMachine>;

    /// Deletes `machine`.
    fn delete_virtual_machine<'a>(&'a self, machine: &'a VirtualMachine) -> ApiFuture<'a, ()>;
}

/// Builds connected [`RancherApi`] handles.
pub trait Connector {
    /// Handle produced by a successful connection.
    type Api: RancherApi + Clone;

    /// Connects to `endpoint`, failing when the API cannot be reached.
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> ApiFuture<'a, Self::Api>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_filter_renders_name_state_and_limit() {
        let query = ProjectFilter::named("prod", 2).query();
        assert_eq!(
            query,
            vec![
                ("name", String::from("prod")),
                ("state_ne", String::from("removed")),
                ("limit", String::from("2")),
            ]
        );
    }

    #[test]
    fn unfiltered_query_omits_name() {
        let query = ProjectFilter::all(2).query();
        assert!(query.iter().all(|(key, _)| *key != "name"));
    }

    #[test]
    fn builder_prefixes_image_with_docker_scheme() {
        let request = VirtualMachineRequest::builder()
            .name("  node-1 ")
            .image("rancher/vm-ubuntu")
            .memory_mb(2048)
            .vcpu(4)
            .user_data("#cloud-config\n")
            .build()
            .unwrap_or_else(|err| panic!("request should build: {err}"));
        assert_eq!(request.name, "node-1");
        assert_eq!(request.image_uuid, "docker:rancher/vm-ubuntu");
    }

    #[test]
    fn builder_rejects_blank_image() {
        let error = VirtualMachineRequest::builder()
            .name("node-1")
            .image("   ")
            .memory_mb(1)
            .vcpu(1)
            .user_data("#cloud-config\n")
            .build()
            .expect_err("blank image should fail");
        assert_eq!(error, RequestError::Validation(String::from("image_uuid")));
    }

    #[test]
    fn request_serialises_in_rancher_shape() {
        let request = VirtualMachineRequest {
            name: String::from("node-1"),
            image_uuid: String::from("docker:rancher/vm-ubuntu"),
            memory_mb: 1024,
            vcpu: 2,
            user_data: String::from("#cloud-config\n"),
        };
        let value = serde_json::to_value(&request)
            .unwrap_or_else(|err| panic!("request should serialise: {err}"));
        assert_eq!(
            value,
            serde_json::json!({
                "name": "node-1",
                "imageUuid": "docker:rancher/vm-ubuntu",
                "memoryMb": 1024,
                "vcpu": 2,
                "userdata": "#cloud-config\n",
            })
        );
    }

    #[test]
    fn stop_payload_is_an_empty_object() {
        let value = serde_json::to_value(InstanceStop::default())
            .unwrap_or_else(|err| panic!("payload should serialise: {err}"));
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn endpoint_debug_redacts_secret() {
        let endpoint = Endpoint::new("https://rancher.example/v1", "AK", "SK");
        let rendered = format!("{endpoint:?}");
        assert!(!rendered.contains("\"SK\""), "secret leaked: {rendered}");
        assert!(rendered.contains("<redacted>"));
    }
}
