//! HTTP client for the Rancher v1 API.
//!
//! Requests authenticate with the access/secret key pair as HTTP basic auth.
//! Resource URLs are taken from the links and actions Rancher embeds in each
//! response, falling back to the conventional collection layout when absent.

mod error;
mod types;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    ApiFuture, Connector, Endpoint, ProjectFilter, RancherApi, VirtualMachineRequest, VmAction,
};

pub use error::ApiError;
pub(crate) use types::Collection;
pub use types::{Project, VirtualMachine};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PROJECTS: &str = "projects";
const VIRTUAL_MACHINES: &str = "virtualmachines";

/// Connected Rancher API handle.
#[derive(Clone, Debug)]
pub struct RancherClient {
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl RancherClient {
    /// Builds a client and checks that the API answers at `endpoint.url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the HTTP client cannot be built, the API is
    /// unreachable, or it rejects the credentials.
    pub async fn connect(endpoint: Endpoint) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| transport("connect", &err))?;
        let client = Self { http, endpoint };
        debug!(url = %client.endpoint.url, "connecting to Rancher API");
        let response = client
            .request(Method::GET, &client.endpoint.url)
            .send()
            .await
            .map_err(|err| transport("connect", &err))?;
        Self::check(response, "connect").await?;
        Ok(client)
    }

    /// Returns the endpoint the client is bound to.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn collection_url(&self, collection: &str) -> String {
        format!("{}/{collection}", self.endpoint.url.trim_end_matches('/'))
    }

    pub(crate) fn resource_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{id}", self.collection_url(collection))
    }

    pub(crate) fn action_url(&self, machine: &VirtualMachine, action: &VmAction) -> String {
        machine.action_link(action.name()).map_or_else(
            || {
                format!(
                    "{}?action={}",
                    self.resource_url(VIRTUAL_MACHINES, &machine.id),
                    action.name()
                )
            },
            str::to_owned,
        )
    }

    pub(crate) fn machine_url(&self, machine: &VirtualMachine) -> String {
        machine.self_link().map_or_else(
            || self.resource_url(VIRTUAL_MACHINES, &machine.id),
            str::to_owned,
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.endpoint.access_key, Some(&self.endpoint.secret_key))
            .header(header::ACCEPT, "application/json")
    }

    async fn check(response: Response, operation: &'static str) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                operation,
                url: response.url().to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| transport(operation, &err))?;
        let parsed: types::ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = match parsed.message {
            Some(message) if !message.trim().is_empty() => message,
            _ if !body.trim().is_empty() => body,
            _ => status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_owned(),
        };
        Err(ApiError::Api {
            operation,
            status: status.as_u16(),
            code: parsed.code,
            message,
        })
    }

    async fn send<T: DeserializeOwned>(
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<T, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|err| transport(operation, &err))?;
        let body = Self::check(response, operation)
            .await?
            .bytes()
            .await
            .map_err(|err| transport(operation, &err))?;
        serde_json::from_slice(&body).map_err(|err| ApiError::Decode {
            operation,
            message: err.to_string(),
        })
    }
}

fn transport(operation: &'static str, err: &reqwest::Error) -> ApiError {
    ApiError::Transport {
        operation,
        message: err.to_string(),
    }
}

impl RancherApi for RancherClient {
    fn get_project<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Project> {
        Box::pin(async move {
            let url = self.resource_url(PROJECTS, id);
            Self::send(self.request(Method::GET, &url), "get project").await
        })
    }

    fn list_projects<'a>(&'a self, filter: &'a ProjectFilter) -> ApiFuture<'a, Vec<Project>> {
        Box::pin(async move {
            let url = self.collection_url(PROJECTS);
            let builder = self.request(Method::GET, &url).query(&filter.query());
            let collection: Collection<Project> = Self::send(builder, "list projects").await?;
            Ok(collection.data)
        })
    }

    fn create_virtual_machine<'a>(
        &'a self,
        request: &'a VirtualMachineRequest,
    ) -> ApiFuture<'a, VirtualMachine> {
        Box::pin(async move {
            let url = self.collection_url(VIRTUAL_MACHINES);
            let builder = self.request(Method::POST, &url).json(request);
            Self::send(builder, "create virtual machine").await
        })
    }

    fn get_virtual_machine<'a>(&'a self, id: &'a str) -> ApiFuture<'a, VirtualMachine> {
        Box::pin(async move {
            let url = self.resource_url(VIRTUAL_MACHINES, id);
            Self::send(self.request(Method::GET, &url), "get virtual machine").await
        })
    }

    fn virtual_machine_action<'a>(
        &'a self,
        machine: &'a VirtualMachine,
        action: &'a VmAction,
    ) -> ApiFuture<'a, VirtualMachine> {
        Box::pin(async move {
            let url = self.action_url(machine, action);
            let builder = self.request(Method::POST, &url);
            let with_payload = match action {
                VmAction::Stop(payload) => builder.json(payload),
                VmAction::Start | VmAction::Restart => builder,
            };
            Self::send(with_payload, "virtual machine action").await
        })
    }

    fn delete_virtual_machine<'a>(&'a self, machine: &'a VirtualMachine) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.machine_url(machine);
            let response = self
                .request(Method::DELETE, &url)
                .send()
                .await
                .map_err(|err| transport("delete virtual machine", &err))?;
            Self::check(response, "delete virtual machine").await?;
            Ok(())
        })
    }
}

/// Connector producing [`RancherClient`] handles.
#[derive(Clone, Copy, Debug, Default)]
pub struct RancherConnector;

impl Connector for RancherConnector {
    type Api = RancherClient;

    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> ApiFuture<'a, Self::Api> {
        Box::pin(RancherClient::connect(endpoint.clone()))
    }
}
