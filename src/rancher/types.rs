//! Rancher resource shapes consumed by the driver.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::VmStatus;

/// Collection envelope returned by list endpoints.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub(crate) data: Vec<T>,
}

/// A Rancher environment (project).
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Project {
    /// Opaque project id.
    pub id: String,
    /// Human readable name.
    #[serde(default)]
    pub name: String,
    /// Lifecycle state reported by Rancher.
    #[serde(default)]
    pub state: String,
    /// Resource links; `self` is the project-scoped API URL.
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

impl Project {
    /// Returns the project's self link.
    #[must_use]
    pub fn self_link(&self) -> Option<&str> {
        self.links
            .get("self")
            .map(String::as_str)
            .filter(|link| !link.is_empty())
    }
}

/// A Rancher virtual machine.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    /// Opaque machine id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Status parsed from Rancher's `state` field.
    #[serde(default)]
    pub state: VmStatus,
    /// Primary IP address, absent until one is assigned.
    #[serde(default)]
    pub primary_ip_address: Option<String>,
    /// Resource links.
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    /// Actions currently available, keyed by name.
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
}

impl VirtualMachine {
    /// Returns the primary IP address, or an empty string when unassigned.
    #[must_use]
    pub fn primary_ip(&self) -> &str {
        self.primary_ip_address.as_deref().unwrap_or_default()
    }

    /// Returns the URL Rancher advertises for `action`, if any.
    #[must_use]
    pub fn action_link(&self, action: &str) -> Option<&str> {
        self.actions.get(action).map(String::as_str)
    }

    /// Returns the machine's self link, if any.
    #[must_use]
    pub fn self_link(&self) -> Option<&str> {
        self.links.get("self").map(String::as_str)
    }
}

/// Error body returned by the Rancher API.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) code: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MachineState;

    const MACHINE_JSON: &str = r#"{
        "id": "1i42",
        "type": "virtualMachine",
        "name": "node-1",
        "state": "running",
        "primaryIpAddress": "10.42.0.9",
        "links": {"self": "https://rancher.example/v1/projects/1a5/virtualmachines/1i42"},
        "actions": {"stop": "https://rancher.example/v1/projects/1a5/virtualmachines/1i42/?action=stop"}
    }"#;

    #[test]
    fn virtual_machine_decodes_status_at_the_boundary() {
        let machine: VirtualMachine = serde_json::from_str(MACHINE_JSON)
            .unwrap_or_else(|err| panic!("machine should decode: {err}"));
        assert_eq!(machine.state, VmStatus::Running);
        assert_eq!(machine.state.machine_state(), MachineState::Running);
        assert_eq!(machine.primary_ip(), "10.42.0.9");
        assert!(machine.action_link("stop").is_some());
        assert!(machine.action_link("start").is_none());
    }

    #[test]
    fn missing_ip_and_state_decode_as_empty() {
        let machine: VirtualMachine = serde_json::from_str(r#"{"id": "1i1", "primaryIpAddress": null}"#)
            .unwrap_or_else(|err| panic!("machine should decode: {err}"));
        assert_eq!(machine.primary_ip(), "");
        assert_eq!(machine.state, VmStatus::Missing);
    }

    #[test]
    fn project_collection_decodes_self_links() {
        let collection: Collection<Project> = serde_json::from_str(
            r#"{"type": "collection", "data": [
                {"id": "1a5", "name": "Default", "state": "active",
                 "links": {"self": "https://rancher.example/v1/projects/1a5"}}
            ]}"#,
        )
        .unwrap_or_else(|err| panic!("collection should decode: {err}"));
        let project = collection
            .data
            .first()
            .unwrap_or_else(|| panic!("collection should hold one project"));
        assert_eq!(
            project.self_link(),
            Some("https://rancher.example/v1/projects/1a5")
        );
    }
}
