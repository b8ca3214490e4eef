//! Test support utilities shared across unit and integration tests.
//!
//! The doubles here script Rancher responses and record every call so tests
//! can assert on exactly which remote operations a driver command issued.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

use crate::api::{
    ApiFuture, Connector, Endpoint, ProjectFilter, RancherApi, VirtualMachineRequest, VmAction,
};
use crate::driver::{Clock, SleepFuture};
use crate::rancher::{ApiError, Project, VirtualMachine};
use crate::ssh_key::{KeyError, KeyGenerator, ensure_parent_dir, public_key_path};
use crate::state::VmStatus;

/// Public key written by [`StaticKeyGenerator::default`].
pub const TEST_PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDriver test@rancher";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a project with a `self` link.
#[must_use]
pub fn project(id: &str, name: &str, self_link: &str) -> Project {
    let mut links = BTreeMap::new();
    links.insert(String::from("self"), self_link.to_owned());
    Project {
        id: id.to_owned(),
        name: name.to_owned(),
        state: String::from("active"),
        links,
    }
}

/// Builds a virtual machine snapshot with the given status and IP.
#[must_use]
pub fn machine(id: &str, state: &str, ip: Option<&str>) -> VirtualMachine {
    VirtualMachine {
        id: id.to_owned(),
        state: VmStatus::from(state),
        primary_ip_address: ip.map(str::to_owned),
        ..VirtualMachine::default()
    }
}

/// Remote call recorded by [`ScriptedRancher`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    /// `get_project(id)`.
    GetProject(String),
    /// `list_projects(filter)`.
    ListProjects(ProjectFilter),
    /// `create_virtual_machine(request)`.
    CreateVirtualMachine(VirtualMachineRequest),
    /// `get_virtual_machine(id)`.
    GetVirtualMachine(String),
    /// `virtual_machine_action(machine, action)`.
    Action {
        /// Machine id.
        id: String,
        /// Invoked action.
        action: VmAction,
    },
    /// `delete_virtual_machine(machine)`.
    Delete(String),
}

impl ApiCall {
    /// Returns whether the call changes remote state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateVirtualMachine(_) | Self::Action { .. } | Self::Delete(_)
        )
    }
}

/// Operation selector for injected failures.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Operation {
    /// `get_project`.
    GetProject,
    /// `list_projects`.
    ListProjects,
    /// `create_virtual_machine`.
    CreateVirtualMachine,
    /// `get_virtual_machine`.
    GetVirtualMachine,
    /// `virtual_machine_action`.
    Action,
    /// `delete_virtual_machine`.
    Delete,
}

#[derive(Debug, Default)]
struct RancherScript {
    projects: Vec<Project>,
    created: Option<VirtualMachine>,
    snapshots: VecDeque<VirtualMachine>,
    current: Option<VirtualMachine>,
    failures: BTreeMap<Operation, ApiError>,
    calls: Vec<ApiCall>,
}

impl RancherScript {
    fn take_failure(&mut self, operation: Operation) -> Result<(), ApiError> {
        self.failures.remove(&operation).map_or(Ok(()), Err)
    }

    fn next_snapshot(&mut self, id: &str) -> Result<VirtualMachine, ApiError> {
        if let Some(snapshot) = self.snapshots.pop_front() {
            self.current = Some(snapshot.clone());
            return Ok(snapshot);
        }
        self.current
            .clone()
            .filter(|current| current.id == id)
            .ok_or_else(|| ApiError::NotFound {
                operation: "get virtual machine",
                url: format!("scripted://virtualmachines/{id}"),
            })
    }
}

/// Scripted in-memory Rancher API.
///
/// Clones share state, so a test can keep one handle for assertions while the
/// driver owns another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRancher {
    script: Arc<Mutex<RancherScript>>,
}

impl ScriptedRancher {
    /// Creates an API with no projects or machines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a project visible to the credentials.
    #[must_use]
    pub fn with_project(self, project: Project) -> Self {
        lock(&self.script).projects.push(project);
        self
    }

    /// Sets the machine returned by `create_virtual_machine`.
    #[must_use]
    pub fn with_created(self, machine: VirtualMachine) -> Self {
        lock(&self.script).created = Some(machine);
        self
    }

    /// Queues a snapshot returned by the next `get_virtual_machine` call.
    ///
    /// Once the queue drains, the last snapshot keeps being returned.
    #[must_use]
    pub fn with_snapshot(self, machine: VirtualMachine) -> Self {
        self.push_snapshot(machine);
        self
    }

    /// Queues a snapshot on a shared handle.
    pub fn push_snapshot(&self, machine: VirtualMachine) {
        lock(&self.script).snapshots.push_back(machine);
    }

    /// Makes the next call to `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: ApiError) {
        lock(&self.script).failures.insert(operation, error);
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.script).calls.clone()
    }

    /// Returns the calls that change remote state.
    #[must_use]
    pub fn mutations(&self) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(ApiCall::is_mutation)
            .collect()
    }

    /// Returns the creation requests submitted so far.
    #[must_use]
    pub fn create_requests(&self) -> Vec<VirtualMachineRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::CreateVirtualMachine(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Returns how many times `get_virtual_machine` was called.
    #[must_use]
    pub fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ApiCall::GetVirtualMachine(_)))
            .count()
    }
}

impl RancherApi for ScriptedRancher {
    fn get_project<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Project> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script.calls.push(ApiCall::GetProject(id.to_owned()));
            script.take_failure(Operation::GetProject)?;
            script
                .projects
                .iter()
                .find(|candidate| candidate.id == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound {
                    operation: "get project",
                    url: format!("scripted://projects/{id}"),
                })
        })
    }

    fn list_projects<'a>(&'a self, filter: &'a ProjectFilter) -> ApiFuture<'a, Vec<Project>> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script.calls.push(ApiCall::ListProjects(filter.clone()));
            script.take_failure(Operation::ListProjects)?;
            let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);
            Ok(script
                .projects
                .iter()
                .filter(|candidate| filter.name.as_ref().is_none_or(|name| &candidate.name == name))
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn create_virtual_machine<'a>(
        &'a self,
        request: &'a VirtualMachineRequest,
    ) -> ApiFuture<'a, VirtualMachine> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script
                .calls
                .push(ApiCall::CreateVirtualMachine(request.clone()));
            script.take_failure(Operation::CreateVirtualMachine)?;
            let created = script
                .created
                .clone()
                .unwrap_or_else(|| machine("1i1", "creating", None));
            script.current = Some(created.clone());
            Ok(created)
        })
    }

    fn get_virtual_machine<'a>(&'a self, id: &'a str) -> ApiFuture<'a, VirtualMachine> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script.calls.push(ApiCall::GetVirtualMachine(id.to_owned()));
            script.take_failure(Operation::GetVirtualMachine)?;
            script.next_snapshot(id)
        })
    }

    fn virtual_machine_action<'a>(
        &'a self,
        target: &'a VirtualMachine,
        action: &'a VmAction,
    ) -> ApiFuture<'a, VirtualMachine> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script.calls.push(ApiCall::Action {
                id: target.id.clone(),
                action: action.clone(),
            });
            script.take_failure(Operation::Action)?;
            Ok(target.clone())
        })
    }

    fn delete_virtual_machine<'a>(&'a self, target: &'a VirtualMachine) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script.calls.push(ApiCall::Delete(target.id.clone()));
            script.take_failure(Operation::Delete)?;
            script.current = None;
            Ok(())
        })
    }
}

/// Connector handing out a shared [`ScriptedRancher`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedConnector {
    rancher: ScriptedRancher,
    endpoints: Arc<Mutex<Vec<Endpoint>>>,
    failure: Arc<Mutex<Option<ApiError>>>,
}

impl ScriptedConnector {
    /// Connects every request to `rancher`.
    #[must_use]
    pub fn new(rancher: ScriptedRancher) -> Self {
        Self {
            rancher,
            ..Self::default()
        }
    }

    /// Makes the next connection attempt fail with `error`.
    pub fn fail_next(&self, error: ApiError) {
        *lock(&self.failure) = Some(error);
    }

    /// Returns the URLs connected to so far, in order.
    #[must_use]
    pub fn connected_urls(&self) -> Vec<String> {
        lock(&self.endpoints)
            .iter()
            .map(|endpoint| endpoint.url.clone())
            .collect()
    }
}

impl Connector for ScriptedConnector {
    type Api = ScriptedRancher;

    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> ApiFuture<'a, Self::Api> {
        Box::pin(async move {
            lock(&self.endpoints).push(endpoint.clone());
            if let Some(error) = lock(&self.failure).take() {
                return Err(error);
            }
            Ok(self.rancher.clone())
        })
    }
}

/// Key generator that writes a fixed key pair instead of running
/// `ssh-keygen`.
#[derive(Clone, Debug)]
pub struct StaticKeyGenerator {
    public_key: String,
    failure: Option<KeyError>,
    generated: Arc<Mutex<Vec<Utf8PathBuf>>>,
}

impl StaticKeyGenerator {
    /// Writes `public_key` as the public half.
    #[must_use]
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            failure: None,
            generated: Arc::default(),
        }
    }

    /// Fails every generation with `error`.
    #[must_use]
    pub fn failing(error: KeyError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Returns the private key paths generated so far.
    #[must_use]
    pub fn generated(&self) -> Vec<Utf8PathBuf> {
        lock(&self.generated).clone()
    }
}

impl Default for StaticKeyGenerator {
    fn default() -> Self {
        Self::new(TEST_PUBLIC_KEY)
    }
}

impl KeyGenerator for StaticKeyGenerator {
    fn generate(&self, private_key_path: &Utf8Path) -> Result<(), KeyError> {
        lock(&self.generated).push(private_key_path.to_path_buf());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        ensure_parent_dir(private_key_path)?;
        write_file(private_key_path, "PRIVATE KEY\n")?;
        write_file(&public_key_path(private_key_path), &format!("{}\n", self.public_key))
    }
}

fn write_file(path: &Utf8Path, contents: &str) -> Result<(), KeyError> {
    let invalid = || KeyError::InvalidPath {
        path: path.to_path_buf(),
    };
    let parent = path.parent().ok_or_else(invalid)?;
    let file_name = path.file_name().ok_or_else(invalid)?;
    Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.write(file_name, contents))
        .map_err(|err| KeyError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

/// Clock that advances only when slept on.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Starts the clock at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Returns every requested sleep, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }

    /// Returns the total time slept.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *lock(&self.now)
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        lock(&self.sleeps).push(duration);
        let mut now = lock(&self.now);
        *now += duration;
        Box::pin(std::future::ready(()))
    }
}
