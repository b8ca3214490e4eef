//! Command-line interface definitions for the `docker-machine-driver-rancher`
//! binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the driver binary.
#[derive(Debug, Parser)]
#[command(
    name = "docker-machine-driver-rancher",
    about = "Provision and manage docker-machine hosts as Rancher virtual machines",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Directory holding machine state and SSH keys.
    #[arg(
        long,
        short = 's',
        env = "MACHINE_STORAGE_PATH",
        default_value = "~/.docker/machine",
        value_name = "DIR",
        global = true
    )]
    pub(crate) storage_path: String,
    /// Driver operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Driver operations.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Select the environment, create the VM and wait until it runs.
    #[command(name = "create")]
    Create(CreateCommand),
    /// Print the machine state.
    #[command(name = "state")]
    State(MachineArgs),
    /// Print the machine IP address.
    #[command(name = "ip")]
    Ip(MachineArgs),
    /// Print the Docker endpoint of a running machine.
    #[command(name = "url")]
    Url(MachineArgs),
    /// Power the machine on.
    #[command(name = "start")]
    Start(MachineArgs),
    /// Power the machine off.
    #[command(name = "stop")]
    Stop(MachineArgs),
    /// Reboot the machine.
    #[command(name = "restart")]
    Restart(MachineArgs),
    /// Stop the machine; Rancher has no forceful variant.
    #[command(name = "kill")]
    Kill(MachineArgs),
    /// Delete the machine and its local state.
    #[command(name = "rm")]
    Remove(MachineArgs),
    /// Print the create flags with their environment variables and defaults.
    #[command(name = "flags")]
    Flags,
}

/// Selects an existing machine.
#[derive(Debug, Args)]
pub(crate) struct MachineArgs {
    /// Local machine name.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: String,
}

/// Arguments for the `create` subcommand.
#[derive(Debug, Args)]
pub(crate) struct CreateCommand {
    /// Local machine name, also used as the VM name in Rancher.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: String,
    /// Rancher connection and sizing options.
    #[command(flatten)]
    pub(crate) flags: CreateFlags,
}

/// Options surfaced to the host's create command.
///
/// Defaults are applied by the driver, not here, so an unset flag stays
/// distinguishable from an explicit value.
#[derive(Debug, Default, Args)]
pub(crate) struct CreateFlags {
    /// Rancher API URL.
    #[arg(long = "rancher-url", env = "RANCHER_URL", value_name = "URL")]
    pub(crate) url: Option<String>,
    /// Rancher API access key.
    #[arg(
        long = "rancher-access-key",
        env = "RANCHER_ACCESS_KEY",
        value_name = "KEY"
    )]
    pub(crate) access_key: Option<String>,
    /// Rancher API secret key.
    #[arg(
        long = "rancher-secret-key",
        env = "RANCHER_SECRET_KEY",
        value_name = "KEY",
        hide_env_values = true
    )]
    pub(crate) secret_key: Option<String>,
    /// Environment name to create the VM in.
    #[arg(
        long = "rancher-project-name",
        env = "RANCHER_ENVIRONMENT_NAME",
        value_name = "NAME"
    )]
    pub(crate) project_name: Option<String>,
    /// Environment id to create the VM in; takes precedence over the name.
    #[arg(
        long = "rancher-project-id",
        env = "RANCHER_ENVIRONMENT_ID",
        value_name = "ID"
    )]
    pub(crate) project_id: Option<String>,
    /// OS image [default: rancher/vm-ubuntu].
    #[arg(long = "rancher-os-image", env = "RANCHER_OS_IMAGE", value_name = "IMAGE")]
    pub(crate) os_image: Option<String>,
    /// SSH user of the OS image [default: ubuntu].
    #[arg(long = "rancher-os-user", env = "RANCHER_OS_USER", value_name = "USER")]
    pub(crate) os_user: Option<String>,
    /// Memory in MiB [default: 1024].
    #[arg(long = "rancher-memory-mb", env = "RANCHER_MEMORY_MB", value_name = "MB")]
    pub(crate) memory_mb: Option<i64>,
    /// Virtual CPU count [default: 2].
    #[arg(long = "rancher-vcpu", env = "RANCHER_VCPU", value_name = "COUNT")]
    pub(crate) vcpu: Option<i64>,
    /// Seconds to wait for the VM to come up [default: 600].
    #[arg(
        long = "rancher-create-timeout",
        env = "RANCHER_CREATE_TIMEOUT",
        value_name = "SECONDS"
    )]
    pub(crate) create_timeout: Option<i64>,
}
