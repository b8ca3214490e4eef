//! Binary entry point for the Rancher docker-machine driver.
//!
//! Each invocation performs one driver operation. Machine state is loaded
//! from and saved to the storage directory around the operation.

mod cli;

use std::env;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rancher_driver::config::{CREATE_FLAGS, FlagSpec, flags};
use rancher_driver::{
    Driver, DriverError, DriverOptions, MachineState, MachineStore, RancherConnector, SshKeygen,
    StoreError,
};

use cli::{Cli, Command, CreateCommand, CreateFlags};

type RancherDriver = Driver<RancherConnector, SshKeygen>;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("machine {0} already exists")]
    AlreadyExists(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let home = env::var("HOME").ok();
    let store = MachineStore::new(expand_home(&cli.storage_path, home.as_deref()));
    match cli.command {
        Command::Create(args) => create(&store, args).await,
        Command::State(args) => {
            let mut driver = load(&store, &args.name)?;
            let state = match driver.state().await {
                Ok(state) => state,
                Err(err) => {
                    print_line(MachineState::Error)?;
                    return Err(err.into());
                }
            };
            store.save(&driver.to_state())?;
            print_line(state)
        }
        Command::Ip(args) => print_line(load(&store, &args.name)?.ip()?),
        Command::Url(args) => {
            let mut driver = load(&store, &args.name)?;
            let url = driver.url().await?;
            store.save(&driver.to_state())?;
            print_line(url)
        }
        Command::Start(args) => Ok(load(&store, &args.name)?.start().await?),
        Command::Stop(args) => Ok(load(&store, &args.name)?.stop().await?),
        Command::Restart(args) => Ok(load(&store, &args.name)?.restart().await?),
        Command::Kill(args) => Ok(load(&store, &args.name)?.kill().await?),
        Command::Remove(args) => {
            load(&store, &args.name)?.remove().await?;
            Ok(store.remove(&args.name)?)
        }
        Command::Flags => print_flags(CREATE_FLAGS),
    }
}

async fn create(store: &MachineStore, args: CreateCommand) -> Result<(), CliError> {
    match store.load(&args.name) {
        Ok(_) => return Err(CliError::AlreadyExists(args.name)),
        Err(StoreError::NotFound { .. }) => {}
        Err(err) => return Err(err.into()),
    }

    let mut driver = RancherDriver::new(
        args.name.as_str(),
        store.root(),
        RancherConnector,
        SshKeygen::default(),
    );
    driver.set_config_from_flags(&driver_options(&args.flags))?;
    driver.pre_create_check().await?;

    let created = driver.create().await;
    if !driver.machine_id().is_empty() {
        store.save(&driver.to_state())?;
    }
    if let Err(err) = created {
        if !driver.machine_id().is_empty() {
            warn!(
                machine = %args.name,
                "machine was created but is not ready; remove it with `rm --name {}`",
                args.name
            );
        }
        return Err(err.into());
    }

    print_line(format!(
        "Machine {} is running at {}",
        args.name,
        driver.ip()?
    ))
}

fn load(store: &MachineStore, name: &str) -> Result<RancherDriver, CliError> {
    let state = store.load(name)?;
    Ok(Driver::from_state(
        state,
        store.root(),
        RancherConnector,
        SshKeygen::default(),
    ))
}

fn driver_options(args: &CreateFlags) -> DriverOptions {
    let strings = [
        (flags::URL, &args.url),
        (flags::ACCESS_KEY, &args.access_key),
        (flags::SECRET_KEY, &args.secret_key),
        (flags::PROJECT_NAME, &args.project_name),
        (flags::PROJECT_ID, &args.project_id),
        (flags::OS_IMAGE, &args.os_image),
        (flags::OS_USER, &args.os_user),
    ];
    let ints = [
        (flags::MEMORY_MB, args.memory_mb),
        (flags::VCPU, args.vcpu),
        (flags::CREATE_TIMEOUT, args.create_timeout),
    ];

    let with_strings = strings
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|text| (name, text)))
        .fold(DriverOptions::new(), |options, (name, text)| {
            options.with_string(name, text.as_str())
        });
    ints.into_iter()
        .filter_map(|(name, value)| value.map(|number| (name, number)))
        .fold(with_strings, |options, (name, number)| {
            options.with_int(name, number)
        })
}

fn expand_home(raw: &str, home: Option<&str>) -> Utf8PathBuf {
    match (raw.strip_prefix('~'), home) {
        (Some(rest), Some(home_dir)) if rest.is_empty() || rest.starts_with('/') => {
            Utf8PathBuf::from(format!("{home_dir}{rest}"))
        }
        _ => Utf8PathBuf::from(raw),
    }
}

fn print_flags(table: &[FlagSpec]) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    for flag in table {
        writeln!(
            stdout,
            "--{}\t{}\t{}\t{}",
            flag.name,
            flag.env_var,
            flag.default.unwrap_or("-"),
            flag.usage
        )?;
    }
    Ok(())
}

fn print_line(value: impl std::fmt::Display) -> Result<(), CliError> {
    writeln!(io::stdout(), "{value}")?;
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
