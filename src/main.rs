//! kubevirt-machine - Docker hosts on KubeVirt
//!
//! Provisions Docker hosts as KubeVirt virtual machines and manages their
//! lifecycle. Each machine is a VirtualMachine booted from a container disk
//! image, reachable over SSH with a key generated at create time.
//!
//! ## Usage
//!
//! ```bash
//! # Create a machine in the "vms" namespace
//! kubevirt-machine create --kubevirt-namespace vms --kubevirt-memory 2048 worker-1
//!
//! # Check on it
//! kubevirt-machine status worker-1
//! kubevirt-machine url worker-1
//!
//! # Log in, then clean up
//! kubevirt-machine ssh worker-1
//! kubevirt-machine rm worker-1
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};

mod cli;
mod config;
mod driver;
mod error;
mod k8s;
mod kubevirt;
mod utils;

use cli::commands::{create_machine, load_driver, remove_machine};
use cli::{Args, Command, CreateArgs};
use config::env::EnvConfig;
use config::{ConfigFile, FlagValues, MachineRecord, MachineStore};
use driver::{Driver, MachineDriver, State};
use kubevirt::{exit_code, SshClient, SshConfig};
use utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        env.log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Info)
    };
    init_logger(level);

    let store = MachineStore::new(
        args.storage_path
            .clone()
            .unwrap_or_else(MachineStore::default_root),
    );
    debug!("Using machine store {}", store.root().display());

    match args.command {
        Command::Create(create_args) => create(&store, create_args).await?,
        Command::Start(m) => load_driver(&store, &m.name)?.start().await?,
        Command::Stop(m) => load_driver(&store, &m.name)?.stop().await?,
        Command::Kill(m) => load_driver(&store, &m.name)?.kill().await?,
        Command::Restart(m) => load_driver(&store, &m.name)?.restart().await?,
        Command::Rm { name, force } => {
            let driver = load_driver(&store, &name)?;
            remove_machine(&store, &driver, force).await?;
        }
        Command::Status(m) => {
            let state = load_driver(&store, &m.name)?.get_state().await?;
            println!("{state}");
        }
        Command::Ip(m) => println!("{}", load_driver(&store, &m.name)?.get_ip().await?),
        Command::Url(m) => println!("{}", load_driver(&store, &m.name)?.get_url().await?),
        Command::Ssh { name, command } => return ssh(&store, &name, &command).await,
        Command::Inspect(m) => {
            let record: MachineRecord<Driver> = store.load(&m.name)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Ls => list(&store).await?,
        Command::Flags => print_flags(&store),
    }

    Ok(ExitCode::SUCCESS)
}

async fn create(store: &MachineStore, args: CreateArgs) -> Result<()> {
    let driver = Driver::new(&args.name, store.root());
    let file = args.config.as_ref().map(ConfigFile::load).transpose()?;
    let values = FlagValues::resolve(driver.create_flags(), file.as_ref(), &args.overrides())?;
    create_machine(store, driver, &values).await
}

async fn ssh(store: &MachineStore, name: &str, command: &[String]) -> Result<ExitCode> {
    let driver = load_driver(store, name)?;
    let host = driver.get_ssh_hostname().await?;
    let client = SshClient::new(
        SshConfig::new(driver.get_ssh_username())
            .port(driver.get_ssh_port())
            .private_key(driver.get_ssh_key_path()),
    );

    let status = client.run(&host, command).await?;
    Ok(ExitCode::from(exit_code(status)))
}

async fn list(store: &MachineStore) -> Result<()> {
    println!("{:<24} {:<10} {}", "NAME", "STATE", "URL");
    for name in store.list()? {
        let driver = match load_driver(store, &name) {
            Ok(driver) => driver,
            Err(e) => {
                warn!("Skipping {name}: {e}");
                continue;
            }
        };

        let state = driver.get_state().await.unwrap_or(State::Error);
        let url = if state == State::Running {
            driver.get_url().await.unwrap_or_default()
        } else {
            String::new()
        };
        println!("{:<24} {:<10} {url}", driver.machine_name(), state.to_string());
    }
    Ok(())
}

fn print_flags(store: &MachineStore) {
    let driver = Driver::new("", PathBuf::from(store.root()));
    for flag in driver.create_flags() {
        print!("--{:<24} {} (default: {})", flag.name, flag.usage, flag.value);
        match flag.env_var {
            Some(ref var) => println!(" [${var}]"),
            None => println!(),
        }
    }
}
