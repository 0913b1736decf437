//! CLI argument parsing
//!
//! Defines command-line interface using clap.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::driver::flag_name;

/// Provision Docker hosts as KubeVirt virtual machines
#[derive(Parser, Debug)]
#[command(name = "kubevirt-machine")]
#[command(version)]
#[command(about = "Create and manage Docker hosts running as KubeVirt virtual machines")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding machine state (default: ~/.kubevirt-machine)
    #[arg(short, long, global = true)]
    pub storage_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a machine
    Create(CreateArgs),

    /// Start a machine
    Start(MachineArgs),

    /// Stop a machine
    Stop(MachineArgs),

    /// Stop a machine immediately
    Kill(MachineArgs),

    /// Restart a machine
    Restart(MachineArgs),

    /// Remove a machine
    Rm {
        /// Machine name
        name: String,

        /// Remove local state even if the cluster objects cannot be deleted
        #[arg(short, long)]
        force: bool,
    },

    /// Print the state of a machine
    Status(MachineArgs),

    /// Print the IP address of a machine
    Ip(MachineArgs),

    /// Print the Docker URL of a machine
    Url(MachineArgs),

    /// Log into or run a command on a machine with SSH
    Ssh {
        /// Machine name
        name: String,

        /// Command to run, an interactive shell when omitted
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print the stored configuration of a machine
    Inspect(MachineArgs),

    /// List machines
    Ls,

    /// List the driver's create flags
    Flags,
}

/// A single machine
#[derive(Parser, Debug)]
pub struct MachineArgs {
    /// Machine name
    pub name: String,
}

/// Arguments for create command
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Machine name
    pub name: String,

    /// Size of memory for host in MB
    #[arg(long = "kubevirt-memory")]
    pub memory: Option<i64>,

    /// Number of CPUs
    #[arg(long = "kubevirt-cpu-count")]
    pub cpu_count: Option<i64>,

    /// Container disk image providing docker, sshd and qemu-guest-agent
    #[arg(long = "kubevirt-image")]
    pub image: Option<String>,

    /// Namespace for the VM
    #[arg(long = "kubevirt-namespace")]
    pub namespace: Option<String>,

    /// Path to the Kubernetes config file (env: KUBECONFIG)
    #[arg(long = "kubevirt-kubeconfig")]
    pub kubeconfig: Option<String>,

    /// YAML or JSON file with flag defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl CreateArgs {
    /// Flags given explicitly on the command line, keyed by flag name
    pub fn overrides(&self) -> Vec<(String, String)> {
        let mut values = Vec::new();
        if let Some(memory) = self.memory {
            values.push((flag_name("memory"), memory.to_string()));
        }
        if let Some(cpu) = self.cpu_count {
            values.push((flag_name("cpu-count"), cpu.to_string()));
        }
        if let Some(ref image) = self.image {
            values.push((flag_name("image"), image.clone()));
        }
        if let Some(ref namespace) = self.namespace {
            values.push((flag_name("namespace"), namespace.clone()));
        }
        if let Some(ref kubeconfig) = self.kubeconfig {
            values.push((flag_name("kubeconfig"), kubeconfig.clone()));
        }
        values
    }
}
