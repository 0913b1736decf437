//! Machine driver contract
//!
//! `MachineDriver` is the lifecycle interface a host-provisioning framework
//! drives. `Driver` implements it on top of KubeVirt.

#[cfg(test)]
pub mod fake;
mod kubevirt;
mod state;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{DriverOptions, Flag, MachineStore};
use crate::error::{DriverError, Result};

pub use self::kubevirt::{flag_name, Driver};
#[cfg(test)]
pub use self::kubevirt::DRIVER_NAME;
pub use state::{PrintableStatus, State};

/// Port the Docker daemon listens on inside machines
pub const DOCKER_PORT: u16 = 2376;

/// Lifecycle contract between the provisioning framework and a driver
#[async_trait]
pub trait MachineDriver: Send + Sync {
    /// Short name of the driver
    fn driver_name(&self) -> &'static str;

    /// Name of the machine this driver manages
    fn machine_name(&self) -> &str;

    /// Flags accepted at create time
    fn create_flags(&self) -> Vec<Flag>;

    /// Configure the driver from resolved flag values
    async fn set_config_from_flags(&mut self, opts: &dyn DriverOptions) -> Result<()>;

    /// Provision the machine
    async fn create(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Stop the machine without a grace period
    async fn kill(&self) -> Result<()>;

    async fn restart(&self) -> Result<()>;

    /// Delete the machine and everything created for it
    async fn remove(&self) -> Result<()>;

    async fn get_state(&self) -> Result<State>;

    async fn get_ip(&self) -> Result<String>;

    /// Docker endpoint, `tcp://<ip>:2376`
    async fn get_url(&self) -> Result<String>;

    async fn get_ssh_hostname(&self) -> Result<String>;

    fn get_ssh_username(&self) -> String;

    fn get_ssh_port(&self) -> u16;

    fn get_ssh_key_path(&self) -> PathBuf;
}

/// Fail unless the driver reports `State::Running`
pub async fn must_be_running<D: MachineDriver + ?Sized>(driver: &D) -> Result<()> {
    match driver.get_state().await? {
        State::Running => Ok(()),
        _ => Err(DriverError::NotRunning),
    }
}

/// Fields shared by every driver
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDriver {
    pub machine_name: String,
    pub store_path: PathBuf,
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

impl BaseDriver {
    pub fn new(machine_name: impl Into<String>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            machine_name: machine_name.into(),
            store_path: store_path.into(),
            ssh_user: default_ssh_user(),
            ssh_port: default_ssh_port(),
        }
    }

    /// Path of `file` inside the machine's directory
    pub fn resolve_store_path(&self, file: &str) -> PathBuf {
        MachineStore::new(&self.store_path)
            .machine_dir(&self.machine_name)
            .join(file)
    }

    pub fn ssh_key_path(&self) -> PathBuf {
        self.resolve_store_path("id_rsa")
    }
}

/// Join host and port, bracketing IPv6 literals
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
