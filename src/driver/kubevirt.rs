//! KubeVirt machine driver
//!
//! Each machine is a KubeVirt VirtualMachine named after the machine, plus a
//! `<name>-ssh` Secret holding the public key the guest agent installs for
//! `root`.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{join_host_port, must_be_running, BaseDriver, MachineDriver, PrintableStatus, State, DOCKER_PORT};
use crate::config::{DriverOptions, Flag};
use crate::error::{is_not_found, DriverError, Result};
use crate::k8s::K8sClient;
use crate::kubevirt::{
    generate_ssh_key, make_ssh_secret, make_vm, public_key_path, ssh_secret_name, ClusterApi,
    KubevirtApi,
};

pub const DRIVER_NAME: &str = "kubevirt";

const DEFAULT_MEMORY_MB: i64 = 1024;
const DEFAULT_CPU_COUNT: i64 = 1;
const DEFAULT_IMAGE: &str = "linkacloud/d2vm-docker-machine:alpine";
const DEFAULT_NAMESPACE: &str = "default";
const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Full name of a driver flag
pub fn flag_name(name: &str) -> String {
    format!("{DRIVER_NAME}-{name}")
}

/// KubeVirt driver
#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    #[serde(flatten)]
    pub base: BaseDriver,
    /// Memory in MiB
    pub memory: i64,
    pub cpu: i64,
    pub namespace: String,
    pub image: String,
    /// Kubeconfig path, empty for the default location or in-cluster
    pub kubeconfig: String,
    #[serde(skip)]
    client: OnceCell<Arc<dyn KubevirtApi>>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("base", &self.base)
            .field("memory", &self.memory)
            .field("cpu", &self.cpu)
            .field("namespace", &self.namespace)
            .field("image", &self.image)
            .field("kubeconfig", &self.kubeconfig)
            .field("connected", &self.client.initialized())
            .finish()
    }
}

impl Driver {
    pub fn new(machine_name: impl Into<String>, store_path: impl Into<PathBuf>) -> Self {
        let base = BaseDriver::new(machine_name, store_path);
        debug!(
            "Creating new driver for host {} ({})",
            base.machine_name,
            base.store_path.display()
        );
        Self {
            base,
            ..Default::default()
        }
    }

    /// Use `api` instead of connecting to the configured cluster
    #[cfg(test)]
    pub fn with_api(mut self, api: Arc<dyn KubevirtApi>) -> Self {
        self.client = OnceCell::from(api);
        self
    }

    fn name(&self) -> &str {
        &self.base.machine_name
    }

    /// Cluster handle, connected on first use
    async fn client(&self) -> Result<&dyn KubevirtApi> {
        let api = self
            .client
            .get_or_try_init(|| async {
                let client = K8sClient::from_kubeconfig(&self.kubeconfig).await?;
                Ok::<Arc<dyn KubevirtApi>, DriverError>(Arc::new(ClusterApi::new(client)))
            })
            .await?;
        Ok(api.as_ref())
    }
}

fn memory_quantity(memory: i64) -> Result<Quantity> {
    if memory <= 0 {
        return Err(DriverError::InvalidMemory(format!("{memory}Mi")));
    }
    Ok(Quantity(format!("{memory}Mi")))
}

#[async_trait]
impl MachineDriver for Driver {
    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn machine_name(&self) -> &str {
        self.name()
    }

    fn create_flags(&self) -> Vec<Flag> {
        vec![
            Flag::int(flag_name("memory"), "Size of memory for host in MB", DEFAULT_MEMORY_MB),
            Flag::int(flag_name("cpu-count"), "Number of CPUs", DEFAULT_CPU_COUNT),
            Flag::string(
                flag_name("image"),
                "Container Disk Image to use for the VM, it should provide docker, sshd and qemu-guest-agent",
                DEFAULT_IMAGE,
            ),
            Flag::string(
                flag_name("namespace"),
                "Namespace to use for the VM, if not specified, the default namespace will be used",
                DEFAULT_NAMESPACE,
            ),
            Flag::string(
                flag_name("kubeconfig"),
                "Path to the Kubernetes config file, if not specified, the default config path or in-cluster config will be used",
                "",
            )
            .env(KUBECONFIG_ENV),
        ]
    }

    async fn set_config_from_flags(&mut self, opts: &dyn DriverOptions) -> Result<()> {
        self.memory = opts.int(&flag_name("memory"));
        self.cpu = opts.int(&flag_name("cpu-count"));
        self.image = opts.string(&flag_name("image"));
        self.namespace = opts.string(&flag_name("namespace"));
        self.kubeconfig = opts.string(&flag_name("kubeconfig"));
        debug!("Setting config from flags {:?}", self);

        if self.memory <= 0 {
            return Err(DriverError::InvalidConfig(format!(
                "{} must be positive, got {}",
                flag_name("memory"),
                self.memory
            )));
        }
        if self.cpu <= 0 || u32::try_from(self.cpu).is_err() {
            return Err(DriverError::InvalidConfig(format!(
                "{} must be a positive 32-bit integer, got {}",
                flag_name("cpu-count"),
                self.cpu
            )));
        }

        self.client().await?;
        Ok(())
    }

    async fn create(&self) -> Result<()> {
        debug!(
            "Checking if VM {} already exists in namespace {}",
            self.name(),
            self.namespace
        );
        let c = self.client().await?;
        match c.get_vm(&self.namespace, self.name()).await {
            Ok(_) => {
                return Err(DriverError::AlreadyExists {
                    name: self.name().to_string(),
                    namespace: self.namespace.clone(),
                })
            }
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(e.into()),
        }

        let key_path = self.get_ssh_key_path();
        generate_ssh_key(&key_path).await?;
        let public_key = tokio::fs::read_to_string(public_key_path(&key_path)).await?;

        let memory = memory_quantity(self.memory)?;
        let cpus = u32::try_from(self.cpu)
            .map_err(|_| DriverError::InvalidConfig(format!("invalid cpu count {}", self.cpu)))?;

        c.create_secret(
            &self.namespace,
            &make_ssh_secret(&self.namespace, self.name(), &public_key),
        )
        .await?;

        let vm = make_vm(&self.namespace, self.name(), &self.image, cpus, memory);
        info!("Creating VM {} in namespace {}", self.name(), self.namespace);
        if let Err(e) = c.create_vm(&self.namespace, &vm).await {
            if let Err(err) = c
                .delete_secret(&self.namespace, &ssh_secret_name(self.name()))
                .await
            {
                warn!("Failed to delete SSH secret: {}", err);
            }
            return Err(DriverError::CreateVm(e));
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        info!("Starting vm {} in namespace {}", self.name(), self.namespace);
        let c = self.client().await?;
        c.start_vm(&self.namespace, self.name()).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("Stopping vm {} in namespace {}", self.name(), self.namespace);
        let c = self.client().await?;
        c.stop_vm(&self.namespace, self.name(), Some(0)).await?;
        Ok(())
    }

    async fn kill(&self) -> Result<()> {
        info!("Killing vm {} in namespace {}", self.name(), self.namespace);
        let c = self.client().await?;
        c.stop_vm(&self.namespace, self.name(), Some(0)).await?;
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        info!("Restarting vm {} in namespace {}", self.name(), self.namespace);
        let c = self.client().await?;
        c.restart_vm(&self.namespace, self.name()).await?;
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        info!("Removing vm {} in namespace {}", self.name(), self.namespace);
        let c = self.client().await?;
        if self.get_state().await? == State::Running {
            self.kill().await?;
        }

        if let Err(e) = c.delete_vm(&self.namespace, self.name()).await {
            if !is_not_found(&e) {
                return Err(e.into());
            }
        }
        if let Err(e) = c
            .delete_secret(&self.namespace, &ssh_secret_name(self.name()))
            .await
        {
            if !is_not_found(&e) {
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn get_state(&self) -> Result<State> {
        debug!(
            "Getting state for VM {} in namespace {}",
            self.name(),
            self.namespace
        );
        let c = self.client().await?;
        let vm = match c.get_vm(&self.namespace, self.name()).await {
            Ok(vm) => vm,
            Err(e) if is_not_found(&e) => return Ok(State::None),
            Err(e) => return Err(DriverError::GetVm(e)),
        };

        let status = vm
            .status
            .and_then(|s| s.printable_status)
            .unwrap_or_default();
        Ok(PrintableStatus::parse(&status).state())
    }

    async fn get_ip(&self) -> Result<String> {
        self.get_ssh_hostname().await
    }

    async fn get_url(&self) -> Result<String> {
        let ip = self.get_ssh_hostname().await?;
        Ok(format!("tcp://{}", join_host_port(&ip, DOCKER_PORT)))
    }

    async fn get_ssh_hostname(&self) -> Result<String> {
        let c = self.client().await?;
        debug!(
            "Getting IP address for VM {} in namespace {}",
            self.name(),
            self.namespace
        );
        must_be_running(self).await?;

        let vmi = c.get_vmi(&self.namespace, self.name()).await?;
        let iface = vmi
            .interfaces()
            .first()
            .ok_or_else(|| DriverError::NoInterfaces(self.name().to_string()))?;
        iface
            .ip()
            .map(str::to_string)
            .ok_or_else(|| DriverError::NoAddress(self.name().to_string()))
    }

    fn get_ssh_username(&self) -> String {
        self.base.ssh_user.clone()
    }

    fn get_ssh_port(&self) -> u16 {
        self.base.ssh_port
    }

    fn get_ssh_key_path(&self) -> PathBuf {
        self.base.ssh_key_path()
    }
}
