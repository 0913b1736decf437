//! Cluster operations used by the driver
//!
//! `KubevirtApi` is the seam between the driver and the cluster. The
//! production implementation talks to the API server through kube; tests
//! substitute an in-memory fake.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;

use super::secret::SecretManager;
use super::vm::{VirtualMachine, VirtualMachineManager};
use super::vmi::{VirtualMachineInstance, VmiManager};
use crate::k8s::K8sClient;

/// KubeVirt and core API calls issued by the driver
#[async_trait]
pub trait KubevirtApi: Send + Sync {
    async fn get_vm(&self, namespace: &str, name: &str) -> kube::Result<VirtualMachine>;

    async fn create_vm(&self, namespace: &str, vm: &VirtualMachine) -> kube::Result<VirtualMachine>;

    async fn delete_vm(&self, namespace: &str, name: &str) -> kube::Result<()>;

    async fn start_vm(&self, namespace: &str, name: &str) -> kube::Result<()>;

    /// `grace_period` of `Some(0)` terminates the guest immediately
    async fn stop_vm(&self, namespace: &str, name: &str, grace_period: Option<i64>) -> kube::Result<()>;

    async fn restart_vm(&self, namespace: &str, name: &str) -> kube::Result<()>;

    async fn get_vmi(&self, namespace: &str, name: &str) -> kube::Result<VirtualMachineInstance>;

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> kube::Result<Secret>;

    async fn delete_secret(&self, namespace: &str, name: &str) -> kube::Result<()>;
}

/// `KubevirtApi` backed by a live cluster
#[derive(Clone)]
pub struct ClusterApi {
    vms: VirtualMachineManager,
    vmis: VmiManager,
    secrets: SecretManager,
}

impl ClusterApi {
    pub fn new(client: K8sClient) -> Self {
        Self {
            vms: VirtualMachineManager::new(client.clone()),
            vmis: VmiManager::new(client.clone()),
            secrets: SecretManager::new(client),
        }
    }
}

#[async_trait]
impl KubevirtApi for ClusterApi {
    async fn get_vm(&self, namespace: &str, name: &str) -> kube::Result<VirtualMachine> {
        self.vms.get(name, namespace).await
    }

    async fn create_vm(&self, namespace: &str, vm: &VirtualMachine) -> kube::Result<VirtualMachine> {
        self.vms.create(vm, namespace).await
    }

    async fn delete_vm(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.vms.delete(name, namespace).await
    }

    async fn start_vm(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.vms.start(name, namespace).await
    }

    async fn stop_vm(&self, namespace: &str, name: &str, grace_period: Option<i64>) -> kube::Result<()> {
        self.vms.stop(name, namespace, grace_period).await
    }

    async fn restart_vm(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.vms.restart(name, namespace).await
    }

    async fn get_vmi(&self, namespace: &str, name: &str) -> kube::Result<VirtualMachineInstance> {
        self.vmis.get(name, namespace).await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> kube::Result<Secret> {
        self.secrets.create(secret, namespace).await
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.secrets.delete(name, namespace).await
    }
}
