//! In-memory cluster used by driver tests

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::core::ErrorResponse;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::kubevirt::{
    KubevirtApi, VirtualMachine, VirtualMachineInstance, VirtualMachineInstanceSpec,
    VirtualMachineInstanceStatus, VirtualMachineSpec, VirtualMachineStatus, VmiInterface,
};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: reason.to_string(),
        reason: reason.to_string(),
        code,
    })
}

fn not_found() -> kube::Error {
    api_error(404, "NotFound")
}

#[derive(Default)]
struct Inner {
    vms: BTreeMap<Key, VirtualMachine>,
    vmis: BTreeMap<Key, VirtualMachineInstance>,
    secrets: BTreeMap<Key, Secret>,
    calls: Vec<String>,
    get_vm_error: Option<u16>,
    create_vm_error: Option<u16>,
    delete_vm_error: Option<u16>,
    delete_secret_error: Option<u16>,
}

/// Records calls and keeps objects in maps
#[derive(Default)]
pub struct FakeCluster {
    inner: Mutex<Inner>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a VM with the given printable status
    pub fn with_vm(self, namespace: &str, name: &str, printable_status: &str) -> Self {
        let mut vm = VirtualMachine::new(name, VirtualMachineSpec::default());
        vm.metadata.namespace = Some(namespace.to_string());
        vm.status = Some(VirtualMachineStatus {
            printable_status: Some(printable_status.to_string()),
            ..Default::default()
        });
        self.inner.lock().unwrap().vms.insert(key(namespace, name), vm);
        self
    }

    /// Seed a VMI reporting `ips`, one interface per address
    pub fn with_vmi(self, namespace: &str, name: &str, ips: &[&str]) -> Self {
        let mut vmi = VirtualMachineInstance::new(name, VirtualMachineInstanceSpec::default());
        vmi.status = Some(VirtualMachineInstanceStatus {
            phase: Some("Running".to_string()),
            interfaces: ips
                .iter()
                .map(|ip| VmiInterface {
                    name: Some("default".to_string()),
                    ip_address: Some(ip.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        });
        self.inner.lock().unwrap().vmis.insert(key(namespace, name), vmi);
        self
    }

    /// Make every VM lookup fail with `code`
    pub fn failing_get_vm(self, code: u16) -> Self {
        self.inner.lock().unwrap().get_vm_error = Some(code);
        self
    }

    /// Make VM creation fail with `code`
    pub fn failing_create_vm(self, code: u16) -> Self {
        self.inner.lock().unwrap().create_vm_error = Some(code);
        self
    }

    /// Make VM deletion fail with `code`
    pub fn failing_delete_vm(self, code: u16) -> Self {
        self.inner.lock().unwrap().delete_vm_error = Some(code);
        self
    }

    /// Make secret deletion fail with `code`
    pub fn failing_delete_secret(self, code: u16) -> Self {
        self.inner.lock().unwrap().delete_secret_error = Some(code);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn vm(&self, namespace: &str, name: &str) -> Option<VirtualMachine> {
        self.inner.lock().unwrap().vms.get(&key(namespace, name)).cloned()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.inner
            .lock()
            .unwrap()
            .secrets
            .get(&key(namespace, name))
            .cloned()
    }

    fn record(&self, call: String) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl KubevirtApi for FakeCluster {
    async fn get_vm(&self, namespace: &str, name: &str) -> kube::Result<VirtualMachine> {
        self.record(format!("get_vm {namespace}/{name}"));
        let inner = self.inner.lock().unwrap();
        if let Some(code) = inner.get_vm_error {
            return Err(api_error(code, "InternalError"));
        }
        inner.vms.get(&key(namespace, name)).cloned().ok_or_else(not_found)
    }

    async fn create_vm(&self, namespace: &str, vm: &VirtualMachine) -> kube::Result<VirtualMachine> {
        let name = vm.metadata.name.clone().unwrap_or_default();
        self.record(format!("create_vm {namespace}/{name}"));
        let mut inner = self.inner.lock().unwrap();
        if let Some(code) = inner.create_vm_error {
            return Err(api_error(code, "Invalid"));
        }
        inner.vms.insert(key(namespace, &name), vm.clone());
        Ok(vm.clone())
    }

    async fn delete_vm(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.record(format!("delete_vm {namespace}/{name}"));
        let mut inner = self.inner.lock().unwrap();
        if let Some(code) = inner.delete_vm_error {
            return Err(api_error(code, "InternalError"));
        }
        inner.vms.remove(&key(namespace, name)).map(|_| ()).ok_or_else(not_found)
    }

    async fn start_vm(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.record(format!("start_vm {namespace}/{name}"));
        Ok(())
    }

    async fn stop_vm(&self, namespace: &str, name: &str, grace_period: Option<i64>) -> kube::Result<()> {
        self.record(format!("stop_vm {namespace}/{name} grace={grace_period:?}"));
        Ok(())
    }

    async fn restart_vm(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.record(format!("restart_vm {namespace}/{name}"));
        Ok(())
    }

    async fn get_vmi(&self, namespace: &str, name: &str) -> kube::Result<VirtualMachineInstance> {
        self.record(format!("get_vmi {namespace}/{name}"));
        let inner = self.inner.lock().unwrap();
        inner.vmis.get(&key(namespace, name)).cloned().ok_or_else(not_found)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> kube::Result<Secret> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.record(format!("create_secret {namespace}/{name}"));
        let mut inner = self.inner.lock().unwrap();
        inner.secrets.insert(key(namespace, &name), secret.clone());
        Ok(secret.clone())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.record(format!("delete_secret {namespace}/{name}"));
        let mut inner = self.inner.lock().unwrap();
        if let Some(code) = inner.delete_secret_error {
            return Err(api_error(code, "InternalError"));
        }
        inner.secrets.remove(&key(namespace, name)).map(|_| ()).ok_or_else(not_found)
    }
}
