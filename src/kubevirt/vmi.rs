//! VirtualMachineInstance resource access
//!
//! The driver only reads VMIs; they are created and owned by the KubeVirt
//! controller on behalf of the VirtualMachine.

use kube::api::Api;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::k8s::K8sClient;

/// VirtualMachineInstance custom resource specification
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstance",
    plural = "virtualmachineinstances",
    shortname = "vmi",
    namespaced,
    status = "VirtualMachineInstanceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    /// Domain specification, kept opaque
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<serde_json::Value>,
}

/// VMI Status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    /// Current phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Node name where VMI is running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    /// Interfaces with IP addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<VmiInterface>,
}

/// VMI network interface
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiInterface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// Primary IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,

    /// Interface name inside guest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
}

impl VmiInterface {
    /// Primary address, falling back to the first of the address list
    pub fn ip(&self) -> Option<&str> {
        self.ip_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .or_else(|| self.ip_addresses.first().map(String::as_str))
    }
}

impl VirtualMachineInstance {
    /// Interfaces reported by the guest, empty while the VMI is booting
    pub fn interfaces(&self) -> &[VmiInterface] {
        self.status
            .as_ref()
            .map(|s| s.interfaces.as_slice())
            .unwrap_or_default()
    }
}

/// VMI Manager
#[derive(Clone)]
pub struct VmiManager {
    client: K8sClient,
}

impl VmiManager {
    /// Create a new VMI manager
    pub fn new(client: K8sClient) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<VirtualMachineInstance> {
        Api::namespaced(self.client.client().clone(), namespace)
    }

    /// Get a VMI
    pub async fn get(&self, name: &str, namespace: &str) -> kube::Result<VirtualMachineInstance> {
        self.api(namespace).get(name).await
    }
}
