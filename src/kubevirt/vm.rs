//! VirtualMachine resource management
//!
//! Defines the KubeVirt VirtualMachine resource, builds the machine's VM
//! object and drives its lifecycle subresources.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, DeleteParams, PostParams};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::secret::ssh_secret_name;
use crate::k8s::K8sClient;

/// Label KubeVirt uses to tie a VMI back to its domain
pub const DOMAIN_LABEL: &str = "kubevirt.io/domain";

/// Guest user that receives the SSH key
pub const DEFAULT_USER: &str = "root";

const ROOT_VOLUME: &str = "root";
const DEFAULT_NETWORK: &str = "default";
const CPU_MODEL: &str = "host-passthrough";
const SUBRESOURCE_API: &str = "/apis/subresources.kubevirt.io/v1";

/// VirtualMachine custom resource specification
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachine",
    plural = "virtualmachines",
    shortname = "vm",
    namespaced,
    status = "VirtualMachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    /// Legacy running flag, mutually exclusive with run_strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,

    /// Run strategy for the VM
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_strategy: Option<String>,

    /// Template for the VMI
    pub template: VmiTemplate,
}

/// VMI Template specification
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VmiTemplateMetadata>,

    pub spec: VmiTemplateSpec,
}

/// VMI Template metadata
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiTemplateMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// VMI Template spec
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiTemplateSpec {
    /// Guest hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Credentials injected into the guest
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_credentials: Vec<AccessCredential>,

    /// Domain specification
    pub domain: DomainSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// Guest access credential
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessCredential {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<SshPublicKeyAccessCredential>,
}

/// SSH public key credential and how it reaches the guest
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SshPublicKeyAccessCredential {
    pub source: SshPublicKeySource,
    pub propagation_method: SshPublicKeyPropagationMethod,
}

/// Where the public keys are read from
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SshPublicKeySource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<AccessCredentialSecretSource>,
}

/// Secret holding authorized keys
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessCredentialSecretSource {
    pub secret_name: String,
}

/// Propagation of SSH keys into the guest
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SshPublicKeyPropagationMethod {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qemu_guest_agent: Option<QemuGuestAgentPropagation>,
}

/// Keys are written by the qemu guest agent for these users
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QemuGuestAgentPropagation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

/// Domain specification for the VM
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesSpec>,

    pub devices: DevicesSpec,
}

/// CPU specification
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CpuSpec {
    /// Number of CPU cores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,

    /// CPU model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Resources specification
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesSpec {
    /// Resource requests
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, Quantity>,
}

/// Devices specification
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevicesSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Disk>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,

    /// Whether to attach a VNC graphics device
    #[serde(
        rename = "autoattachGraphicsDevice",
        skip_serializing_if = "Option::is_none"
    )]
    pub autoattach_graphics_device: Option<bool>,

    /// RNG device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng: Option<RngDevice>,
}

/// RNG device
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
pub struct RngDevice {}

/// Disk device
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    /// Disk name (must match volume name)
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskTarget>,
}

/// Disk target configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiskTarget {
    /// Bus type (virtio, sata, scsi)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus: Option<String>,
}

/// Network interface
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    /// Interface name (must match network name)
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<MasqueradeMode>,
}

/// Masquerade network binding
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
pub struct MasqueradeMode {}

/// Network configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodNetwork>,
}

/// Pod network configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
pub struct PodNetwork {}

/// Volume configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_disk: Option<ContainerDiskSource>,
}

/// Container disk source
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDiskSource {
    /// Container image
    pub image: String,
}

/// VirtualMachine status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineStatus {
    #[serde(default)]
    pub created: bool,

    #[serde(default)]
    pub ready: bool,

    /// Human readable status maintained by the KubeVirt controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printable_status: Option<String>,
}

/// Body of the `stop` subresource
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
}

/// Inputs for the machine's VirtualMachine
#[derive(Clone, Debug)]
pub struct VmConfig {
    pub name: String,
    pub namespace: String,
    pub cpu_cores: u32,
    pub memory: Quantity,
    pub image: String,
}

impl VmConfig {
    /// Create a new VM configuration
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            cpu_cores: 1,
            memory: Quantity("1024Mi".to_string()),
            image: String::new(),
        }
    }

    /// Set CPU cores
    pub fn cpu(mut self, cores: u32) -> Self {
        self.cpu_cores = cores;
        self
    }

    /// Set memory request
    pub fn memory(mut self, memory: Quantity) -> Self {
        self.memory = memory;
        self
    }

    /// Set container disk image
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Build the VirtualMachine resource
    pub fn build(self) -> VirtualMachine {
        let credential = AccessCredential {
            ssh_public_key: Some(SshPublicKeyAccessCredential {
                source: SshPublicKeySource {
                    secret: Some(AccessCredentialSecretSource {
                        secret_name: ssh_secret_name(&self.name),
                    }),
                },
                propagation_method: SshPublicKeyPropagationMethod {
                    qemu_guest_agent: Some(QemuGuestAgentPropagation {
                        users: vec![DEFAULT_USER.to_string()],
                    }),
                },
            }),
        };

        let mut requests = BTreeMap::new();
        requests.insert("memory".to_string(), self.memory);

        let mut labels = BTreeMap::new();
        labels.insert(DOMAIN_LABEL.to_string(), self.name.clone());

        VirtualMachine {
            metadata: kube::api::ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace),
                ..Default::default()
            },
            spec: VirtualMachineSpec {
                running: None,
                run_strategy: Some("RerunOnFailure".to_string()),
                template: VmiTemplate {
                    metadata: Some(VmiTemplateMetadata { labels }),
                    spec: VmiTemplateSpec {
                        hostname: Some(self.name),
                        access_credentials: vec![credential],
                        domain: DomainSpec {
                            cpu: Some(CpuSpec {
                                cores: Some(self.cpu_cores),
                                model: Some(CPU_MODEL.to_string()),
                            }),
                            resources: Some(ResourcesSpec { requests }),
                            devices: DevicesSpec {
                                disks: vec![Disk {
                                    name: ROOT_VOLUME.to_string(),
                                    disk: Some(DiskTarget {
                                        bus: Some("virtio".to_string()),
                                    }),
                                }],
                                interfaces: vec![Interface {
                                    name: DEFAULT_NETWORK.to_string(),
                                    masquerade: Some(MasqueradeMode {}),
                                }],
                                autoattach_graphics_device: Some(false),
                                rng: Some(RngDevice {}),
                            },
                        },
                        networks: vec![Network {
                            name: DEFAULT_NETWORK.to_string(),
                            pod: Some(PodNetwork {}),
                        }],
                        volumes: vec![Volume {
                            name: ROOT_VOLUME.to_string(),
                            container_disk: Some(ContainerDiskSource { image: self.image }),
                        }],
                    },
                },
            },
            status: None,
        }
    }
}

/// Build the VirtualMachine for a machine
pub fn make_vm(
    namespace: &str,
    name: &str,
    image: &str,
    cpus: u32,
    memory: Quantity,
) -> VirtualMachine {
    VmConfig::new(name, namespace)
        .cpu(cpus)
        .memory(memory)
        .image(image)
        .build()
}

/// VirtualMachine manager
#[derive(Clone)]
pub struct VirtualMachineManager {
    client: K8sClient,
}

impl VirtualMachineManager {
    /// Create a new VM manager
    pub fn new(client: K8sClient) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<VirtualMachine> {
        Api::namespaced(self.client.client().clone(), namespace)
    }

    /// Create a VirtualMachine
    pub async fn create(&self, vm: &VirtualMachine, namespace: &str) -> kube::Result<VirtualMachine> {
        self.api(namespace).create(&PostParams::default(), vm).await
    }

    /// Get a VirtualMachine
    pub async fn get(&self, name: &str, namespace: &str) -> kube::Result<VirtualMachine> {
        self.api(namespace).get(name).await
    }

    /// Delete a VirtualMachine
    pub async fn delete(&self, name: &str, namespace: &str) -> kube::Result<()> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        info!("Deleted VirtualMachine {}/{}", namespace, name);
        Ok(())
    }

    /// Start a VirtualMachine
    pub async fn start(&self, name: &str, namespace: &str) -> kube::Result<()> {
        self.subresource(name, namespace, "start", &serde_json::json!({}))
            .await
    }

    /// Stop a VirtualMachine, `grace_period` overrides the VMI's own
    pub async fn stop(&self, name: &str, namespace: &str, grace_period: Option<i64>) -> kube::Result<()> {
        self.subresource(name, namespace, "stop", &StopOptions { grace_period })
            .await
    }

    /// Restart a VirtualMachine
    pub async fn restart(&self, name: &str, namespace: &str) -> kube::Result<()> {
        self.subresource(name, namespace, "restart", &serde_json::json!({}))
            .await
    }

    async fn subresource<B: Serialize>(
        &self,
        name: &str,
        namespace: &str,
        action: &str,
        body: &B,
    ) -> kube::Result<()> {
        let url = subresource_url(namespace, name, action);
        debug!("PUT {}", url);

        let body = serde_json::to_vec(body).map_err(kube::Error::SerdeError)?;
        let request = http::Request::put(url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(kube::Error::HttpError)?;

        self.client.client().request_text(request).await?;
        Ok(())
    }
}

fn subresource_url(namespace: &str, name: &str, action: &str) -> String {
    format!("{SUBRESOURCE_API}/namespaces/{namespace}/virtualmachines/{name}/{action}")
}
