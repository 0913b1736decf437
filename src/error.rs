//! Driver error types

use kube::config::{InClusterError, KubeconfigError};
use thiserror::Error;

/// Result alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors returned by the KubeVirt driver
#[derive(Debug, Error)]
pub enum DriverError {
    /// Kubernetes API error
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// Kubeconfig file could not be read or resolved
    #[error("failed to load kubernetes config: {0}")]
    KubeConfig(#[source] KubeconfigError),

    /// No kubeconfig file and no in-cluster service account
    #[error("failed to load kubernetes config: {0}")]
    InCluster(#[source] InClusterError),

    /// Client construction failed
    #[error("failed to get kubevirt client: {0}")]
    Client(#[source] kube::Error),

    /// A VirtualMachine with the machine name is already present
    #[error("vm {name} already exists in namespace {namespace}")]
    AlreadyExists { name: String, namespace: String },

    /// VirtualMachine creation was rejected
    #[error("failed to create vm: {0}")]
    CreateVm(#[source] kube::Error),

    /// VirtualMachine lookup failed for a reason other than absence
    #[error("failed to get vm: {0}")]
    GetVm(#[source] kube::Error),

    /// Operation needs a running machine
    #[error("host is not running")]
    NotRunning,

    /// The VMI reports no network interfaces yet
    #[error("no interfaces found for vm {0}")]
    NoInterfaces(String),

    /// The first interface has no address yet
    #[error("no ip address reported for vm {0}")]
    NoAddress(String),

    /// Memory size could not be expressed as a quantity
    #[error("failed to parse memory quantity: {0}")]
    InvalidMemory(String),

    /// Invalid flag value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// SSH key generation failed
    #[error("ssh key generation failed: {0}")]
    SshKey(String),

    /// Filesystem error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Whether a kube error is a 404 from the API server
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}
