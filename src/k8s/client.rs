//! Kubernetes client wrapper
//!
//! Resolves cluster credentials and builds the kube client shared by the
//! KubeVirt managers.

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::PathBuf;
use tracing::debug;

use crate::error::{DriverError, Result};

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Create a client from a kubeconfig path, empty meaning the default
    /// location or the in-cluster service account
    pub async fn from_kubeconfig(path: &str) -> Result<Self> {
        let config = load_kube_config(path).await?;
        Self::with_config(config)
    }

    /// Create client with custom config
    pub fn with_config(config: Config) -> Result<Self> {
        let client = Client::try_from(config).map_err(DriverError::Client)?;
        Ok(Self { client })
    }

    /// Get the underlying kube client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Default kubeconfig location, `~/.kube/config`
pub fn default_kubeconfig_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".kube")
        .join("config")
}

/// Load cluster configuration.
///
/// An empty `path` selects `~/.kube/config`. When the file does not exist the
/// in-cluster configuration is used instead.
pub async fn load_kube_config(path: &str) -> Result<Config> {
    let path = if path.is_empty() {
        default_kubeconfig_path()
    } else {
        PathBuf::from(path)
    };

    if path.exists() {
        debug!("Loading kubeconfig from {}", path.display());
        let kubeconfig = Kubeconfig::read_from(&path).map_err(DriverError::KubeConfig)?;
        return Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(DriverError::KubeConfig);
    }

    debug!(
        "Kubeconfig {} not found, using in-cluster config",
        path.display()
    );
    Config::incluster().map_err(DriverError::InCluster)
}
