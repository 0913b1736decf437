//! SSH key secret for guest access credentials

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams};
use std::collections::BTreeMap;
use tracing::info;

use crate::k8s::K8sClient;

/// Key under which the public key is stored
pub const AUTHORIZED_KEYS: &str = "authorized_keys";

/// Name of the secret holding a machine's public key
pub fn ssh_secret_name(name: &str) -> String {
    format!("{name}-ssh")
}

/// Build the secret carrying `pubkey` for machine `name`
pub fn make_ssh_secret(namespace: &str, name: &str, pubkey: &str) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(
        AUTHORIZED_KEYS.to_string(),
        ByteString(pubkey.as_bytes().to_vec()),
    );

    Secret {
        metadata: ObjectMeta {
            name: Some(ssh_secret_name(name)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

/// Secret manager
#[derive(Clone)]
pub struct SecretManager {
    client: K8sClient,
}

impl SecretManager {
    pub fn new(client: K8sClient) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.client().clone(), namespace)
    }

    /// Create a secret
    pub async fn create(&self, secret: &Secret, namespace: &str) -> kube::Result<Secret> {
        self.api(namespace)
            .create(&PostParams::default(), secret)
            .await
    }

    /// Delete a secret
    pub async fn delete(&self, name: &str, namespace: &str) -> kube::Result<()> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        info!("Deleted Secret {}/{}", namespace, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_name() {
        assert_eq!(ssh_secret_name("worker-1"), "worker-1-ssh");
    }

    #[test]
    fn test_make_ssh_secret() {
        let secret = make_ssh_secret("vms", "worker-1", "ssh-rsa AAAA test@host\n");

        assert_eq!(secret.metadata.name.as_deref(), Some("worker-1-ssh"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("vms"));

        let data = secret.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[AUTHORIZED_KEYS].0, b"ssh-rsa AAAA test@host\n".to_vec());
    }
}
