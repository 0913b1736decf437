//! SSH connectivity for machines
//!
//! Key pair generation for new machines and a thin wrapper over the `ssh`
//! binary for running commands in them.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{DriverError, Result};

/// Generate an RSA key pair at `path` and `path.pub`.
///
/// Does nothing when the private key is already present.
pub async fn generate_ssh_key(path: &Path) -> Result<()> {
    if path.exists() {
        debug!("SSH key {} already exists", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!("Creating SSH key...");
    let output = Command::new("ssh-keygen")
        .args(["-t", "rsa", "-b", "2048", "-N", "", "-q", "-f"])
        .arg(path)
        .output()
        .await
        .map_err(|e| DriverError::SshKey(format!("failed to run ssh-keygen: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DriverError::SshKey(stderr.trim().to_string()));
    }

    Ok(())
}

/// Path of the public half of a key pair
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut path = private_key.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

/// SSH client configuration
#[derive(Clone, Debug)]
pub struct SshConfig {
    pub username: String,

    pub private_key_path: Option<PathBuf>,

    pub port: u16,

    /// Connection timeout in seconds
    pub timeout_secs: u64,

    pub strict_host_key_checking: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: "root".to_string(),
            private_key_path: None,
            port: 22,
            timeout_secs: 30,
            strict_host_key_checking: false,
        }
    }
}

impl SshConfig {
    /// Create a new SSH config
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Set private key path
    pub fn private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// Set port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// SSH client for connecting to machines
pub struct SshClient {
    config: SshConfig,
}

impl SshClient {
    /// Create a new SSH client
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Build SSH command arguments
    pub fn build_ssh_args(&self, host: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!(
                "StrictHostKeyChecking={}",
                if self.config.strict_host_key_checking {
                    "yes"
                } else {
                    "no"
                }
            ),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.timeout_secs),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-p".to_string(),
            self.config.port.to_string(),
        ];

        if let Some(ref key_path) = self.config.private_key_path {
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
            args.push("-i".to_string());
            args.push(key_path.to_string_lossy().to_string());
        }

        args.push(format!("{}@{}", self.config.username, host));
        args
    }

    /// Run `command` on the host, or an interactive shell when empty.
    ///
    /// Standard streams are inherited from the caller.
    pub async fn run(&self, host: &str, command: &[String]) -> Result<ExitStatus> {
        let mut args = self.build_ssh_args(host);
        args.extend(command.iter().cloned());
        debug!("ssh {}", args.join(" "));

        let status = Command::new("ssh").args(&args).status().await?;
        Ok(status)
    }
}

/// Process exit code for a finished ssh session.
///
/// Codes outside `0..=255` and termination by signal map to 1.
pub fn exit_code(status: ExitStatus) -> u8 {
    if status.success() {
        return 0;
    }
    status
        .code()
        .and_then(|c| u8::try_from(c).ok())
        .filter(|c| *c != 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_exit_code() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(ExitStatus::from_raw(255 << 8)), 255);
        // SIGKILL
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 1);
    }

    #[test]
    fn test_ssh_client_args() {
        let client = SshClient::new(
            SshConfig::new("root")
                .port(2222)
                .private_key("/store/machines/m1/id_rsa"),
        );
        let args = client.build_ssh_args("10.0.0.7");

        assert!(args.contains(&"2222".to_string()));
        assert!(args.contains(&"/store/machines/m1/id_rsa".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("root@10.0.0.7"));
    }

    #[test]
    fn test_args_without_key() {
        let client = SshClient::new(SshConfig::default());
        let args = client.build_ssh_args("10.0.0.7");

        assert!(!args.contains(&"-i".to_string()));
        assert!(args.contains(&"StrictHostKeyChecking=no".to_string()));
    }

    #[test]
    fn test_public_key_path() {
        assert_eq!(
            public_key_path(Path::new("/store/machines/m1/id_rsa")),
            PathBuf::from("/store/machines/m1/id_rsa.pub")
        );
    }

    #[tokio::test]
    async fn test_existing_key_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_rsa");
        std::fs::write(&key, "existing").unwrap();

        generate_ssh_key(&key).await.unwrap();
        assert_eq!(std::fs::read_to_string(&key).unwrap(), "existing");
    }
}
