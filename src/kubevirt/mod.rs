//! KubeVirt integration module
//!
//! VirtualMachine / VirtualMachineInstance resources, the objects the driver
//! creates for a machine, and the API seam the driver calls through.

mod api;
mod secret;
mod ssh;
mod vm;
mod vmi;

pub use api::{ClusterApi, KubevirtApi};
pub use secret::{make_ssh_secret, ssh_secret_name};
pub use ssh::{exit_code, generate_ssh_key, public_key_path, SshClient, SshConfig};
pub use vm::make_vm;

#[cfg(test)]
pub use secret::AUTHORIZED_KEYS;
#[cfg(test)]
pub use vm::{VirtualMachine, VirtualMachineSpec, VirtualMachineStatus};
#[cfg(test)]
pub use vmi::{
    VirtualMachineInstance, VirtualMachineInstanceSpec, VirtualMachineInstanceStatus, VmiInterface,
};
