//! Machine lifecycle states
//!
//! KubeVirt reports a VirtualMachine's condition as a printable status
//! string. The provisioning framework only understands `State`; every
//! printable status maps onto exactly one of its variants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state reported to the provisioning framework
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    #[default]
    None,
    Starting,
    Running,
    Paused,
    Stopping,
    Stopped,
    Error,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::None => "None",
            State::Starting => "Starting",
            State::Running => "Running",
            State::Paused => "Paused",
            State::Stopping => "Stopping",
            State::Stopped => "Stopped",
            State::Error => "Error",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `status.printableStatus` of a KubeVirt VirtualMachine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintableStatus {
    Stopped,
    Provisioning,
    Starting,
    Running,
    Paused,
    Stopping,
    Terminating,
    CrashLoopBackOff,
    Migrating,
    Unknown,
    Unschedulable,
    ErrImagePull,
    ImagePullBackOff,
    PvcNotFound,
    DataVolumeError,
    WaitingForVolumeBinding,
    /// A status this driver does not know, including an empty one
    Other(String),
}

impl PrintableStatus {
    /// Parse the API string. Matching is exact, as KubeVirt emits it.
    pub fn parse(s: &str) -> Self {
        match s {
            "Stopped" => PrintableStatus::Stopped,
            "Provisioning" => PrintableStatus::Provisioning,
            "Starting" => PrintableStatus::Starting,
            "Running" => PrintableStatus::Running,
            "Paused" => PrintableStatus::Paused,
            "Stopping" => PrintableStatus::Stopping,
            "Terminating" => PrintableStatus::Terminating,
            "CrashLoopBackOff" => PrintableStatus::CrashLoopBackOff,
            "Migrating" => PrintableStatus::Migrating,
            "Unknown" => PrintableStatus::Unknown,
            "ErrorUnschedulable" => PrintableStatus::Unschedulable,
            "ErrImagePull" => PrintableStatus::ErrImagePull,
            "ImagePullBackOff" => PrintableStatus::ImagePullBackOff,
            "ErrorPvcNotFound" => PrintableStatus::PvcNotFound,
            "DataVolumeError" => PrintableStatus::DataVolumeError,
            "WaitingForVolumeBinding" => PrintableStatus::WaitingForVolumeBinding,
            other => PrintableStatus::Other(other.to_string()),
        }
    }

    /// Lifecycle state for this status
    pub fn state(&self) -> State {
        match self {
            PrintableStatus::Provisioning
            | PrintableStatus::Starting
            | PrintableStatus::WaitingForVolumeBinding => State::Starting,
            PrintableStatus::Running | PrintableStatus::Migrating => State::Running,
            PrintableStatus::Paused => State::Paused,
            PrintableStatus::Stopping | PrintableStatus::Terminating => State::Stopping,
            PrintableStatus::Stopped => State::Stopped,
            PrintableStatus::CrashLoopBackOff
            | PrintableStatus::Unknown
            | PrintableStatus::Unschedulable
            | PrintableStatus::ErrImagePull
            | PrintableStatus::ImagePullBackOff
            | PrintableStatus::PvcNotFound
            | PrintableStatus::DataVolumeError => State::Error,
            PrintableStatus::Other(_) => State::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_to_state() {
        let cases = [
            ("Provisioning", State::Starting),
            ("Starting", State::Starting),
            ("WaitingForVolumeBinding", State::Starting),
            ("Running", State::Running),
            ("Migrating", State::Running),
            ("Paused", State::Paused),
            ("Stopping", State::Stopping),
            ("Terminating", State::Stopping),
            ("Stopped", State::Stopped),
            ("CrashLoopBackOff", State::Error),
            ("Unknown", State::Error),
            ("ErrorUnschedulable", State::Error),
            ("ErrImagePull", State::Error),
            ("ImagePullBackOff", State::Error),
            ("ErrorPvcNotFound", State::Error),
            ("DataVolumeError", State::Error),
        ];

        for (status, expected) in cases {
            assert_eq!(PrintableStatus::parse(status).state(), expected, "{status}");
        }
    }

    #[test]
    fn test_unrecognised_status_is_none() {
        assert_eq!(PrintableStatus::parse("").state(), State::None);
        assert_eq!(PrintableStatus::parse("running").state(), State::None);
        assert_eq!(
            PrintableStatus::parse("ErrorDataVolumeNotFound"),
            PrintableStatus::Other("ErrorDataVolumeNotFound".to_string())
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::None.to_string(), "None");
        assert_eq!(State::Running.to_string(), "Running");
        assert_eq!(State::default(), State::None);
    }
}
