//! Kubernetes API client module

mod client;

pub use client::K8sClient;
