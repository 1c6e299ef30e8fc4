//! Kubernetes controllers for the MySQL Backup Operator
//!
//! This module contains the controller implementations that watch for
//! resource changes and trigger reconciliation.

mod cluster_controller;

pub use cluster_controller::run as run_cluster_controller;

use kube::Client;

use crate::config::OperatorConfig;

/// Shared context for all controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,

    /// Operator configuration, built once at startup
    pub config: OperatorConfig,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self { client, config }
    }
}
