//! Operator configuration
//!
//! Built once at process start and passed by reference into the controller.
//! There is deliberately no process-wide mutable configuration singleton.

use std::env;
use std::time::Duration;

/// Default image for the scheduled backup container
const DEFAULT_BACKUP_IMAGE: &str = "percona:5.7";

/// Default pull policy for the backup container
const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";

/// Default periodic resync interval
const DEFAULT_RESYNC_SECS: u64 = 300;

/// Default deadline for a single reconcile pass
const DEFAULT_RECONCILE_DEADLINE_SECS: u64 = 30;

/// Default metrics port
const DEFAULT_METRICS_PORT: u16 = 8080;

/// Operator-wide configuration
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Backup image used when a cluster does not set one
    pub backup_image: String,

    /// Image pull policy for the backup container
    pub image_pull_policy: String,

    /// How often a cluster is re-reconciled without a change notification
    pub resync_interval: Duration,

    /// Deadline imposed on one whole reconcile pass
    pub reconcile_deadline: Duration,

    /// Port the metrics server listens on
    pub metrics_port: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            backup_image: DEFAULT_BACKUP_IMAGE.to_string(),
            image_pull_policy: DEFAULT_IMAGE_PULL_POLICY.to_string(),
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_SECS),
            reconcile_deadline: Duration::from_secs(DEFAULT_RECONCILE_DEADLINE_SECS),
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

impl OperatorConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            backup_image: env::var("BACKUP_IMAGE").unwrap_or(defaults.backup_image),
            image_pull_policy: env::var("BACKUP_IMAGE_PULL_POLICY")
                .unwrap_or(defaults.image_pull_policy),
            resync_interval: env_duration_secs("RESYNC_INTERVAL_SECS", defaults.resync_interval),
            reconcile_deadline: env_duration_secs(
                "RECONCILE_DEADLINE_SECS",
                defaults.reconcile_deadline,
            ),
            metrics_port: env::var("METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_port),
        }
    }
}

fn env_duration_secs(var: &str, default: Duration) -> Duration {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
