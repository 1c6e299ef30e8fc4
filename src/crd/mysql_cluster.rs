//! MysqlCluster Custom Resource Definition

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// MysqlCluster resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "mysql.dbops.io",
    version = "v1alpha1",
    kind = "MysqlCluster",
    plural = "mysqlclusters",
    singular = "mysqlcluster",
    shortname = "mc",
    namespaced,
    status = "MysqlClusterStatus",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Schedule", "type": "string", "jsonPath": ".spec.backupSchedule"}"#,
    printcolumn = r#"{"name": "Last Sync", "type": "string", "jsonPath": ".status.lastSyncTime"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MysqlClusterSpec {
    /// Cron schedule for automated backups. Empty or absent disables the
    /// backup CronJob for this cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<String>,

    /// Image running the scheduled backup job. Falls back to the operator's
    /// configured default image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Extra labels propagated onto the backup CronJob
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub backup_job_labels: BTreeMap<String, String>,

    /// Extra annotations propagated onto the backup CronJob
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub backup_job_annotations: BTreeMap<String, String>,
}

/// MysqlCluster status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MysqlClusterStatus {
    /// Current phase (Ready, Failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Outcome of the last backup CronJob sync (created, updated, unchanged, skipped)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_outcome: Option<String>,

    /// Last successful sync timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,

    /// Observed generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: String,

    /// Last transition time
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
