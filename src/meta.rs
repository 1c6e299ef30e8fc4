//! Metadata helpers: resource naming, labels, and owner references
//!
//! Every object this operator creates is named deterministically from its
//! owning cluster and carries a controller owner reference, so the platform's
//! garbage collector removes it together with the cluster.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::crd::MysqlCluster;

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the tool managing the application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the component within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Value for `app.kubernetes.io/name`
pub const APP_NAME: &str = "mysql";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY: &str = "mysql-backup-operator";

/// Component value for the scheduled-backup CronJob
pub const COMPONENT_BACKUP: &str = "backup";

/// Name suffix for the backup CronJob role
const BACKUP_CRON_JOB_SUFFIX: &str = "backup";

/// Derive the backup CronJob name for a cluster.
///
/// Pure function of the cluster name: the same cluster always maps to the
/// same CronJob, so at most one backup CronJob exists per cluster.
pub fn backup_cron_job_name(cluster_name: &str) -> String {
    format!("{}-{}", cluster_name, BACKUP_CRON_JOB_SUFFIX)
}

/// Standard labels for objects owned by a cluster, merged with the extra
/// labels the cluster asks to propagate. Standard labels win on collision.
pub fn backup_labels(cluster: &MysqlCluster) -> BTreeMap<String, String> {
    let mut labels = cluster.spec.backup_job_labels.clone();
    labels.insert(K8S_NAME.to_string(), APP_NAME.to_string());
    labels.insert(K8S_INSTANCE.to_string(), cluster.name_any());
    labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY.to_string());
    labels.insert(K8S_COMPONENT.to_string(), COMPONENT_BACKUP.to_string());
    labels
}

/// Controller owner reference pointing back at the cluster.
///
/// Returns None when the cluster has no uid yet, i.e. it was never persisted.
pub fn owner_reference(cluster: &MysqlCluster) -> Option<OwnerReference> {
    cluster.controller_owner_ref(&())
}
