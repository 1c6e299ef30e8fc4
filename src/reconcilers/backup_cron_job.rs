//! Backup CronJob reconciler
//!
//! Converges the scheduled-backup CronJob of a MysqlCluster with the
//! cluster's declared spec in a single pass:
//! - build the desired object (pure, no I/O)
//! - fetch the live object from the store
//! - create it, patch the fields this operator owns, or report a no-op
//!
//! A cluster without a backup schedule opted out: the pass is skipped and an
//! existing CronJob is left alone. Retraction belongs to a separate deletion
//! path; owner references make the platform collect the CronJob together
//! with its cluster.

use std::str::FromStr;

use chrono::Utc;
use cron::Schedule;
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Patch, PatchParams},
    Api, Client, ResourceExt,
};
use serde_json::json;
use tracing::{debug, info};

use crate::config::OperatorConfig;
use crate::crd::MysqlCluster;
use crate::error::{Error, Result};
use crate::meta;
use crate::reconcilers::ReconcileOutcome;
use crate::store::{CronJobStore, StoreError};

/// Name of the container running the scheduled backup
const BACKUP_CONTAINER_NAME: &str = "schedule-backup";

/// Command the backup image is invoked with
const BACKUP_COMMAND: &str = "schedule-backup";

/// Scheduled backups of the same cluster must never overlap
const CONCURRENCY_POLICY_FORBID: &str = "Forbid";

/// Restart policy for the backup pod
const RESTART_POLICY_ON_FAILURE: &str = "OnFailure";

/// Job retries before a scheduled backup run is marked failed
const DEFAULT_BACKOFF_LIMIT: i32 = 3;

/// Ceiling on fetch-compare-apply attempts within one pass
const MAX_SYNC_ATTEMPTS: u32 = 4;

/// Field manager used for status patches
const FIELD_MANAGER: &str = "mysql-backup-operator";

/// Validate the MysqlCluster spec.
///
/// The reconciler itself assumes a well-formed cluster; this runs before it.
pub fn validate(cluster: &MysqlCluster) -> Result<()> {
    if cluster.metadata.name.as_deref().unwrap_or_default().is_empty() {
        return Err(Error::validation("Cluster name must not be empty"));
    }

    if let Some(schedule) = cluster.spec.backup_schedule.as_deref().filter(|s| !s.is_empty()) {
        // Kubernetes schedules carry five fields; the cron crate wants a
        // leading seconds field.
        Schedule::from_str(&format!("0 {}", schedule)).map_err(|e| {
            Error::validation(format!("Invalid cron schedule '{}': {}", schedule, e))
        })?;
    }

    Ok(())
}

/// Build the desired backup CronJob for a cluster.
///
/// Returns None when the cluster has no backup schedule: the cluster opted
/// out and no object should be built. Pure function of the cluster spec and
/// operator config; a non-empty cluster name is the caller's responsibility.
pub fn desired_cron_job(cluster: &MysqlCluster, config: &OperatorConfig) -> Option<CronJob> {
    let schedule = cluster
        .spec
        .backup_schedule
        .as_deref()
        .filter(|s| !s.is_empty())?;

    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
    let image = cluster
        .spec
        .image
        .clone()
        .unwrap_or_else(|| config.backup_image.clone());

    let metadata = ObjectMeta {
        name: Some(meta::backup_cron_job_name(&name)),
        namespace: Some(namespace.clone()),
        labels: Some(meta::backup_labels(cluster)),
        annotations: (!cluster.spec.backup_job_annotations.is_empty())
            .then(|| cluster.spec.backup_job_annotations.clone()),
        owner_references: meta::owner_reference(cluster).map(|r| vec![r]),
        ..Default::default()
    };

    let container = Container {
        name: BACKUP_CONTAINER_NAME.to_string(),
        image: Some(image),
        image_pull_policy: Some(config.image_pull_policy.clone()),
        args: Some(vec![
            BACKUP_COMMAND.to_string(),
            format!("--namespace={}", namespace),
            name,
        ]),
        ..Default::default()
    };

    let spec = CronJobSpec {
        schedule: schedule.to_string(),
        concurrency_policy: Some(CONCURRENCY_POLICY_FORBID.to_string()),
        job_template: JobTemplateSpec {
            metadata: None,
            spec: Some(JobSpec {
                backoff_limit: Some(DEFAULT_BACKOFF_LIMIT),
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![container],
                        restart_policy: Some(RESTART_POLICY_ON_FAILURE.to_string()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
        },
        ..Default::default()
    };

    Some(CronJob {
        metadata,
        spec: Some(spec),
        status: None,
    })
}

/// Run one convergence pass for a cluster's backup CronJob.
///
/// Transient races (a concurrent create of the same object, a stale resource
/// version on update) restart the pass from a fresh fetch, bounded by
/// [`MAX_SYNC_ATTEMPTS`]. Everything else terminates the pass with a
/// classified outcome; this function never returns early through an error.
pub async fn reconcile<S: CronJobStore>(
    store: &S,
    config: &OperatorConfig,
    cluster: &MysqlCluster,
) -> ReconcileOutcome {
    let Some(desired) = desired_cron_job(cluster, config) else {
        info!(
            cluster = %cluster.name_any(),
            "no backup schedule configured, skipping backup cron job sync"
        );
        return ReconcileOutcome::Skipped;
    };

    let namespace = desired.namespace().unwrap_or_else(|| "default".to_string());
    let name = desired.name_any();

    for attempt in 1..=MAX_SYNC_ATTEMPTS {
        let current = match store.get(&namespace, &name).await {
            Ok(current) => current,
            Err(err) => return ReconcileOutcome::Failed(err.into()),
        };

        let Some(mut current) = current else {
            match store.create(&namespace, &desired).await {
                Ok(_) => return ReconcileOutcome::Created,
                Err(StoreError::AlreadyExists) => {
                    // Lost the create race. Fetch the winner and converge it.
                    debug!(name = %name, attempt, "cron job created concurrently, refetching");
                    continue;
                }
                Err(err) => return ReconcileOutcome::Failed(err.into()),
            }
        };

        if !needs_update(&current, &desired) {
            return ReconcileOutcome::Unchanged;
        }

        merge_desired(&mut current, &desired);

        match store.update(&namespace, &current).await {
            Ok(_) => return ReconcileOutcome::Updated,
            Err(StoreError::Conflict) => {
                debug!(name = %name, attempt, "stale resource version, refetching");
                continue;
            }
            Err(err) => return ReconcileOutcome::Failed(err.into()),
        }
    }

    ReconcileOutcome::Failed(Error::ConflictExhausted {
        attempts: MAX_SYNC_ATTEMPTS,
    })
}

fn backoff_limit(cron_job: &CronJob) -> Option<i32> {
    cron_job.spec.as_ref()?.job_template.spec.as_ref()?.backoff_limit
}

fn pod_spec(cron_job: &CronJob) -> Option<&PodSpec> {
    cron_job
        .spec
        .as_ref()?
        .job_template
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()
}

/// Field-level comparison over the fields this operator owns: schedule,
/// concurrency policy, backoff limit, restart policy, container image and
/// args. Platform bookkeeping, status, and anything set by other controllers
/// is never looked at.
fn needs_update(current: &CronJob, desired: &CronJob) -> bool {
    let (Some(current_spec), Some(desired_spec)) = (current.spec.as_ref(), desired.spec.as_ref())
    else {
        return desired.spec.is_some();
    };

    if current_spec.schedule != desired_spec.schedule
        || current_spec.concurrency_policy != desired_spec.concurrency_policy
        || backoff_limit(current) != backoff_limit(desired)
    {
        return true;
    }

    match (pod_spec(current), pod_spec(desired)) {
        (Some(current_pod), Some(desired_pod)) => {
            if current_pod.restart_policy != desired_pod.restart_policy {
                return true;
            }
            match (current_pod.containers.first(), desired_pod.containers.first()) {
                (Some(current_container), Some(desired_container)) => {
                    current_container.image != desired_container.image
                        || current_container.args != desired_container.args
                }
                (None, Some(_)) => true,
                (_, None) => false,
            }
        }
        (None, Some(_)) => true,
        (_, None) => false,
    }
}

/// Overwrite exactly the owned fields on the fetched object. Metadata
/// (including the resource version used as the concurrency token), status,
/// and every field outside the owned set survive untouched.
fn merge_desired(current: &mut CronJob, desired: &CronJob) {
    let Some(desired_spec) = desired.spec.as_ref() else {
        return;
    };

    let current_spec = current.spec.get_or_insert_with(CronJobSpec::default);
    current_spec.schedule = desired_spec.schedule.clone();
    current_spec.concurrency_policy = desired_spec.concurrency_policy.clone();

    let Some(desired_job) = desired_spec.job_template.spec.as_ref() else {
        return;
    };
    let current_job = current_spec
        .job_template
        .spec
        .get_or_insert_with(JobSpec::default);
    current_job.backoff_limit = desired_job.backoff_limit;

    let Some(desired_pod) = desired_job.template.spec.as_ref() else {
        return;
    };
    let current_pod = current_job
        .template
        .spec
        .get_or_insert_with(|| desired_pod.clone());
    current_pod.restart_policy = desired_pod.restart_policy.clone();

    let Some(desired_container) = desired_pod.containers.first() else {
        return;
    };
    if let Some(container) = current_pod.containers.first_mut() {
        container.image = desired_container.image.clone();
        container.args = desired_container.args.clone();
    } else {
        current_pod.containers.push(desired_container.clone());
    }
}

/// Record a successful sync on the cluster status
pub async fn update_status_synced(
    cluster: &MysqlCluster,
    client: &Client,
    namespace: &str,
    outcome_label: &str,
) -> Result<()> {
    let name = cluster.name_any();
    let api: Api<MysqlCluster> = Api::namespaced(client.clone(), namespace);

    let status = json!({
        "status": {
            "phase": "Ready",
            "message": "Backup cron job is in sync",
            "lastSyncOutcome": outcome_label,
            "lastSyncTime": Utc::now(),
            "observedGeneration": cluster.metadata.generation,
            "conditions": [{
                "type": "Ready",
                "status": "True",
                "lastTransitionTime": Utc::now(),
                "reason": "SyncSucceeded",
                "message": "Backup cron job is in sync"
            }]
        }
    });

    api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(status))
        .await?;

    Ok(())
}

/// Record a failed sync on the cluster status
pub async fn update_status_failed(
    cluster: &MysqlCluster,
    client: &Client,
    namespace: &str,
    error_message: &str,
) -> Result<()> {
    let name = cluster.name_any();
    let api: Api<MysqlCluster> = Api::namespaced(client.clone(), namespace);

    let status = json!({
        "status": {
            "phase": "Failed",
            "message": error_message,
            "lastSyncOutcome": "failed",
            "observedGeneration": cluster.metadata.generation,
            "conditions": [{
                "type": "Ready",
                "status": "False",
                "lastTransitionTime": Utc::now(),
                "reason": "SyncFailed",
                "message": error_message
            }]
        }
    });

    api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(status))
        .await?;

    Ok(())
}
