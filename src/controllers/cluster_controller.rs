//! MysqlCluster controller
//!
//! Watches MysqlCluster resources and runs the backup CronJob sync for each
//! change notification and periodic resync.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use crate::controllers::Context;
use crate::crd::MysqlCluster;
use crate::error::{Error, Result};
use crate::metrics;
use crate::reconcilers::{backup_cron_job, ReconcileOutcome};
use crate::store::KubeCronJobStore;

/// Run the MysqlCluster controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<MysqlCluster> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("MysqlCluster CRD not installed: {}", e);
        return;
    }

    info!("Starting MysqlCluster controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled MysqlCluster"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS
                        .with_label_values(&["MysqlCluster"])
                        .inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %cluster.name_any(), namespace = cluster.namespace()))]
async fn reconcile(cluster: Arc<MysqlCluster>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&["MysqlCluster"])
        .start_timer();
    metrics::RECONCILIATIONS
        .with_label_values(&["MysqlCluster"])
        .inc();

    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());

    // Guard the core's preconditions before invoking it
    if let Err(e) = backup_cron_job::validate(&cluster) {
        warn!(error = %e, "Validation failed");
        backup_cron_job::update_status_failed(&cluster, &ctx.client, &namespace, &e.to_string())
            .await?;
        return Ok(Action::requeue(Duration::from_secs(300)));
    }

    let store = KubeCronJobStore::new(ctx.client.clone());

    // The core carries no timeout contract of its own; the deadline on the
    // whole pass is imposed here.
    let outcome = match timeout(
        ctx.config.reconcile_deadline,
        backup_cron_job::reconcile(&store, &ctx.config, &cluster),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => ReconcileOutcome::Failed(Error::DeadlineExceeded),
    };

    metrics::CRON_JOB_SYNCS
        .with_label_values(&[outcome.as_label(), &namespace])
        .inc();

    match outcome {
        ReconcileOutcome::Failed(err) => {
            backup_cron_job::update_status_failed(
                &cluster,
                &ctx.client,
                &namespace,
                &err.to_string(),
            )
            .await?;
            Err(err)
        }
        outcome => {
            info!(outcome = %outcome, "Backup cron job sync finished");
            backup_cron_job::update_status_synced(
                &cluster,
                &ctx.client,
                &namespace,
                outcome.as_label(),
            )
            .await?;
            Ok(Action::requeue(ctx.config.resync_interval))
        }
    }
}

/// Error policy for the controller
fn error_policy(cluster: Arc<MysqlCluster>, error: &Error, _ctx: Arc<Context>) -> Action {
    let name = cluster.name_any();
    error!(
        name = %name,
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    let requeue_duration = match error {
        Error::ConflictExhausted { .. } => Duration::from_secs(10),
        Error::Validation(_) | Error::Config(_) => Duration::from_secs(300),
        _ => Duration::from_secs(30),
    };

    Action::requeue(requeue_duration)
}
