//! Reconcilers for the MySQL Backup Operator
//!
//! One reconciler per managed resource. A reconciler runs a single
//! convergence pass and classifies what it did.

pub mod backup_cron_job;

use std::fmt;

use crate::error::Error;

/// Outcome of one reconcile pass.
///
/// Constructed fresh per pass and consumed for logging, metrics, and status
/// reporting only.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The managed object did not exist and was created
    Created,
    /// The managed object diverged from the desired spec and was patched
    Updated,
    /// The managed object already matched the desired spec
    Unchanged,
    /// Desired state is intentionally absent; nothing was fetched or written
    Skipped,
    /// The pass could not converge
    Failed(Error),
}

impl ReconcileOutcome {
    /// Stable lowercase label, used for metrics and status reporting
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Created => "created",
            ReconcileOutcome::Updated => "updated",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Skipped => "skipped",
            ReconcileOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Failed(err) => write!(f, "failed: {}", err),
            other => f.write_str(other.as_label()),
        }
    }
}
