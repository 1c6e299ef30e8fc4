//! Integration tests for the backup CronJob reconciler
//!
//! These tests run the convergence pass against an in-memory CronJob store
//! that records operation counts, enforces optimistic concurrency, and can
//! inject write conflicts.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use kube::ResourceExt;

use mysql_backup_operator::config::OperatorConfig;
use mysql_backup_operator::crd::{MysqlCluster, MysqlClusterSpec};
use mysql_backup_operator::error::Error;
use mysql_backup_operator::reconcilers::backup_cron_job::{desired_cron_job, reconcile};
use mysql_backup_operator::reconcilers::ReconcileOutcome;
use mysql_backup_operator::store::{CronJobStore, StoreError};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String), CronJob>,
    next_version: u64,
    gets: u32,
    creates: u32,
    updates: u32,
    conflicts_to_inject: u32,
    deny_all: bool,
    hide_next_get: bool,
}

/// In-memory store with resource-version checked updates
#[derive(Default)]
struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn new() -> Self {
        Self::default()
    }

    /// Seed an object, assigning it a resource version
    fn seed(&self, cron_job: CronJob) {
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        let mut cron_job = cron_job;
        cron_job.metadata.resource_version = Some(state.next_version.to_string());
        let key = (
            cron_job.namespace().unwrap_or_default(),
            cron_job.name_any(),
        );
        state.objects.insert(key, cron_job);
    }

    fn stored(&self, namespace: &str, name: &str) -> Option<CronJob> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn inject_conflicts(&self, count: u32) {
        self.state.lock().unwrap().conflicts_to_inject = count;
    }

    fn deny_all(&self) {
        self.state.lock().unwrap().deny_all = true;
    }

    /// (gets, creates, updates)
    fn op_counts(&self) -> (u32, u32, u32) {
        let state = self.state.lock().unwrap();
        (state.gets, state.creates, state.updates)
    }
}

#[async_trait]
impl CronJobStore for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CronJob>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        if state.deny_all {
            return Err(StoreError::Unauthorized("access denied".to_string()));
        }
        if state.hide_next_get {
            state.hide_next_get = false;
            return Ok(None);
        }
        Ok(state
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        if state.deny_all {
            return Err(StoreError::Unauthorized("access denied".to_string()));
        }
        let key = (namespace.to_string(), cron_job.name_any());
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        state.next_version += 1;
        let mut stored = cron_job.clone();
        stored.metadata.resource_version = Some(state.next_version.to_string());
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        if state.conflicts_to_inject > 0 {
            state.conflicts_to_inject -= 1;
            return Err(StoreError::Conflict);
        }
        let key = (namespace.to_string(), cron_job.name_any());
        let Some(existing) = state.objects.get(&key) else {
            return Err(StoreError::NotFound);
        };
        if existing.metadata.resource_version != cron_job.metadata.resource_version {
            return Err(StoreError::Conflict);
        }
        state.next_version += 1;
        let mut stored = cron_job.clone();
        stored.metadata.resource_version = Some(state.next_version.to_string());
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

fn cluster(name: &str, schedule: Option<&str>, image: Option<&str>) -> MysqlCluster {
    let mut cluster = MysqlCluster::new(
        name,
        MysqlClusterSpec {
            backup_schedule: schedule.map(str::to_string),
            image: image.map(str::to_string),
            backup_job_labels: BTreeMap::new(),
            backup_job_annotations: BTreeMap::new(),
        },
    );
    cluster.metadata.namespace = Some("default".to_string());
    cluster.metadata.uid = Some(format!("uid-{}", name));
    cluster
}

fn first_container(cron_job: &CronJob) -> &k8s_openapi::api::core::v1::Container {
    cron_job
        .spec
        .as_ref()
        .unwrap()
        .job_template
        .spec
        .as_ref()
        .unwrap()
        .template
        .spec
        .as_ref()
        .unwrap()
        .containers
        .first()
        .unwrap()
}

// ============================================================================
// Opt-out
// ============================================================================

#[tokio::test]
async fn skipped_without_schedule_and_store_untouched() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let cluster = cluster("db1", None, Some("x"));

    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(outcome, ReconcileOutcome::Skipped));
    assert_eq!(store.op_counts(), (0, 0, 0));
}

#[tokio::test]
async fn empty_schedule_counts_as_opt_out() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let cluster = cluster("db1", Some(""), Some("x"));

    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(outcome, ReconcileOutcome::Skipped));
    assert_eq!(store.op_counts(), (0, 0, 0));
}

// ============================================================================
// Create path
// ============================================================================

#[tokio::test]
async fn creates_cron_job_when_absent() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let cluster = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));

    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(outcome, ReconcileOutcome::Created));
    assert_eq!(store.op_counts(), (1, 1, 0));

    let stored = store.stored("default", "db1-backup").expect("cron job stored");
    let spec = stored.spec.as_ref().unwrap();
    assert_eq!(spec.schedule, "0 2 * * *");
    assert_eq!(spec.concurrency_policy.as_deref(), Some("Forbid"));
    assert_eq!(
        spec.job_template.spec.as_ref().unwrap().backoff_limit,
        Some(3)
    );

    let container = first_container(&stored);
    assert_eq!(container.name, "schedule-backup");
    assert_eq!(container.image.as_deref(), Some("percona:5.7"));
    assert_eq!(
        container.args.as_ref().unwrap(),
        &vec![
            "schedule-backup".to_string(),
            "--namespace=default".to_string(),
            "db1".to_string()
        ]
    );

    let owner = &stored.metadata.owner_references.as_ref().unwrap()[0];
    assert_eq!(owner.kind, "MysqlCluster");
    assert_eq!(owner.name, "db1");
    assert_eq!(owner.uid, "uid-db1");
    assert_eq!(owner.controller, Some(true));
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let cluster = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));

    let first = reconcile(&store, &config, &cluster).await;
    let second = reconcile(&store, &config, &cluster).await;

    assert!(matches!(first, ReconcileOutcome::Created));
    assert!(matches!(second, ReconcileOutcome::Unchanged));
    let (_, creates, updates) = store.op_counts();
    assert_eq!(creates, 1);
    assert_eq!(updates, 0);
}

#[tokio::test]
async fn lost_create_race_converges_on_the_winner() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let cluster = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));

    // The object appears between the miss and the create, as if another
    // pass for the same owner won the race.
    {
        let desired = desired_cron_job(&cluster, &config).unwrap();
        let mut state = store.state.lock().unwrap();
        state.next_version += 1;
        let mut stored = desired;
        stored.metadata.resource_version = Some(state.next_version.to_string());
        state.objects.insert(("default".to_string(), "db1-backup".to_string()), stored);
        // First get pretends the object is not there yet
        state.hide_next_get = true;
    }

    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(outcome, ReconcileOutcome::Unchanged));
    let (gets, creates, updates) = store.op_counts();
    assert_eq!(gets, 2);
    assert_eq!(creates, 1);
    assert_eq!(updates, 0);
}

// ============================================================================
// Update path
// ============================================================================

#[tokio::test]
async fn unchanged_when_live_state_matches() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let cluster = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));
    store.seed(desired_cron_job(&cluster, &config).unwrap());

    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(outcome, ReconcileOutcome::Unchanged));
    let (_, creates, updates) = store.op_counts();
    assert_eq!(creates, 0);
    assert_eq!(updates, 0);
}

#[tokio::test]
async fn update_carries_new_image_and_preserves_foreign_fields() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();

    // Live object built for an older image, then mutated out-of-band by
    // other actors: suspended, a history limit, an injected annotation.
    let old = cluster("db1", Some("0 2 * * *"), Some("percona:5.6"));
    let mut live = desired_cron_job(&old, &config).unwrap();
    {
        let spec = live.spec.as_mut().unwrap();
        spec.suspend = Some(true);
        spec.successful_jobs_history_limit = Some(7);
    }
    live.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert("external.io/note".to_string(), "keep".to_string());
    store.seed(live);

    let cluster = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));
    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(outcome, ReconcileOutcome::Updated));
    let (_, creates, updates) = store.op_counts();
    assert_eq!(creates, 0);
    assert_eq!(updates, 1);

    let stored = store.stored("default", "db1-backup").unwrap();
    assert_eq!(
        first_container(&stored).image.as_deref(),
        Some("percona:5.7")
    );
    let spec = stored.spec.as_ref().unwrap();
    assert_eq!(spec.suspend, Some(true));
    assert_eq!(spec.successful_jobs_history_limit, Some(7));
    assert_eq!(
        stored.metadata.annotations.as_ref().unwrap()["external.io/note"],
        "keep"
    );
}

#[tokio::test]
async fn schedule_change_is_applied() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let old = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));
    store.seed(desired_cron_job(&old, &config).unwrap());

    let cluster = cluster("db1", Some("30 4 * * *"), Some("percona:5.7"));
    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(outcome, ReconcileOutcome::Updated));
    let stored = store.stored("default", "db1-backup").unwrap();
    assert_eq!(stored.spec.as_ref().unwrap().schedule, "30 4 * * *");
}

// ============================================================================
// Conflict handling
// ============================================================================

#[tokio::test]
async fn single_conflict_is_retried_and_succeeds() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let old = cluster("db1", Some("0 2 * * *"), Some("percona:5.6"));
    store.seed(desired_cron_job(&old, &config).unwrap());
    store.inject_conflicts(1);

    let cluster = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));
    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(outcome, ReconcileOutcome::Updated));
    let (gets, _, updates) = store.op_counts();
    assert_eq!(updates, 2);
    assert_eq!(gets, 2);
}

#[tokio::test]
async fn persistent_conflicts_exhaust_the_retry_budget() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    let old = cluster("db1", Some("0 2 * * *"), Some("percona:5.6"));
    store.seed(desired_cron_job(&old, &config).unwrap());
    store.inject_conflicts(u32::MAX);

    let cluster = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));
    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(
        outcome,
        ReconcileOutcome::Failed(Error::ConflictExhausted { .. })
    ));
    let (gets, _, updates) = store.op_counts();
    // One fetch and one rejected write per attempt
    assert_eq!(gets, updates);
    assert_eq!(updates, 4);
}

// ============================================================================
// Store errors
// ============================================================================

#[tokio::test]
async fn store_errors_surface_classified() {
    let store = MemoryStore::new();
    let config = OperatorConfig::default();
    store.deny_all();

    let cluster = cluster("db1", Some("0 2 * * *"), Some("percona:5.7"));
    let outcome = reconcile(&store, &config, &cluster).await;

    assert!(matches!(
        outcome,
        ReconcileOutcome::Failed(Error::Store(StoreError::Unauthorized(_)))
    ));
    assert_eq!(store.op_counts(), (1, 0, 0));
}
