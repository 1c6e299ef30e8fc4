//! Object store boundary for managed CronJobs
//!
//! The reconciler only talks to the orchestration platform through this
//! trait: get/create/update keyed by namespace and name, with optimistic
//! concurrency carried in the object's `metadata.resourceVersion`.

mod kube_store;

pub use kube_store::KubeCronJobStore;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use thiserror::Error;

/// Classified store failure.
///
/// `AlreadyExists` and `Conflict` are transient races the reconciler recovers
/// from locally; the remaining variants are surfaced to the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object does not exist
    #[error("object not found")]
    NotFound,

    /// Create raced with a concurrent create of the same identity
    #[error("object already exists")]
    AlreadyExists,

    /// Update carried a stale resource version
    #[error("write conflict: resource version is stale")]
    Conflict,

    /// Request rejected by authn/authz
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// API server unreachable or overloaded
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Object rejected as invalid
    #[error("invalid object: {0}")]
    Invalid(String),

    /// Any other API failure
    #[error("API error: {0}")]
    Api(String),
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                404 => StoreError::NotFound,
                409 if resp.reason == "AlreadyExists" => StoreError::AlreadyExists,
                409 => StoreError::Conflict,
                401 | 403 => StoreError::Unauthorized(resp.message),
                422 => StoreError::Invalid(resp.message),
                500..=599 => StoreError::Unavailable(resp.message),
                _ => StoreError::Api(resp.message),
            },
            other => StoreError::Api(other.to_string()),
        }
    }
}

/// Store operations the reconciler depends on.
///
/// Implementations must provide per-object linearizable create/update and
/// reject updates carrying a stale resource version with
/// [`StoreError::Conflict`].
#[async_trait]
pub trait CronJobStore: Send + Sync {
    /// Fetch a CronJob, or None when it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CronJob>, StoreError>;

    /// Create a CronJob. Fails with [`StoreError::AlreadyExists`] when an
    /// object with the same identity was created concurrently.
    async fn create(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob, StoreError>;

    /// Replace a CronJob using the resource version carried on the object as
    /// the optimistic-concurrency token.
    async fn update(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob, StoreError>;
}
