//! Kubernetes-backed CronJob store

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use kube::{
    api::{Api, PostParams},
    Client, ResourceExt,
};

use super::{CronJobStore, StoreError};

/// CronJob store backed by the Kubernetes API server.
///
/// `update` uses replace semantics: the API server compares the resource
/// version on the submitted object and answers 409 when it is stale.
#[derive(Clone)]
pub struct KubeCronJobStore {
    client: Client,
}

impl KubeCronJobStore {
    /// Create a new store using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<CronJob> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl CronJobStore for KubeCronJobStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CronJob>, StoreError> {
        self.api(namespace).get_opt(name).await.map_err(StoreError::from)
    }

    async fn create(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob, StoreError> {
        self.api(namespace)
            .create(&PostParams::default(), cron_job)
            .await
            .map_err(StoreError::from)
    }

    async fn update(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob, StoreError> {
        self.api(namespace)
            .replace(&cron_job.name_any(), &PostParams::default(), cron_job)
            .await
            .map_err(StoreError::from)
    }
}
