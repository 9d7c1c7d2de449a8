use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};

use super::crd::StsBug;
use super::index::{ObjectKey, OwnershipIndex};
use crate::error::{StsBugOperatorError, StsBugOperatorResult};

pub const FIELD_MANAGER: &str = "stsbug-operator";

/// Cluster reads and writes the reconciler depends on.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// `Ok(None)` when the owner does not exist.
    async fn get_owner(&self, key: &ObjectKey) -> StsBugOperatorResult<Option<StsBug>>;

    /// StatefulSets whose controller reference names `owner`. Waits for
    /// the first full listing when the index has not synced yet.
    async fn list_dependents(&self, owner: &ObjectKey) -> StsBugOperatorResult<Vec<Arc<StatefulSet>>>;

    async fn create_dependent(&self, dependent: &StatefulSet) -> StsBugOperatorResult<StatefulSet>;

    /// Must carry the last observed `metadata.resourceVersion`.
    async fn update_dependent(&self, dependent: &StatefulSet) -> StsBugOperatorResult<StatefulSet>;
}

pub struct KubeStore {
    client: Client,
    index: Arc<OwnershipIndex<StatefulSet>>,
}

impl KubeStore {
    pub fn new(client: Client, index: Arc<OwnershipIndex<StatefulSet>>) -> Self {
        Self { client, index }
    }

    fn dependents_api(&self, dependent: &StatefulSet) -> StsBugOperatorResult<Api<StatefulSet>> {
        let namespace = dependent
            .namespace()
            .ok_or_else(|| anyhow::anyhow!("statefulset {} has no namespace", dependent.name_any()))?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

/// Splits HTTP 409 into `AlreadyExists` and `Conflict`.
fn classify(error: kube::Error, dependent: &StatefulSet) -> StsBugOperatorError {
    match error {
        kube::Error::Api(response) if response.code == 409 => {
            let namespace = dependent.namespace().unwrap_or_default();
            let name = dependent.name_any();
            if response.reason == "AlreadyExists" {
                StsBugOperatorError::AlreadyExists { namespace, name }
            } else {
                StsBugOperatorError::Conflict {
                    namespace,
                    name,
                    message: response.message,
                }
            }
        }
        other => other.into(),
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_owner(&self, key: &ObjectKey) -> StsBugOperatorResult<Option<StsBug>> {
        let owners: Api<StsBug> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(owners.get_opt(&key.name).await?)
    }

    async fn list_dependents(&self, owner: &ObjectKey) -> StsBugOperatorResult<Vec<Arc<StatefulSet>>> {
        self.index.wait_until_ready().await?;
        Ok(self.index.lookup(&owner.namespace, &owner.name))
    }

    async fn create_dependent(&self, dependent: &StatefulSet) -> StsBugOperatorResult<StatefulSet> {
        self.dependents_api(dependent)?
            .create(&post_params(), dependent)
            .await
            .map_err(|err| classify(err, dependent))
    }

    async fn update_dependent(&self, dependent: &StatefulSet) -> StsBugOperatorResult<StatefulSet> {
        self.dependents_api(dependent)?
            .replace(&dependent.name_any(), &post_params(), dependent)
            .await
            .map_err(|err| classify(err, dependent))
    }
}
