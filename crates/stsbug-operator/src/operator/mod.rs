pub mod crd;
pub mod index;
pub mod owner_ref;
pub mod reconcile;
pub mod store;
pub mod template;

#[cfg(test)]
mod testing;

use std::fmt::Debug;
use std::sync::Arc;

use crd::StsBug;
use futures::{future, StreamExt, TryStreamExt};
use index::{IndexConfig, ObjectKey, OwnershipIndex};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::{controller, watcher, Controller, WatchStreamExt};
use kube::{Api, Client, Resource};
use reconcile::ContextData;
use serde::de::DeserializeOwned;
use store::KubeStore;
use stsbug_common::settings::OperatorSettings;
use tracing::{debug, info, warn};

use crate::error::StsBugOperatorResult;

/// Everything `register` wires up, ready to run.
pub struct Registration {
    pub index: Arc<OwnershipIndex<StatefulSet>>,
    pub controller: Controller<StsBug>,
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Registers the controller-reference index on StatefulSets and a
/// controller with `StsBug` as primary and `StatefulSet` as owned type.
///
/// One StatefulSet watch feeds both: each event is applied to the index
/// before the controller sees the trigger it produces.
///
/// An index registration error is fatal: without the index there is no
/// safe way to count dependents.
pub fn register(client: Client, settings: &OperatorSettings) -> StsBugOperatorResult<Registration> {
    let index = Arc::new(OwnershipIndex::register(IndexConfig::controller::<StsBug>())?);

    let namespace = settings.namespace.as_deref();
    let owners: Api<StsBug> = scoped_api(&client, namespace);
    let dependents: Api<StatefulSet> = scoped_api(&client, namespace);

    let triggers = {
        let index = index.clone();
        watcher(dependents, watcher::Config::default())
            .default_backoff()
            .inspect_ok(move |event| index.apply(event.clone()))
            .touched_objects()
    };

    let controller = Controller::new(owners, watcher::Config::default())
        .owns_stream(triggers)
        .with_config(controller::Config::default().concurrency(settings.concurrency));

    Ok(Registration { index, controller })
}

pub async fn operator(settings: &OperatorSettings) -> StsBugOperatorResult<()> {
    let client = Client::try_default().await?;
    let Registration { index, controller } = register(client.clone(), settings)?;

    info!(
        namespace = settings.namespace.as_deref().unwrap_or("all"),
        index = index.name(),
        concurrency = settings.concurrency,
        "Starting StsBug controller"
    );

    let store = Arc::new(KubeStore::new(client, index));
    let context = Arc::new(ContextData::new(store, settings));

    controller
        .shutdown_on_signal()
        .run(reconcile::reconcile, reconcile::on_error, context.clone())
        .for_each(|recon_result| {
            match recon_result {
                Ok((owner, action)) => {
                    debug!(owner = %ObjectKey::from(&owner), ?action, "Reconciliation completed");
                }
                Err(controller::Error::ObjectNotFound(owner)) => {
                    let owner = ObjectKey::from(&owner);
                    debug!(%owner, "Owner left the cache");
                    context.forget(&owner);
                }
                Err(err) => {
                    warn!(error = %err, "Reconciliation failed");
                }
            }
            future::ready(())
        })
        .await;

    info!("StsBug controller stopped");
    Ok(())
}
