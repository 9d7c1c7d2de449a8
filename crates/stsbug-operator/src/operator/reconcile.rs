use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use stsbug_common::settings::OperatorSettings;
use tracing::{debug, info, instrument, warn};

use super::crd::StsBug;
use super::index::ObjectKey;
use super::owner_ref::set_controller_reference;
use super::store::ClusterStore;
use super::template::{apply_to, is_drifted, DependentTemplate};
use crate::error::{StsBugOperatorError, StsBugOperatorResult};

/// What a single pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Owner is gone; its dependents are left to garbage collection.
    OwnerGone,
    Created,
    Updated,
    InSync,
}

/// One reconciliation of `key`. Reads everything from `store` and issues at
/// most one write.
pub async fn reconcile_key<S>(
    key: &ObjectKey,
    store: &S,
    template: &DependentTemplate,
) -> StsBugOperatorResult<Outcome>
where
    S: ClusterStore + ?Sized,
{
    let Some(owner) = store.get_owner(key).await? else {
        return Ok(Outcome::OwnerGone);
    };

    let dependents = store.list_dependents(key).await?;
    match dependents.as_slice() {
        [] => {
            let mut dependent = template.build(&owner);
            set_controller_reference(&owner, &mut dependent)?;
            store.create_dependent(&dependent).await?;
            Ok(Outcome::Created)
        }
        [current] => {
            let desired = template.desired_spec(&owner);
            match current.spec.as_ref() {
                Some(actual) if !is_drifted(&desired, actual) => Ok(Outcome::InSync),
                _ => {
                    store.update_dependent(&apply_to(current, &desired)).await?;
                    Ok(Outcome::Updated)
                }
            }
        }
        many => Err(StsBugOperatorError::MultipleDependents {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            count: many.len(),
        }),
    }
}

pub struct ContextData {
    store: Arc<dyn ClusterStore>,
    template: DependentTemplate,
    timeout: Duration,
    error_requeue: Duration,
    max_error_requeue: Duration,
    error_counts: DashMap<ObjectKey, u32>,
}

impl ContextData {
    pub fn new(store: Arc<dyn ClusterStore>, settings: &OperatorSettings) -> Self {
        Self {
            store,
            template: DependentTemplate::from(settings),
            timeout: settings.reconcile_timeout(),
            error_requeue: settings.error_requeue(),
            max_error_requeue: settings.max_error_requeue(),
            error_counts: DashMap::new(),
        }
    }

    /// Drops retry state for an owner that no longer exists.
    pub fn forget(&self, key: &ObjectKey) {
        self.error_counts.remove(key);
    }
}

#[instrument(skip(owner, context), fields(namespace = owner.namespace(), name = %owner.name_any()))]
pub async fn reconcile(owner: Arc<StsBug>, context: Arc<ContextData>) -> StsBugOperatorResult<Action> {
    let key = ObjectKey::of(owner.as_ref());
    let pass = reconcile_key(&key, context.store.as_ref(), &context.template);
    let outcome = tokio::time::timeout(context.timeout, pass).await??;

    match outcome {
        Outcome::Created => info!("created statefulset"),
        Outcome::Updated => info!("updated drifted statefulset"),
        Outcome::InSync => debug!("statefulset in sync"),
        Outcome::OwnerGone => debug!("owner no longer exists"),
    }

    context.error_counts.remove(&key);
    Ok(Action::await_change())
}

pub fn on_error(owner: Arc<StsBug>, error: &StsBugOperatorError, context: Arc<ContextData>) -> Action {
    let key = ObjectKey::of(owner.as_ref());
    let Some(base) = error.requeue_delay(context.error_requeue) else {
        warn!(owner = %key, error = %error, "reconciliation needs manual intervention");
        return Action::await_change();
    };

    let attempts = {
        let mut count = context.error_counts.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    };
    let delay = backoff(base, context.max_error_requeue, attempts);
    warn!(owner = %key, error = %error, attempts, ?delay, "reconciliation failed, requeueing");
    Action::requeue(delay)
}

/// `base * 2^(attempts - 1)`, capped at `max`.
fn backoff(base: Duration, max: Duration, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    base.saturating_mul(1 << exponent).min(max)
}
