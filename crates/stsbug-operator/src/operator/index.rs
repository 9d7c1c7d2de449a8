use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::owner_ref::{controller_name, OwnerType};
use crate::error::{StsBugOperatorError, StsBugOperatorResult};

/// Name the controller-reference index is registered under.
pub const CONTROLLER_INDEX: &str = ".metadata.controller";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of<K: Resource>(resource: &K) -> Self {
        Self::new(resource.namespace().unwrap_or_default(), resource.name_any())
    }
}

impl<K: Resource> From<&ObjectRef<K>> for ObjectKey {
    fn from(object: &ObjectRef<K>) -> Self {
        Self::new(object.namespace.clone().unwrap_or_default(), object.name.clone())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub name: String,
    pub owner: OwnerType,
}

impl IndexConfig {
    /// Controller-reference index for owners of type `O`.
    pub fn controller<O: Resource<DynamicType = ()>>() -> Self {
        Self {
            name: CONTROLLER_INDEX.to_string(),
            owner: OwnerType::of::<O>(),
        }
    }

    fn validate(&self) -> StsBugOperatorResult<()> {
        let reason = if self.name.is_empty() {
            "index name is empty"
        } else if self.owner.kind.is_empty() {
            "owner kind is empty"
        } else if self.owner.api_version.is_empty() {
            "owner apiVersion is empty"
        } else {
            return Ok(());
        };
        Err(StsBugOperatorError::IndexRegistration {
            index: self.name.clone(),
            reason: reason.to_string(),
        })
    }
}

type Extractor<K> = dyn Fn(&K) -> Option<String> + Send + Sync;

/// Owner key to controlled objects, maintained from watch events.
///
/// Only the watch feed calls [`OwnershipIndex::apply`]; any number of
/// reconcilers may call [`OwnershipIndex::lookup`] concurrently.
pub struct OwnershipIndex<K> {
    name: String,
    extract: Box<Extractor<K>>,
    owners: DashMap<ObjectKey, BTreeMap<String, Arc<K>>>,
    dependents: DashMap<ObjectKey, ObjectKey>,
    relist: Mutex<Option<Vec<Arc<K>>>>,
    ready: watch::Sender<bool>,
}

impl<K: Resource + 'static> OwnershipIndex<K> {
    /// Indexes objects by the name of their controller when the controller
    /// is of `config.owner`'s type. Objects with no such controller are
    /// left out of every lookup.
    pub fn register(config: IndexConfig) -> StsBugOperatorResult<Self> {
        config.validate()?;
        let owner = config.owner;
        Ok(Self::with_extractor(config.name, move |obj: &K| {
            controller_name(obj, &owner)
        }))
    }

    pub fn with_extractor<F>(name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&K) -> Option<String> + Send + Sync + 'static,
    {
        let (ready, _) = watch::channel(false);
        Self {
            name: name.into(),
            extract: Box::new(extract),
            owners: DashMap::new(),
            dependents: DashMap::new(),
            relist: Mutex::new(None),
            ready,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookup(&self, namespace: &str, owner: &str) -> Vec<Arc<K>> {
        self.owners
            .get(&ObjectKey::new(namespace, owner))
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolves once the first full listing has been applied.
    pub async fn wait_until_ready(&self) -> StsBugOperatorResult<()> {
        let mut ready = self.ready.subscribe();
        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|err| anyhow::anyhow!("index {} closed: {}", self.name, err))?;
        Ok(())
    }

    pub fn apply(&self, event: watcher::Event<K>) {
        match event {
            watcher::Event::Apply(obj) => self.upsert(Arc::new(obj)),
            watcher::Event::Delete(obj) => self.remove(&ObjectKey::of(&obj)),
            watcher::Event::Init => {
                *self.relist_buffer() = Some(Vec::new());
            }
            watcher::Event::InitApply(obj) => {
                let obj = Arc::new(obj);
                let unbuffered = match self.relist_buffer().as_mut() {
                    Some(pending) => {
                        pending.push(obj);
                        None
                    }
                    None => Some(obj),
                };
                if let Some(obj) = unbuffered {
                    self.upsert(obj);
                }
            }
            watcher::Event::InitDone => {
                let listed = self.relist_buffer().take().unwrap_or_default();
                self.replace(listed);
                self.ready.send_replace(true);
            }
        }
    }

    fn relist_buffer(&self) -> std::sync::MutexGuard<'_, Option<Vec<Arc<K>>>> {
        self.relist.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn owner_key(&self, obj: &K) -> Option<ObjectKey> {
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| (self.extract)(obj)));
        match extracted {
            Ok(owner) => owner.map(|owner| ObjectKey::new(obj.namespace().unwrap_or_default(), owner)),
            Err(_) => {
                warn!(
                    index = %self.name,
                    object = %ObjectKey::of(obj),
                    "index extraction panicked, leaving object unindexed"
                );
                None
            }
        }
    }

    fn upsert(&self, obj: Arc<K>) {
        let key = ObjectKey::of(obj.as_ref());
        let owner = self.owner_key(&obj);

        let previous = self.dependents.get(&key).map(|entry| entry.value().clone());
        if let Some(previous) = previous.filter(|previous| Some(previous) != owner.as_ref()) {
            self.detach(&previous, &key.name);
        }

        match owner {
            Some(owner) => {
                debug!(index = %self.name, object = %key, owner = %owner, "indexed");
                self.owners
                    .entry(owner.clone())
                    .or_default()
                    .insert(key.name.clone(), obj);
                self.dependents.insert(key, owner);
            }
            None => {
                self.dependents.remove(&key);
            }
        }
    }

    fn remove(&self, key: &ObjectKey) {
        if let Some((_, owner)) = self.dependents.remove(key) {
            self.detach(&owner, &key.name);
        }
    }

    fn detach(&self, owner: &ObjectKey, name: &str) {
        if let Some(mut bucket) = self.owners.get_mut(owner) {
            bucket.remove(name);
        }
        self.owners.remove_if(owner, |_, bucket| bucket.is_empty());
    }

    /// Swaps in a complete listing. Owners present before and after are
    /// overwritten in place, so readers never see them empty mid-swap.
    fn replace(&self, listed: Vec<Arc<K>>) {
        let mut owners: HashMap<ObjectKey, BTreeMap<String, Arc<K>>> = HashMap::new();
        let mut dependents: HashMap<ObjectKey, ObjectKey> = HashMap::new();
        for obj in listed {
            let key = ObjectKey::of(obj.as_ref());
            if let Some(owner) = self.owner_key(&obj) {
                owners
                    .entry(owner.clone())
                    .or_default()
                    .insert(key.name.clone(), obj);
                dependents.insert(key, owner);
            }
        }

        self.dependents.retain(|key, _| dependents.contains_key(key));
        self.owners.retain(|key, _| owners.contains_key(key));
        for (owner, bucket) in owners {
            self.owners.insert(owner, bucket);
        }
        for (key, owner) in dependents {
            self.dependents.insert(key, owner);
        }
        debug!(index = %self.name, owners = self.owners.len(), "relisted");
    }
}
