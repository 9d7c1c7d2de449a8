//! In-memory [`ClusterStore`] with resourceVersion checks and a watch
//! feed into its own ownership index.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::runtime::watcher;

use super::crd::{StsBug, StsBugSpec};
use super::index::{IndexConfig, ObjectKey, OwnershipIndex};
use super::owner_ref::set_controller_reference;
use super::store::ClusterStore;
use super::template::DependentTemplate;
use crate::error::{StsBugOperatorError, StsBugOperatorResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create(ObjectKey),
    Update {
        key: ObjectKey,
        resource_version: Option<String>,
    },
}

#[derive(Default)]
struct State {
    owners: BTreeMap<ObjectKey, StsBug>,
    dependents: BTreeMap<ObjectKey, StatefulSet>,
    writes: Vec<Write>,
    version: u64,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
    index: OwnershipIndex<StatefulSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_state(State::default())
    }

    fn with_state(state: State) -> Self {
        let index = OwnershipIndex::register(IndexConfig::controller::<StsBug>()).unwrap();
        index.apply(watcher::Event::Init);
        for dependent in state.dependents.values() {
            index.apply(watcher::Event::InitApply(dependent.clone()));
        }
        index.apply(watcher::Event::InitDone);
        Self {
            state: Mutex::new(state),
            index,
        }
    }

    /// Same store contents, fresh index, no recorded writes.
    pub fn restarted(&self) -> Self {
        let state = self.state.lock().unwrap();
        Self::with_state(State {
            owners: state.owners.clone(),
            dependents: state.dependents.clone(),
            writes: Vec::new(),
            version: state.version,
        })
    }

    pub fn add_owner(&self, namespace: &str, name: &str, spec: StsBugSpec) -> StsBug {
        let mut owner = StsBug::new(name, spec);
        owner.metadata.namespace = Some(namespace.to_string());
        owner.metadata.uid = Some(format!("uid-{namespace}-{name}"));
        let mut state = self.state.lock().unwrap();
        owner.metadata.resource_version = Some(state.next_version());
        state.owners.insert(ObjectKey::new(namespace, name), owner.clone());
        owner
    }

    pub fn remove_owner(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .owners
            .remove(&ObjectKey::new(namespace, name));
    }

    /// Write by some other actor; delivered to the index right away.
    pub fn put_dependent(&self, mut dependent: StatefulSet) -> StatefulSet {
        let mut state = self.state.lock().unwrap();
        dependent.metadata.resource_version = Some(state.next_version());
        state
            .dependents
            .insert(ObjectKey::of(&dependent), dependent.clone());
        self.index.apply(watcher::Event::Apply(dependent.clone()));
        dependent
    }

    /// Bumps the stored resourceVersion without a watch event, leaving
    /// the index one version behind.
    pub fn touch_unobserved(&self, key: &ObjectKey) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        if let Some(dependent) = state.dependents.get_mut(key) {
            dependent.metadata.resource_version = Some(version);
        }
    }

    pub fn dependent(&self, namespace: &str, name: &str) -> Option<StatefulSet> {
        self.state
            .lock()
            .unwrap()
            .dependents
            .get(&ObjectKey::new(namespace, name))
            .cloned()
    }

    pub fn dependents(&self) -> Vec<StatefulSet> {
        self.state.lock().unwrap().dependents.values().cloned().collect()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }
}

/// A dependent built from `template` and controlled by `owner`.
pub fn owned_dependent(template: &DependentTemplate, owner: &StsBug, name: &str) -> StatefulSet {
    let mut dependent = template.build(owner);
    dependent.metadata.name = Some(name.to_string());
    set_controller_reference(owner, &mut dependent).unwrap();
    dependent
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_owner(&self, key: &ObjectKey) -> StsBugOperatorResult<Option<StsBug>> {
        Ok(self.state.lock().unwrap().owners.get(key).cloned())
    }

    async fn list_dependents(&self, owner: &ObjectKey) -> StsBugOperatorResult<Vec<Arc<StatefulSet>>> {
        Ok(self.index.lookup(&owner.namespace, &owner.name))
    }

    async fn create_dependent(&self, dependent: &StatefulSet) -> StsBugOperatorResult<StatefulSet> {
        let key = ObjectKey::of(dependent);
        let created = {
            let mut state = self.state.lock().unwrap();
            if state.dependents.contains_key(&key) {
                return Err(StsBugOperatorError::AlreadyExists {
                    namespace: key.namespace,
                    name: key.name,
                });
            }
            let mut created = dependent.clone();
            created.metadata.resource_version = Some(state.next_version());
            state.dependents.insert(key.clone(), created.clone());
            state.writes.push(Write::Create(key));
            created
        };
        self.index.apply(watcher::Event::Apply(created.clone()));
        Ok(created)
    }

    async fn update_dependent(&self, dependent: &StatefulSet) -> StsBugOperatorResult<StatefulSet> {
        let key = ObjectKey::of(dependent);
        let updated = {
            let mut state = self.state.lock().unwrap();
            let stored = state
                .dependents
                .get(&key)
                .and_then(|current| current.metadata.resource_version.clone());
            if stored.is_none() || stored != dependent.metadata.resource_version {
                return Err(StsBugOperatorError::Conflict {
                    namespace: key.namespace,
                    name: key.name,
                    message: "the object has been modified".to_string(),
                });
            }
            state.writes.push(Write::Update {
                key: key.clone(),
                resource_version: dependent.metadata.resource_version.clone(),
            });
            let mut updated = dependent.clone();
            updated.metadata.resource_version = Some(state.next_version());
            state.dependents.insert(key, updated.clone());
            updated
        };
        self.index.apply(watcher::Event::Apply(updated.clone()));
        Ok(updated)
    }
}
