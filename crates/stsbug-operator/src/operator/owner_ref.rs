use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::error::{StsBugOperatorError, StsBugOperatorResult};

/// Kind and apiVersion an owner reference must carry to count as ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerType {
    pub kind: String,
    pub api_version: String,
}

impl OwnerType {
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            kind: K::kind(&()).into_owned(),
            api_version: K::api_version(&()).into_owned(),
        }
    }

    /// Exact string comparison, no group/version normalization.
    pub fn matches(&self, reference: &OwnerReference) -> bool {
        reference.kind == self.kind && reference.api_version == self.api_version
    }
}

/// Returns the owner reference flagged as controller, if any.
pub fn controller_of<K: Resource>(resource: &K) -> Option<&OwnerReference> {
    resource
        .meta()
        .owner_references
        .as_ref()?
        .iter()
        .find(|owner| matches!(owner.controller, Some(true)))
}

/// Name of the controlling owner when it is of `owner_type`.
pub fn controller_name<K: Resource>(resource: &K, owner_type: &OwnerType) -> Option<String> {
    controller_of(resource)
        .filter(|owner| owner_type.matches(owner))
        .map(|owner| owner.name.clone())
}

/// Marks `owner` as the controller of `dependent`.
///
/// Fails when `dependent` is already controlled by a different object.
/// Setting the same owner twice is a no-op.
pub fn set_controller_reference<O, K>(owner: &O, dependent: &mut K) -> StsBugOperatorResult<()>
where
    O: Resource<DynamicType = ()>,
    K: Resource,
{
    let owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
        StsBugOperatorError::MissingOwnerUid(format!(
            "{}/{}",
            owner.namespace().unwrap_or_default(),
            owner.name_any()
        ))
    })?;

    if let Some(existing) = controller_of(dependent) {
        if existing.uid != owner_ref.uid {
            return Err(StsBugOperatorError::AlreadyOwned {
                dependent: dependent.name_any(),
                kind: existing.kind.clone(),
                owner: existing.name.clone(),
            });
        }
    }

    let references = dependent
        .meta_mut()
        .owner_references
        .get_or_insert_with(Vec::new);
    references.retain(|reference| reference.uid != owner_ref.uid);
    references.push(owner_ref);
    Ok(())
}
