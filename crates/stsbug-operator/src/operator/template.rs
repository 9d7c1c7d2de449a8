use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;
use stsbug_common::settings::{OperatorSettings, DEFAULT_IMAGE};

use super::crd::StsBug;

pub const POD_LABEL_KEY: &str = "pod";
pub const POD_LABEL_VALUE: &str = "mypod";
pub const CONTAINER_NAME: &str = "nginx";

/// Fixed shape of the StatefulSet kept for every owner.
#[derive(Debug, Clone, PartialEq)]
pub struct DependentTemplate {
    pub image: String,
    pub replicas: i32,
    pub labels: BTreeMap<String, String>,
}

impl Default for DependentTemplate {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            replicas: 1,
            labels: BTreeMap::from([(POD_LABEL_KEY.to_string(), POD_LABEL_VALUE.to_string())]),
        }
    }
}

impl From<&OperatorSettings> for DependentTemplate {
    fn from(settings: &OperatorSettings) -> Self {
        Self {
            image: settings.image.clone(),
            replicas: settings.replicas,
            ..Default::default()
        }
    }
}

impl DependentTemplate {
    pub fn desired_spec(&self, owner: &StsBug) -> StatefulSetSpec {
        let image = owner.spec.image.clone().unwrap_or_else(|| self.image.clone());
        let replicas = owner.spec.replicas.unwrap_or(self.replicas);

        StatefulSetSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(self.labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(self.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(image),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }
    }

    /// New dependent named after `owner`. The caller sets the controller
    /// reference.
    pub fn build(&self, owner: &StsBug) -> StatefulSet {
        StatefulSet {
            metadata: ObjectMeta {
                name: Some(owner.name_any()),
                namespace: owner.namespace(),
                ..Default::default()
            },
            spec: Some(self.desired_spec(owner)),
            ..Default::default()
        }
    }
}

/// Compares only the fields this controller writes, so values filled in
/// by API server defaulting never count as drift.
pub fn is_drifted(desired: &StatefulSetSpec, actual: &StatefulSetSpec) -> bool {
    if desired.replicas.unwrap_or(1) != actual.replicas.unwrap_or(1) {
        return true;
    }

    let actual_labels = actual
        .template
        .metadata
        .as_ref()
        .and_then(|meta| meta.labels.as_ref());
    let labels_match = desired
        .template
        .metadata
        .as_ref()
        .and_then(|meta| meta.labels.as_ref())
        .map_or(true, |wanted| {
            wanted
                .iter()
                .all(|(key, value)| actual_labels.and_then(|labels| labels.get(key)) == Some(value))
        });
    if !labels_match {
        return true;
    }

    match (desired.template.spec.as_ref(), actual.template.spec.as_ref()) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(wanted), Some(current)) => {
            wanted.priority_class_name != current.priority_class_name
                || wanted.containers.len() != current.containers.len()
                || wanted.containers.iter().any(|container| {
                    current
                        .containers
                        .iter()
                        .find(|candidate| candidate.name == container.name)
                        .map_or(true, |candidate| candidate.image != container.image)
                })
        }
    }
}

/// Copy of `actual` with the managed spec fields set from `desired`.
/// Metadata, including ownership and resourceVersion, is kept as-is; the
/// selector is immutable and left alone.
pub fn apply_to(actual: &StatefulSet, desired: &StatefulSetSpec) -> StatefulSet {
    let mut updated = actual.clone();
    let Some(spec) = updated.spec.as_mut() else {
        updated.spec = Some(desired.clone());
        return updated;
    };

    spec.replicas = desired.replicas;

    if let Some(wanted) = desired
        .template
        .metadata
        .as_ref()
        .and_then(|meta| meta.labels.as_ref())
    {
        spec.template
            .metadata
            .get_or_insert_with(ObjectMeta::default)
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(wanted.clone());
    }

    if let Some(wanted) = desired.template.spec.as_ref() {
        let pod = spec.template.spec.get_or_insert_with(PodSpec::default);
        pod.priority_class_name = wanted.priority_class_name.clone();
        pod.containers
            .retain(|current| wanted.containers.iter().any(|c| c.name == current.name));
        for container in &wanted.containers {
            match pod.containers.iter_mut().find(|c| c.name == container.name) {
                Some(current) => current.image = container.image.clone(),
                None => pod.containers.push(container.clone()),
            }
        }
    }

    updated
}
