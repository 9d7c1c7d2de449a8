use kube::{CustomResource, CustomResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::StsBugOperatorResult;

/// Declares that one StatefulSet named after this resource should exist.
/// Both fields are optional overrides of the operator's template.
#[derive(CustomResource, Serialize, Deserialize, Debug, PartialEq, Clone, Default, JsonSchema)]
#[kube(
    group = "demo.mortent.no",
    version = "v1",
    kind = "StsBug",
    plural = "stsbugs",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct StsBugSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

pub fn print_crd() -> StsBugOperatorResult<String> {
    Ok(serde_yaml::to_string(&StsBug::crd())?)
}
