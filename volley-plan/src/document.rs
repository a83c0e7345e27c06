//! Serde model of plan files

use serde::Deserialize;
use serde_yaml::Mapping;

fn enabled() -> bool {
    true
}

/// A whole plan file; keys other than the ones below are test plan properties
#[derive(Debug, Clone, Deserialize)]
pub struct PlanDocument {
    #[serde(default)]
    pub name: Option<String>,
    /// Plan-wide variables, set in every thread before its first iteration
    #[serde(default)]
    pub variables: Mapping,
    #[serde(default)]
    pub children: Vec<NodeDocument>,
    #[serde(flatten)]
    pub properties: Mapping,
}

/// One element of the tree
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDocument {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub children: Vec<NodeDocument>,
    #[serde(flatten)]
    pub properties: Mapping,
}

/// Content of an included file
#[derive(Debug, Clone, Deserialize)]
pub struct FragmentDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeDocument>,
}

impl PlanDocument {
    pub fn from_yaml(source: &str) -> crate::Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }
}
