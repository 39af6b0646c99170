use serde::{Deserialize, Serialize};

use crate::step::TestStep;

/// A candidate interactive element discovered outside the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationTarget {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_fallback: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default)]
    pub may_navigate: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationMode {
    #[default]
    Smart,
    Exhaustive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationPlan {
    pub base_url: String,
    #[serde(default)]
    pub mode: ExplorationMode,
    pub targets: Vec<ExplorationTarget>,
    #[serde(default)]
    pub form_fill_steps: Vec<TestStep>,
}
