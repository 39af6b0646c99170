//! Abstract actions supplied by a plan or synthesized by the engine.

use serde::{Deserialize, Serialize};

/// Step number used for steps the engine synthesizes itself (recovery navigations and the like).
pub const ENGINE_STEP: u32 = 0;

/// One action of a plan.
///
/// The wire form keeps the flat shape the in-page executor understands:
/// `{"stepNumber": 3, "action": "click", "description": "...", "selector": "#go"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    pub step_number: u32,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub action: Action,
}

impl TestStep {
    pub fn new(step_number: u32, description: impl Into<String>, action: Action) -> Self {
        Self {
            step_number,
            description: description.into(),
            action,
        }
    }

    /// Direct navigation issued by the engine while recovering from a side effect.
    pub fn recovery_navigate(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(
            ENGINE_STEP,
            format!("Navigate back to {url}"),
            Action::Navigate { target: url },
        )
    }

    pub fn kind(&self) -> &'static str {
        self.action.kind()
    }
}

/// Action kinds. Each variant carries only the fields its kind uses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    Navigate {
        target: String,
    },
    GoBack,
    Click {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector_fallback: Option<String>,
    },
    Fill {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector_fallback: Option<String>,
        value: String,
    },
    Select {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector_fallback: Option<String>,
        value: String,
    },
    Hover {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector_fallback: Option<String>,
    },
    PressKey {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    Wait {
        /// Milliseconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    Assert {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector_fallback: Option<String>,
        assertion_type: AssertionType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected: Option<String>,
    },
    Screenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    DismissModal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::GoBack => "go_back",
            Action::Click { .. } => "click",
            Action::Fill { .. } => "fill",
            Action::Select { .. } => "select",
            Action::Hover { .. } => "hover",
            Action::PressKey { .. } => "press_key",
            Action::Scroll { .. } => "scroll",
            Action::Wait { .. } => "wait",
            Action::Assert { .. } => "assert",
            Action::Screenshot { .. } => "screenshot",
            Action::DismissModal { .. } => "dismiss_modal",
        }
    }

    /// Navigation-class actions destroy the in-page execution context.
    pub fn is_navigation(&self) -> bool {
        matches!(self, Action::Navigate { .. } | Action::GoBack)
    }

    pub fn is_screenshot(&self) -> bool {
        matches!(self, Action::Screenshot { .. })
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            Action::Click { selector, .. }
            | Action::Fill { selector, .. }
            | Action::Select { selector, .. }
            | Action::Hover { selector, .. } => Some(selector),
            Action::PressKey { selector, .. }
            | Action::Scroll { selector }
            | Action::Wait { selector, .. }
            | Action::Assert { selector, .. } => selector.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionType {
    Visible,
    Hidden,
    Exists,
    TextContains,
    ValueEquals,
    UrlContains,
    /// Element is present, visible, enabled and not covered.
    Actionable,
}
