use std::sync::Arc;

use async_trait::async_trait;
use cdp_adapter::CdpAdapter;
use demo_flow::{ActionExecutor, PortError};
use pagewatch_core_types::{StepResult, TestStep};
use serde_json::Value;
use tracing::{debug, warn};

/// Global the in-page executor installs itself under.
pub const EXECUTOR_GLOBAL: &str = "__pagewatchExecutor";

pub(crate) const PRESENCE_PROBE: &str =
    "typeof window.__pagewatchExecutor === 'object' && window.__pagewatchExecutor !== null \
     && typeof window.__pagewatchExecutor.executePlan === 'function'";

/// [`ActionExecutor`] that talks to `window.__pagewatchExecutor` through script evaluation.
///
/// The page object answers `executePlan(steps)` with an array of step results, possibly
/// shorter than the batch when it stops on a critical failure.
pub struct PageExecutor {
    adapter: Arc<CdpAdapter>,
}

impl PageExecutor {
    pub fn new(adapter: Arc<CdpAdapter>) -> Self {
        Self { adapter }
    }
}

pub(crate) fn plan_expression(steps: &[TestStep]) -> Result<String, PortError> {
    let payload = serde_json::to_string(steps)
        .map_err(|err| PortError::Executor(format!("encode steps: {err}")))?;
    Ok(format!("window.{EXECUTOR_GLOBAL}.executePlan({payload})"))
}

pub(crate) fn decode_results(value: Value) -> Result<Vec<StepResult>, PortError> {
    match value {
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other)
            .map_err(|err| PortError::Executor(format!("malformed executor reply: {err}"))),
    }
}

#[async_trait]
impl ActionExecutor for PageExecutor {
    async fn ping(&self) -> bool {
        match self.adapter.evaluate(PRESENCE_PROBE).await {
            Ok(value) => value.as_bool() == Some(true),
            Err(err) => {
                debug!(target: "bridge", %err, "executor ping failed");
                false
            }
        }
    }

    async fn execute_plan(&self, steps: &[TestStep]) -> Result<Vec<StepResult>, PortError> {
        let expression = plan_expression(steps)?;
        let reply = self
            .adapter
            .evaluate(&expression)
            .await
            .map_err(|err| PortError::Executor(err.to_string()))?;
        let results = decode_results(reply)?;
        if results.len() < steps.len() {
            warn!(
                target: "bridge",
                issued = steps.len(),
                returned = results.len(),
                "executor stopped early"
            );
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewatch_core_types::Action;
    use serde_json::json;

    #[test]
    fn plan_expression_embeds_wire_steps() {
        let steps = vec![TestStep::new(
            3,
            "Click buy",
            Action::Click {
                selector: "#buy".into(),
                selector_fallback: None,
            },
        )];
        let expression = plan_expression(&steps).unwrap();
        assert!(expression.starts_with("window.__pagewatchExecutor.executePlan(["));
        assert!(expression.contains(r##""selector":"#buy""##));
        assert!(expression.contains(r#""stepNumber":3"#));
    }

    #[test]
    fn decode_results_accepts_null_and_rejects_garbage() {
        assert!(decode_results(Value::Null).unwrap().is_empty());
        let ok = decode_results(json!([{
            "stepNumber": 1,
            "action": "click",
            "description": "Click buy",
            "passed": true,
            "duration": 12,
            "timestamp": 1777629600000u64
        }]))
        .unwrap();
        assert_eq!(ok.len(), 1);
        assert!(ok[0].passed);
        assert!(matches!(
            decode_results(json!({"oops": true})),
            Err(PortError::Executor(_))
        ));
    }
}
