//! Partitions a flat action sequence into execution rounds.

use pagewatch_core_types::TestStep;

/// A contiguous group of actions: driver-executed steps first, then one executor batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Round {
    pub background_steps: Vec<TestStep>,
    pub content_steps: Vec<TestStep>,
}

impl Round {
    pub fn is_empty(&self) -> bool {
        self.background_steps.is_empty() && self.content_steps.is_empty()
    }
}

/// Single left-to-right scan with two accumulators.
///
/// Navigation-class actions flush pending content (they destroy the in-page context) and join
/// the next round's background. A screenshot closes the round right after itself, so the capture
/// sees the page exactly as the preceding action left it.
pub fn group_step_rounds(steps: &[TestStep]) -> Vec<Round> {
    let mut rounds = Vec::new();
    let mut current = Round::default();

    for step in steps {
        if step.action.is_navigation() {
            if !current.content_steps.is_empty() {
                rounds.push(std::mem::take(&mut current));
            }
            current.background_steps.push(step.clone());
            continue;
        }

        current.content_steps.push(step.clone());
        if step.action.is_screenshot() {
            rounds.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        rounds.push(current);
    }
    rounds
}
