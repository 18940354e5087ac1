//! The plan stage — timeout-bounded generation plus structural validation.
//!
//! A rejected plan is recoverable: the generator gets another attempt,
//! within a bounded budget, with the rejection logged. A collaborator
//! failure is not retried silently; it surfaces as a stage failure so the
//! run escalates instead of masking a broken planner.

use std::sync::Arc;
use std::time::Duration;

use hopdesk_actions::PlanValidator;
use hopdesk_core::{
    CollaboratorError, ConversationState, EscalationOrigin, PlanGenerator, PlanRecord, Stage,
};

use crate::controller::StageFailure;

pub struct PlanStage {
    generator: Arc<dyn PlanGenerator>,
    validator: PlanValidator,
    timeout: Duration,
    max_attempts: u32,
}

impl PlanStage {
    pub fn new(
        generator: Arc<dyn PlanGenerator>,
        validator: PlanValidator,
        timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            generator,
            validator,
            timeout,
            // A zero budget would make every hop fail before it starts.
            max_attempts: max_attempts.max(1),
        }
    }

    /// Produce a validated plan for the current hop.
    pub async fn run(
        &self,
        query: &str,
        state: &ConversationState,
    ) -> Result<PlanRecord, StageFailure> {
        let mut last_rejection = String::new();

        for attempt in 1..=self.max_attempts {
            let generated =
                match tokio::time::timeout(self.timeout, self.generator.generate(query, state))
                    .await
                {
                    Ok(Ok(plan)) => plan,
                    Ok(Err(err)) => return Err(self.failure(err.to_string())),
                    Err(_) => {
                        let err = CollaboratorError::Timeout {
                            stage: Stage::Plan,
                            timeout_secs: self.timeout.as_secs(),
                        };
                        return Err(self.failure(err.to_string()));
                    }
                };

            match self.validator.validate(&generated.actions) {
                Ok(()) => {
                    tracing::debug!(
                        hop = state.next_hop_index(),
                        actions = generated.actions.len(),
                        attempt,
                        "plan accepted"
                    );
                    return Ok(PlanRecord {
                        query: query.to_string(),
                        actions: generated.actions,
                        reasoning: generated.reasoning,
                    });
                }
                Err(rejection) => {
                    last_rejection = rejection.summary();
                    tracing::warn!(
                        hop = state.next_hop_index(),
                        attempt,
                        defects = rejection.defects.len(),
                        "plan rejected, regenerating"
                    );
                }
            }
        }

        Err(self.failure(format!(
            "plan rejected after {} attempt(s): {last_rejection}",
            self.max_attempts
        )))
    }

    fn failure(&self, detail: String) -> StageFailure {
        StageFailure {
            origin: EscalationOrigin::Plan,
            reason: format!("plan generation failed: {detail}"),
            detail: Some(detail),
        }
    }
}
