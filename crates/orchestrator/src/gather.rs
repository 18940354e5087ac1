//! The gather stage — concurrent, failure-isolated action execution.
//!
//! All planned actions run concurrently, each under its own timeout. A
//! failing or timed-out action becomes a recorded failure outcome; it never
//! aborts the other actions and never fails the hop. Successful payloads
//! merge into the evidence maps in plan order, so a hop's evidence is
//! deterministic regardless of completion order.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::Instant;

use hopdesk_core::{
    ActionCall, ActionError, ActionExecutor, ActionOutcome, ActionRegistry, ConversationState,
    DomainEvent, EventBus, GatherRecord, PlanRecord,
};

pub struct GatherStage {
    executor: Arc<dyn ActionExecutor>,
    registry: ActionRegistry,
    action_timeout: Duration,
    events: Arc<EventBus>,
}

impl GatherStage {
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        registry: ActionRegistry,
        action_timeout: Duration,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            executor,
            registry,
            action_timeout,
            events,
        }
    }

    /// Execute all of a hop's planned actions and merge the evidence.
    pub async fn run(
        &self,
        hop: usize,
        plan: &PlanRecord,
        state: &mut ConversationState,
    ) -> GatherRecord {
        if plan.actions.is_empty() {
            return GatherRecord::empty();
        }

        let started = Instant::now();

        let outcomes: Vec<ActionOutcome> =
            join_all(plan.actions.iter().map(|call| self.execute_one(call))).await;

        let total_duration_ms = started.elapsed().as_millis() as u64;

        // Merge in plan order, after all actions settle.
        for (call, outcome) in plan.actions.iter().zip(&outcomes) {
            self.events.publish(DomainEvent::ActionExecuted {
                action_name: outcome.action_name.clone(),
                success: outcome.succeeded,
                duration_ms: outcome.duration_ms,
                timestamp: Utc::now(),
            });

            let Some(payload) = outcome.payload.clone() else {
                continue;
            };
            if self.registry.is_doc_search(&call.name) {
                let query = call.str_param("query").unwrap_or_default();
                state.merge_doc_data(query, hop, payload);
            } else {
                state.merge_tool_data(&call.name, hop, payload);
            }
        }

        let record = GatherRecord::from_outcomes(outcomes, total_duration_ms);
        tracing::info!(
            hop,
            actions = record.outcomes.len(),
            success_rate = record.success_rate,
            duration_ms = record.total_duration_ms,
            "gather complete"
        );
        record
    }

    async fn execute_one(&self, call: &ActionCall) -> ActionOutcome {
        let started = Instant::now();
        let result = tokio::time::timeout(self.action_timeout, self.executor.execute(call)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(payload)) => ActionOutcome::success(&call.name, payload, duration_ms),
            Ok(Err(err)) => {
                tracing::warn!(action = %call.name, error = %err, "action failed");
                ActionOutcome::failure(&call.name, err.to_string(), duration_ms)
            }
            Err(_) => {
                let err = ActionError::Timeout {
                    action: call.name.clone(),
                    timeout_secs: self.action_timeout.as_secs(),
                };
                tracing::warn!(action = %call.name, error = %err, "action timed out");
                ActionOutcome::failure(&call.name, err.to_string(), duration_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hopdesk_actions::default_registry;
    use hopdesk_core::{ConversationId, Message};
    use serde_json::json;

    /// Scripted executor: succeeds for listed actions, fails for the rest,
    /// hangs for actions in `hang`.
    struct ScriptedExecutor {
        succeed: Vec<&'static str>,
        hang: Vec<&'static str>,
    }

    #[async_trait]
    impl ActionExecutor for ScriptedExecutor {
        async fn execute(&self, call: &ActionCall) -> Result<serde_json::Value, ActionError> {
            if self.hang.iter().any(|n| *n == call.name) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.succeed.iter().any(|n| *n == call.name) {
                Ok(json!({ "action": call.name }))
            } else {
                Err(ActionError::ExecutionFailed {
                    action: call.name.clone(),
                    reason: "upstream 500".into(),
                })
            }
        }
    }

    fn state() -> ConversationState {
        ConversationState::initialize(
            ConversationId("conv-1".into()),
            vec![Message::user("status?")],
            Some("user@example.com".into()),
            2,
        )
        .unwrap()
    }

    fn plan(actions: Vec<ActionCall>) -> PlanRecord {
        PlanRecord {
            query: "status?".into(),
            actions,
            reasoning: "test".into(),
        }
    }

    fn stage(executor: ScriptedExecutor) -> GatherStage {
        GatherStage::new(
            Arc::new(executor),
            default_registry(),
            Duration::from_millis(200),
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn merges_tool_and_doc_evidence() {
        let stage = stage(ScriptedExecutor {
            succeed: vec!["get_applications", "search_docs"],
            hang: vec![],
        });
        let mut state = state();
        let plan = plan(vec![
            ActionCall::new("get_applications").with_param("email", json!("user@example.com")),
            ActionCall::new("search_docs").with_param("query", json!("visa rules")),
        ]);

        let record = stage.run(0, &plan, &mut state).await;

        assert_eq!(record.success_rate, 1.0);
        assert_eq!(state.tool_data["get_applications"].len(), 1);
        assert!(state.doc_data.contains_key("visa rules (hop 1)"));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_rest() {
        let stage = stage(ScriptedExecutor {
            succeed: vec!["get_user_profile"],
            hang: vec![],
        });
        let mut state = state();
        let plan = plan(vec![
            ActionCall::new("get_applications").with_param("email", json!("user@example.com")),
            ActionCall::new("get_user_profile").with_param("email", json!("user@example.com")),
        ]);

        let record = stage.run(0, &plan, &mut state).await;

        assert_eq!(record.outcomes.len(), 2);
        assert!(!record.outcomes[0].succeeded);
        assert!(record.outcomes[1].succeeded);
        assert!((record.success_rate - 0.5).abs() < f64::EPSILON);
        // Only the success produced evidence
        assert!(!state.tool_data.contains_key("get_applications"));
        assert_eq!(state.tool_data["get_user_profile"].len(), 1);
    }

    #[tokio::test]
    async fn timeout_becomes_failure_outcome() {
        let stage = stage(ScriptedExecutor {
            succeed: vec!["get_applications"],
            hang: vec!["get_applications"],
        });
        let mut state = state();
        let plan = plan(vec![
            ActionCall::new("get_applications").with_param("email", json!("user@example.com")),
        ]);

        let record = stage.run(0, &plan, &mut state).await;

        assert!(!record.outcomes[0].succeeded);
        assert!(record.outcomes[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("timed out")));
        assert_eq!(state.evidence_count(), 0);
    }

    #[tokio::test]
    async fn empty_plan_yields_empty_gather() {
        let stage = stage(ScriptedExecutor {
            succeed: vec![],
            hang: vec![],
        });
        let mut state = state();
        let record = stage.run(0, &plan(vec![]), &mut state).await;
        assert!(record.outcomes.is_empty());
        assert_eq!(record.success_rate, 1.0);
    }

    #[tokio::test]
    async fn publishes_action_events() {
        let events = Arc::new(EventBus::default());
        let stage = GatherStage::new(
            Arc::new(ScriptedExecutor {
                succeed: vec!["get_applications"],
                hang: vec![],
            }),
            default_registry(),
            Duration::from_millis(200),
            events.clone(),
        );
        let mut rx = events.subscribe();
        let mut state = state();
        let plan = plan(vec![
            ActionCall::new("get_applications").with_param("email", json!("user@example.com")),
        ]);

        stage.run(0, &plan, &mut state).await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::ActionExecuted { success: true, .. }
        ));
    }
}
