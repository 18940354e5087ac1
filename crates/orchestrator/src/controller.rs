//! The hop loop controller.
//!
//! Drives the Planning → Gathering → Evaluating state machine until the
//! coverage judge declares the evidence sufficient, the hop budget runs
//! out, or a stage fails hard. A hop is appended to the state only once
//! fully built; the history never contains partial hops.

use std::sync::Arc;

use chrono::Utc;

use hopdesk_core::{
    ConversationState, CoverageRecord, DomainEvent, EscalationOrigin, EventBus, GatherRecord,
    Hop, PlanRecord, RoutingDecision,
};

use crate::coverage::CoverageStage;
use crate::gather::GatherStage;
use crate::plan::PlanStage;

/// An unrecoverable failure of a loop or pipeline stage, carrying what the
/// escalation note needs.
#[derive(Debug, Clone)]
pub struct StageFailure {
    /// The stage that failed.
    pub origin: EscalationOrigin,

    /// The triggering reason, recorded verbatim downstream.
    pub reason: String,

    /// Full error detail for the human reviewer.
    pub detail: Option<String>,
}

/// How the hop loop ended.
#[derive(Debug, Clone)]
pub enum LoopExit {
    /// Coverage declared the evidence sufficient; proceed to draft.
    Sufficient,

    /// The hop ceiling was reached without sufficiency.
    Exhausted { reason: String },

    /// A stage failed hard; escalate with its reason.
    Failed(StageFailure),
}

/// The loop's phases. The non-terminal phases carry the products of the
/// stages already completed for the current hop.
enum LoopPhase {
    Planning,
    Gathering(PlanRecord),
    Evaluating(PlanRecord, GatherRecord),
    Sufficient,
    Exhausted,
}

pub struct LoopController {
    plan: PlanStage,
    gather: GatherStage,
    coverage: CoverageStage,
    events: Arc<EventBus>,
}

impl LoopController {
    pub fn new(
        plan: PlanStage,
        gather: GatherStage,
        coverage: CoverageStage,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            plan,
            gather,
            coverage,
            events,
        }
    }

    /// Run the hop loop to completion.
    ///
    /// Exits after at most `state.max_hops` coverage evaluations. An
    /// exhausted run never plans an extra hop: the ceiling is enforced at
    /// the evaluation, not at the next plan.
    pub async fn run(&self, query: &str, state: &mut ConversationState) -> LoopExit {
        let mut phase = LoopPhase::Planning;

        loop {
            phase = match phase {
                LoopPhase::Planning => {
                    let hop_index = state.next_hop_index();
                    tracing::info!(
                        conversation_id = %state.conversation_id.0,
                        hop = hop_index,
                        max_hops = state.max_hops,
                        "starting hop"
                    );
                    match self.plan.run(query, state).await {
                        Ok(plan) => {
                            self.events.publish(DomainEvent::HopPlanned {
                                conversation_id: state.conversation_id.0.clone(),
                                hop: hop_index,
                                action_count: plan.actions.len(),
                                timestamp: Utc::now(),
                            });
                            LoopPhase::Gathering(plan)
                        }
                        Err(failure) => return LoopExit::Failed(failure),
                    }
                }

                LoopPhase::Gathering(plan) => {
                    let gather = self
                        .gather
                        .run(state.next_hop_index(), &plan, state)
                        .await;
                    LoopPhase::Evaluating(plan, gather)
                }

                LoopPhase::Evaluating(plan, gather) => {
                    let hop_index = state.next_hop_index();
                    let failed: Vec<String> = gather
                        .outcomes
                        .iter()
                        .filter(|o| !o.succeeded)
                        .map(|o| o.action_name.clone())
                        .collect();

                    let judgment = match self.coverage.run(query, state, &failed).await {
                        Ok(judgment) => judgment,
                        Err(failure) => return LoopExit::Failed(failure),
                    };

                    let decision =
                        CoverageStage::decide(hop_index, state.max_hops, judgment.sufficient);
                    self.events.publish(DomainEvent::CoverageEvaluated {
                        conversation_id: state.conversation_id.0.clone(),
                        hop: hop_index,
                        score: judgment.score,
                        sufficient: judgment.sufficient,
                        timestamp: Utc::now(),
                    });

                    let hop = Hop {
                        index: hop_index,
                        plan,
                        gather,
                        coverage: CoverageRecord {
                            score: judgment.score,
                            sufficient: judgment.sufficient,
                            gaps: judgment.gaps,
                            reasoning: judgment.reasoning,
                            decision,
                        },
                    };
                    if let Err(err) = state.append_hop(hop) {
                        return LoopExit::Failed(StageFailure {
                            origin: EscalationOrigin::Coverage,
                            reason: "internal state error".into(),
                            detail: Some(err.to_string()),
                        });
                    }

                    match decision {
                        RoutingDecision::Respond => LoopPhase::Sufficient,
                        RoutingDecision::NextHop => LoopPhase::Planning,
                        RoutingDecision::Escalate => LoopPhase::Exhausted,
                    }
                }

                LoopPhase::Sufficient => return LoopExit::Sufficient,

                LoopPhase::Exhausted => {
                    return LoopExit::Exhausted {
                        reason: format!("exceeded maximum hops ({})", state.max_hops),
                    };
                }
            };
        }
    }
}
