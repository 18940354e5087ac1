//! The coverage stage — sufficiency judgment and the hop-ceiling gate.
//!
//! The boolean `sufficient` flag is the authoritative gate; the score is
//! advisory. The ceiling is enforced here, at the evaluation: a run of
//! `max_hops` hops gets exactly `max_hops` coverage evaluations and never
//! an extra plan.

use std::sync::Arc;
use std::time::Duration;

use hopdesk_core::{
    CollaboratorError, ConversationState, CoverageJudge, CoverageJudgment, EscalationOrigin,
    RoutingDecision, Stage,
};

use crate::controller::StageFailure;

pub struct CoverageStage {
    judge: Arc<dyn CoverageJudge>,
    timeout: Duration,
}

impl CoverageStage {
    pub fn new(judge: Arc<dyn CoverageJudge>, timeout: Duration) -> Self {
        Self { judge, timeout }
    }

    /// Obtain the sufficiency judgment for the current hop.
    ///
    /// A judge that cannot produce a result is a hard failure of the hop,
    /// not a "gather more" signal: retrying a broken judge would burn the
    /// remaining hop budget for nothing.
    pub async fn run(
        &self,
        query: &str,
        state: &ConversationState,
        failed_actions: &[String],
    ) -> Result<CoverageJudgment, StageFailure> {
        let result = tokio::time::timeout(
            self.timeout,
            self.judge.judge(query, state, failed_actions),
        )
        .await;

        let mut judgment = match result {
            Ok(Ok(judgment)) => judgment,
            Ok(Err(err)) => return Err(Self::failure(err.to_string())),
            Err(_) => {
                let err = CollaboratorError::Timeout {
                    stage: Stage::Coverage,
                    timeout_secs: self.timeout.as_secs(),
                };
                return Err(Self::failure(err.to_string()));
            }
        };

        judgment.score = judgment.score.clamp(0.0, 1.0);
        for gap in &mut judgment.gaps {
            gap.priority = gap.priority.clamp(1, 5);
        }
        Ok(judgment)
    }

    /// Route based on the judgment and the remaining hop budget.
    pub fn decide(hop_index: usize, max_hops: usize, sufficient: bool) -> RoutingDecision {
        if sufficient {
            RoutingDecision::Respond
        } else if hop_index + 1 < max_hops {
            RoutingDecision::NextHop
        } else {
            RoutingDecision::Escalate
        }
    }

    fn failure(detail: String) -> StageFailure {
        StageFailure {
            origin: EscalationOrigin::Coverage,
            reason: "coverage analysis failed".into(),
            detail: Some(detail),
        }
    }
}
