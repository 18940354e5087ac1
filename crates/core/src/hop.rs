//! Hop records — the immutable history of one Plan → Gather → Coverage
//! iteration.
//!
//! A hop is assembled stage by stage by the loop controller and appended to
//! the conversation state only once complete. Appended hops are never
//! modified, so later analysis and audit notes can trust the history.

use serde::{Deserialize, Serialize};

use crate::action::ActionCall;

/// One complete iteration of the hop loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hop {
    /// Zero-based hop index; equals its position in `ConversationState::hops`.
    pub index: usize,

    /// What was planned this hop.
    pub plan: PlanRecord,

    /// Per-action execution outcomes.
    pub gather: GatherRecord,

    /// The sufficiency judgment and routing decision.
    pub coverage: CoverageRecord,
}

impl Hop {
    /// Action names that failed during this hop's gather stage.
    pub fn failed_actions(&self) -> Vec<String> {
        self.gather
            .outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| o.action_name.clone())
            .collect()
    }
}

/// The plan pursued in one hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    /// The query being pursued this hop.
    pub query: String,

    /// Ordered list of validated actions. Empty is valid — a greeting
    /// needs no retrieval.
    pub actions: Vec<ActionCall>,

    /// The planner's rationale.
    pub reasoning: String,
}

/// Execution results for all of a hop's planned actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatherRecord {
    /// One outcome per planned action, in plan order.
    pub outcomes: Vec<ActionOutcome>,

    /// Fraction of actions that succeeded. 1.0 for an empty plan.
    pub success_rate: f64,

    /// Wall-clock time for the whole gather stage.
    pub total_duration_ms: u64,
}

impl GatherRecord {
    /// Build a record from outcomes, computing the success rate.
    pub fn from_outcomes(outcomes: Vec<ActionOutcome>, total_duration_ms: u64) -> Self {
        let success_rate = if outcomes.is_empty() {
            1.0
        } else {
            outcomes.iter().filter(|o| o.succeeded).count() as f64 / outcomes.len() as f64
        };
        Self {
            outcomes,
            success_rate,
            total_duration_ms,
        }
    }

    /// An empty gather for a plan with no actions.
    pub fn empty() -> Self {
        Self::from_outcomes(Vec::new(), 0)
    }
}

/// The outcome of executing a single action.
///
/// A failing action is a recorded outcome, not an error — failure isolation
/// is mandatory, one failure never aborts the rest of the hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Name of the action that was executed.
    pub action_name: String,

    /// Whether execution succeeded.
    pub succeeded: bool,

    /// Result payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Error description on failure (timeouts included).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time for this action alone.
    pub duration_ms: u64,
}

impl ActionOutcome {
    pub fn success(action_name: impl Into<String>, payload: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            action_name: action_name.into(),
            succeeded: true,
            payload: Some(payload),
            error: None,
            duration_ms,
        }
    }

    pub fn failure(action_name: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            action_name: action_name.into(),
            succeeded: false,
            payload: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// The coverage evaluation recorded at the end of a hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRecord {
    /// Advisory sufficiency score in [0, 1]. Explanatory, never the gate.
    pub score: f64,

    /// The authoritative sufficiency flag.
    pub sufficient: bool,

    /// Identified evidence gaps, for the next plan to remediate.
    pub gaps: Vec<DataGap>,

    /// The judge's reasoning.
    pub reasoning: String,

    /// Where the loop went after this evaluation.
    pub decision: RoutingDecision,
}

/// A specific piece of missing evidence identified by the coverage judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataGap {
    /// Kind of missing data (e.g. "application_details", "user_profile").
    pub kind: String,

    /// What is missing, in prose.
    pub description: String,

    /// Remediation priority, 1 (highest) to 5 (lowest).
    pub priority: u8,

    /// Alternative actions the next plan should consider. Gaps caused by a
    /// failed action should suggest alternatives, not blind retries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
}

/// Routing decision derived from a coverage evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Evidence insufficient, hop budget remains: plan another hop.
    NextHop,
    /// Evidence sufficient: proceed to the draft stage.
    Respond,
    /// Hop budget exhausted without sufficiency: hand off to a human.
    Escalate,
}
