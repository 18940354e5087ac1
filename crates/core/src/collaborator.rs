//! Collaborator traits — the opaque decision points at the system boundary.
//!
//! Plan, coverage, and draft generation are LLM-driven in production; the
//! response validator is a separate network service. The core's correctness
//! never depends on their internal reasoning, only on the typed contract
//! each must satisfy: shape, timeout, error reporting. Tests swap in
//! scripted implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::ActionCall;
use crate::error::CollaboratorError;
use crate::hop::DataGap;
use crate::state::ConversationState;

/// A plan proposed by the plan collaborator, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPlan {
    /// Ordered actions to execute this hop. May be empty.
    pub actions: Vec<ActionCall>,

    /// Why these actions were chosen.
    pub reasoning: String,
}

/// Produces the actions for one hop.
///
/// Receives the full accumulated state so it can see prior hops' failures
/// and coverage gaps and avoid wasted work.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        state: &ConversationState,
    ) -> std::result::Result<GeneratedPlan, CollaboratorError>;
}

/// The coverage judge's sufficiency verdict for one hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageJudgment {
    /// Advisory score in [0, 1].
    pub score: f64,

    /// The authoritative gate: true terminates the loop.
    pub sufficient: bool,

    /// Missing evidence, prioritized for the next plan.
    pub gaps: Vec<DataGap>,

    /// The judge's reasoning.
    pub reasoning: String,
}

/// Judges whether the accumulated evidence suffices to answer the query.
#[async_trait]
pub trait CoverageJudge: Send + Sync {
    async fn judge(
        &self,
        query: &str,
        state: &ConversationState,
        failed_actions: &[String],
    ) -> std::result::Result<CoverageJudgment, CollaboratorError>;
}

/// What kind of response the draft collaborator produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    /// A normal reply to be validated and delivered.
    Reply,
    /// The user asked for a human; hand off without second-guessing.
    RouteToTeam,
}

/// A drafted response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    pub response_type: ResponseType,
}

/// Produces the draft response over the full accumulated state.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn draft(
        &self,
        state: &ConversationState,
    ) -> std::result::Result<Draft, CollaboratorError>;
}

/// The external validator's verdict on a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// The only field routing cares about.
    pub overall_passed: bool,

    /// The full raw response body, recorded verbatim as an audit note.
    pub details: serde_json::Value,
}

/// Validates a draft reply against policy before delivery.
#[async_trait]
pub trait ResponseValidator: Send + Sync {
    async fn validate(
        &self,
        draft_text: &str,
        state: &ConversationState,
    ) -> std::result::Result<ValidationVerdict, CollaboratorError>;
}
