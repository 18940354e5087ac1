//! The conversation state — the single record threaded through one run.
//!
//! Everything the run learns accumulates here: evidence maps grow, hops are
//! appended, and the pipeline trace fills in stage by stage. Nothing is ever
//! overwritten or removed, so a later hop's judgment is made over the union
//! of everything learned so far, never a regression.
//!
//! Each conversation owns its state exclusively for the lifetime of one run;
//! there is no cross-conversation shared mutable state in the core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::collaborator::ResponseType;
use crate::error::{Error, Result, ValidationError};
use crate::hop::Hop;
use crate::message::{latest_user_message, ConversationId, Message};

/// A single piece of retrieved evidence, traced to the hop and action that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Zero-based index of the hop whose gather stage produced this.
    pub hop: usize,

    /// The raw result payload.
    pub payload: serde_json::Value,
}

/// Where control goes next, plus the reason when the destination is
/// escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routing {
    pub next: NextStep,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            next: NextStep::Plan,
            reason: None,
        }
    }
}

/// The next step indicator kept on the state between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    Plan,
    Gather,
    Evaluate,
    Draft,
    Validate,
    Deliver,
    Escalate,
    Finalize,
    End,
}

/// Terminal status of a run, recorded in the ticketing system's custom
/// attribute so downstream human/automation workflows can pick it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    /// Reply validated and delivered.
    Success,
    /// Handed off to the human team (explicit request or hop exhaustion).
    RouteToTeam,
    /// The draft failed validation or the validator could not be reached.
    ValidationFailed,
    /// Draft generation failed.
    ResponseFailed,
    /// An unrecoverable internal or collaborator failure.
    Error,
    /// The reply was ready but delivery failed.
    MessageFailed,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Success => "success",
            TerminalStatus::RouteToTeam => "route_to_team",
            TerminalStatus::ValidationFailed => "validation_failed",
            TerminalStatus::ResponseFailed => "response_failed",
            TerminalStatus::Error => "error",
            TerminalStatus::MessageFailed => "message_failed",
        }
    }
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage that triggered an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationOrigin {
    /// Initialization failed (e.g. no user message in the transcript).
    Initialize,
    /// The plan collaborator could not produce a usable plan.
    Plan,
    /// The coverage judgment could not be produced.
    Coverage,
    /// Hop ceiling reached without sufficiency.
    Exhaustion,
    /// Draft generation failed.
    Draft,
    /// The draft failed validation or the validator failed.
    Validation,
    /// The user explicitly asked for a human.
    UserRequest,
}

impl EscalationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationOrigin::Initialize => "initialize",
            EscalationOrigin::Plan => "plan",
            EscalationOrigin::Coverage => "coverage",
            EscalationOrigin::Exhaustion => "exhaustion",
            EscalationOrigin::Draft => "draft",
            EscalationOrigin::Validation => "validation",
            EscalationOrigin::UserRequest => "user_request",
        }
    }
}

impl std::fmt::Display for EscalationOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Pipeline stage records ---

/// Record of the draft stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecord {
    pub text: String,
    pub response_type: ResponseType,
    pub duration_ms: u64,
}

/// Record of the validation stage. The raw verdict is kept even when
/// partial or malformed, so the audit trail shows what the validator
/// actually returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<serde_json::Value>,

    pub overall_passed: bool,

    /// Whether the audit note made it onto the conversation.
    pub note_added: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Record of the delivery stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub delivered: bool,
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Record of an escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// The triggering reason, used verbatim from the stage that escalated.
    pub reason: String,

    pub origin: EscalationOrigin,

    /// Full error detail for the human reviewer; never shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    pub note_added: bool,
}

/// Record of the finalize stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRecord {
    pub status: TerminalStatus,

    /// Whether the status attribute was set on the conversation.
    pub attribute_set: bool,

    /// Whether agent activity was suspended (conversation snoozed).
    pub suspended: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-stage records of the post-loop pipeline. Every stage records its
/// outcome even when it fails, so Finalize always has enough information to
/// close the conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineTrace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<DraftRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalize: Option<FinalizeRecord>,
}

/// The single mutable record threaded through one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// Opaque external identifier; immutable once set.
    pub conversation_id: ConversationId,

    /// The conversation transcript, supplied at initialization.
    /// Never mutated by the core.
    pub messages: Vec<Message>,

    /// User email, required by some retrieval actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,

    /// Accumulated tool evidence by action name. Entries append, never
    /// overwrite — a repeated action in a later hop adds to the list.
    #[serde(default)]
    pub tool_data: BTreeMap<String, Vec<Evidence>>,

    /// Accumulated documentation evidence, keyed by query + hop so repeated
    /// searches in different hops never collide.
    #[serde(default)]
    pub doc_data: BTreeMap<String, Evidence>,

    /// Completed hops; index = hop number. Append-only.
    #[serde(default)]
    pub hops: Vec<Hop>,

    /// Positive hop ceiling, set once at initialization.
    pub max_hops: usize,

    /// Current next-step indicator plus escalation reason.
    #[serde(default)]
    pub routing: Routing,

    /// Post-loop pipeline records.
    #[serde(default)]
    pub pipeline: PipelineTrace,

    /// Set exactly once, at the end of the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_outcome: Option<TerminalStatus>,
}

/// Default hop ceiling when the caller does not specify one.
pub const DEFAULT_MAX_HOPS: usize = 2;

impl ConversationState {
    /// Initialize state for a new run.
    ///
    /// `max_hops` must be positive; zero is a caller bug.
    pub fn initialize(
        conversation_id: ConversationId,
        messages: Vec<Message>,
        user_email: Option<String>,
        max_hops: usize,
    ) -> Result<Self> {
        if max_hops == 0 {
            return Err(Error::Config {
                message: "max_hops must be positive".into(),
            });
        }
        Ok(Self {
            conversation_id,
            messages,
            user_email,
            tool_data: BTreeMap::new(),
            doc_data: BTreeMap::new(),
            hops: Vec::new(),
            max_hops,
            routing: Routing::default(),
            pipeline: PipelineTrace::default(),
            terminal_outcome: None,
        })
    }

    /// The query this run answers: the most recent user message.
    pub fn query(&self) -> Option<&str> {
        latest_user_message(&self.messages)
    }

    /// Index the next hop will get.
    pub fn next_hop_index(&self) -> usize {
        self.hops.len()
    }

    /// Append a completed hop.
    ///
    /// The hop's index must equal the current hop count; anything else is a
    /// fatal caller bug (a duplicate or out-of-order hop would corrupt the
    /// audit history).
    pub fn append_hop(&mut self, hop: Hop) -> Result<()> {
        let expected = self.hops.len();
        if hop.index != expected {
            return Err(ValidationError::DuplicateHop {
                index: hop.index,
                expected,
            }
            .into());
        }
        self.hops.push(hop);
        Ok(())
    }

    /// Merge a successful tool payload into the accumulated evidence.
    /// Repeated actions append; prior evidence is never erased.
    pub fn merge_tool_data(&mut self, action_name: &str, hop: usize, payload: serde_json::Value) {
        self.tool_data
            .entry(action_name.to_string())
            .or_default()
            .push(Evidence { hop, payload });
    }

    /// Merge a documentation search result under its composite key.
    pub fn merge_doc_data(&mut self, query: &str, hop: usize, payload: serde_json::Value) {
        self.doc_data
            .insert(doc_key(query, hop), Evidence { hop, payload });
    }

    /// Action names that failed in the most recent hop, for the coverage
    /// judge (gaps for failed actions should suggest alternatives).
    pub fn last_hop_failed_actions(&self) -> Vec<String> {
        self.hops
            .last()
            .map(|h| h.failed_actions())
            .unwrap_or_default()
    }

    /// Total number of evidence entries across both maps.
    pub fn evidence_count(&self) -> usize {
        self.tool_data.values().map(Vec::len).sum::<usize>() + self.doc_data.len()
    }

    /// Update the routing indicator.
    pub fn set_routing(&mut self, next: NextStep, reason: Option<String>) {
        self.routing = Routing { next, reason };
    }
}

/// Composite key for documentation evidence: query plus 1-based hop number.
pub fn doc_key(query: &str, hop: usize) -> String {
    format!("{} (hop {})", query, hop + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hop::{CoverageRecord, GatherRecord, PlanRecord, RoutingDecision};

    fn make_state() -> ConversationState {
        ConversationState::initialize(
            ConversationId::from("conv-1"),
            vec![Message::user("what's my application status")],
            Some("user@example.com".into()),
            2,
        )
        .unwrap()
    }

    fn make_hop(index: usize) -> Hop {
        Hop {
            index,
            plan: PlanRecord {
                query: "q".into(),
                actions: vec![],
                reasoning: "r".into(),
            },
            gather: GatherRecord::empty(),
            coverage: CoverageRecord {
                score: 0.9,
                sufficient: true,
                gaps: vec![],
                reasoning: "enough".into(),
                decision: RoutingDecision::Respond,
            },
        }
    }

    #[test]
    fn initialize_rejects_zero_max_hops() {
        let result = ConversationState::initialize(
            ConversationId::from("conv-1"),
            vec![],
            None,
            0,
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn query_is_latest_user_message() {
        let state = make_state();
        assert_eq!(state.query(), Some("what's my application status"));
    }

    #[test]
    fn append_hop_rejects_duplicate_index() {
        let mut state = make_state();
        state.append_hop(make_hop(0)).unwrap();
        let err = state.append_hop(make_hop(0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DuplicateHop { index: 0, expected: 1 })
        ));
    }

    #[test]
    fn append_hop_rejects_skipped_index() {
        let mut state = make_state();
        let err = state.append_hop(make_hop(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DuplicateHop { index: 3, expected: 0 })
        ));
    }

    #[test]
    fn tool_data_accumulates_across_hops() {
        let mut state = make_state();
        state.merge_tool_data("get_applications", 0, serde_json::json!({"first": true}));
        state.merge_tool_data("get_applications", 1, serde_json::json!({"second": true}));

        let entries = &state.tool_data["get_applications"];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hop, 0);
        assert_eq!(entries[1].hop, 1);
        // Earlier evidence is untouched
        assert_eq!(entries[0].payload["first"], serde_json::json!(true));
    }

    #[test]
    fn doc_data_keys_are_unique_per_hop() {
        let mut state = make_state();
        state.merge_doc_data("visa rules", 0, serde_json::json!("a"));
        state.merge_doc_data("visa rules", 1, serde_json::json!("b"));

        assert_eq!(state.doc_data.len(), 2);
        assert!(state.doc_data.contains_key("visa rules (hop 1)"));
        assert!(state.doc_data.contains_key("visa rules (hop 2)"));
        assert_eq!(state.evidence_count(), 2);
    }

    #[test]
    fn state_serialization_roundtrip() {
        let mut state = make_state();
        state.merge_tool_data("get_applications", 0, serde_json::json!([1, 2]));
        state.append_hop(make_hop(0)).unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hops.len(), 1);
        assert_eq!(back.max_hops, 2);
        assert_eq!(back.tool_data["get_applications"].len(), 1);
    }
}
