//! End-to-end runs of the support agent with scripted collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use hopdesk_core::{
    ActionCall, ActionError, ActionExecutor, CollaboratorError, ConversationId,
    ConversationState, CoverageJudge, CoverageJudgment, Draft, DraftGenerator, EscalationOrigin,
    GeneratedPlan, Message, PlanGenerator, ResponseType, ResponseValidator, Stage,
    TerminalStatus, Ticketing, TicketingError, ValidationVerdict,
};
use hopdesk_orchestrator::SupportAgent;

// --- Scripted collaborators ---

struct ScriptedPlanner {
    plans: Mutex<Vec<GeneratedPlan>>,
    calls: AtomicUsize,
}

impl ScriptedPlanner {
    fn new(plans: Vec<GeneratedPlan>) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(plans),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanGenerator for ScriptedPlanner {
    async fn generate(
        &self,
        _query: &str,
        _state: &ConversationState,
    ) -> Result<GeneratedPlan, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut plans = self.plans.lock().unwrap();
        if plans.is_empty() {
            panic!("planner called more times than scripted");
        }
        Ok(plans.remove(0))
    }
}

struct ScriptedJudge {
    judgments: Mutex<Vec<Result<CoverageJudgment, CollaboratorError>>>,
}

impl ScriptedJudge {
    fn new(judgments: Vec<Result<CoverageJudgment, CollaboratorError>>) -> Arc<Self> {
        Arc::new(Self {
            judgments: Mutex::new(judgments),
        })
    }
}

#[async_trait]
impl CoverageJudge for ScriptedJudge {
    async fn judge(
        &self,
        _query: &str,
        _state: &ConversationState,
        _failed_actions: &[String],
    ) -> Result<CoverageJudgment, CollaboratorError> {
        self.judgments.lock().unwrap().remove(0)
    }
}

struct FixedDrafter {
    result: Result<Draft, CollaboratorError>,
}

impl FixedDrafter {
    fn reply(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(Draft {
                text: text.into(),
                response_type: ResponseType::Reply,
            }),
        })
    }

    fn route_to_team() -> Arc<Self> {
        Arc::new(Self {
            result: Ok(Draft {
                text: String::new(),
                response_type: ResponseType::RouteToTeam,
            }),
        })
    }

    fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(CollaboratorError::MalformedResponse {
                stage: Stage::Draft,
                detail: detail.into(),
            }),
        })
    }
}

#[async_trait]
impl DraftGenerator for FixedDrafter {
    async fn draft(&self, _state: &ConversationState) -> Result<Draft, CollaboratorError> {
        self.result.clone()
    }
}

struct FixedValidator {
    result: Result<ValidationVerdict, CollaboratorError>,
    calls: AtomicUsize,
}

impl FixedValidator {
    fn passing() -> Arc<Self> {
        Arc::new(Self {
            result: Ok(ValidationVerdict {
                overall_passed: true,
                details: json!({"overall_passed": true}),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            result: Ok(ValidationVerdict {
                overall_passed: false,
                details: json!({"overall_passed": false, "checks": [{"name": "tone", "passed": false}]}),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    fn unreachable_service() -> Arc<Self> {
        Arc::new(Self {
            result: Err(CollaboratorError::Network {
                stage: Stage::Validate,
                detail: "connection refused".into(),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseValidator for FixedValidator {
    async fn validate(
        &self,
        _draft_text: &str,
        _state: &ConversationState,
    ) -> Result<ValidationVerdict, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

struct FakeExecutor;

#[async_trait]
impl ActionExecutor for FakeExecutor {
    async fn execute(&self, call: &ActionCall) -> Result<serde_json::Value, ActionError> {
        Ok(json!({ "from": call.name }))
    }
}

/// Succeeds for every action except the named one, which never completes.
struct HangingExecutor {
    hang: &'static str,
}

#[async_trait]
impl ActionExecutor for HangingExecutor {
    async fn execute(&self, call: &ActionCall) -> Result<serde_json::Value, ActionError> {
        if call.name == self.hang {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        Ok(json!({ "from": call.name }))
    }
}

/// A judge that records the failed-action list it was given.
struct RecordingJudge {
    judgment: CoverageJudgment,
    seen_failed: Mutex<Vec<String>>,
}

impl RecordingJudge {
    fn sufficient() -> Arc<Self> {
        Arc::new(Self {
            judgment: CoverageJudgment {
                score: 0.9,
                sufficient: true,
                gaps: vec![],
                reasoning: "enough".into(),
            },
            seen_failed: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CoverageJudge for RecordingJudge {
    async fn judge(
        &self,
        _query: &str,
        _state: &ConversationState,
        failed_actions: &[String],
    ) -> Result<CoverageJudgment, CollaboratorError> {
        *self.seen_failed.lock().unwrap() = failed_actions.to_vec();
        Ok(self.judgment.clone())
    }
}

#[derive(Default)]
struct RecordingTicketing {
    messages: Mutex<Vec<String>>,
    notes: Mutex<Vec<String>>,
    attributes: Mutex<Vec<(String, String)>>,
    snoozes: Mutex<Vec<u64>>,
    fail_delivery: bool,
    fail_finalize: bool,
}

impl RecordingTicketing {
    fn working() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn broken_delivery() -> Arc<Self> {
        Arc::new(Self {
            fail_delivery: true,
            ..Self::default()
        })
    }

    fn broken_finalize() -> Arc<Self> {
        Arc::new(Self {
            fail_finalize: true,
            ..Self::default()
        })
    }
}

#[async_trait]
impl Ticketing for RecordingTicketing {
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        body: &str,
    ) -> Result<(), TicketingError> {
        if self.fail_delivery {
            return Err(TicketingError::DeliveryFailed {
                conversation_id: conversation_id.0.clone(),
                reason: "503".into(),
            });
        }
        self.messages.lock().unwrap().push(body.to_string());
        Ok(())
    }

    async fn add_note(
        &self,
        _conversation_id: &ConversationId,
        body: &str,
    ) -> Result<(), TicketingError> {
        self.notes.lock().unwrap().push(body.to_string());
        Ok(())
    }

    async fn set_attribute(
        &self,
        conversation_id: &ConversationId,
        key: &str,
        value: &str,
    ) -> Result<(), TicketingError> {
        if self.fail_finalize {
            return Err(TicketingError::AttributeFailed {
                conversation_id: conversation_id.0.clone(),
                key: key.to_string(),
                reason: "500".into(),
            });
        }
        self.attributes
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn snooze(
        &self,
        conversation_id: &ConversationId,
        duration_seconds: u64,
    ) -> Result<(), TicketingError> {
        if self.fail_finalize {
            return Err(TicketingError::SnoozeFailed {
                conversation_id: conversation_id.0.clone(),
                reason: "500".into(),
            });
        }
        self.snoozes.lock().unwrap().push(duration_seconds);
        Ok(())
    }
}

// --- Scenario helpers ---

fn plan_with(actions: Vec<ActionCall>) -> GeneratedPlan {
    GeneratedPlan {
        actions,
        reasoning: "scripted".into(),
    }
}

fn lookup_plan() -> GeneratedPlan {
    plan_with(vec![
        ActionCall::new("get_applications").with_param("email", json!("user@example.com")),
    ])
}

fn sufficient(score: f64) -> Result<CoverageJudgment, CollaboratorError> {
    Ok(CoverageJudgment {
        score,
        sufficient: true,
        gaps: vec![],
        reasoning: "enough".into(),
    })
}

fn insufficient(score: f64) -> Result<CoverageJudgment, CollaboratorError> {
    Ok(CoverageJudgment {
        score,
        sufficient: false,
        gaps: vec![],
        reasoning: "missing data".into(),
    })
}

fn user_messages() -> Vec<Message> {
    vec![
        Message::assistant("Hi, how can I help?"),
        Message::user("where is my application for the backend role?"),
    ]
}

// --- Scenarios ---

#[tokio::test]
async fn happy_path_single_hop() {
    let planner = ScriptedPlanner::new(vec![lookup_plan()]);
    let ticketing = RecordingTicketing::working();
    let agent = SupportAgent::new(
        planner.clone(),
        ScriptedJudge::new(vec![sufficient(0.9)]),
        FixedDrafter::reply("Your application is in review."),
        FixedValidator::passing(),
        Arc::new(FakeExecutor),
        ticketing.clone(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-1"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::Success));
    assert_eq!(state.hops.len(), 1);
    assert!(state.hops[0].coverage.sufficient);
    assert_eq!(planner.calls(), 1);
    assert_eq!(
        *ticketing.messages.lock().unwrap(),
        vec!["Your application is in review.".to_string()]
    );
    assert_eq!(
        *ticketing.attributes.lock().unwrap(),
        vec![("agent_status".to_string(), "success".to_string())]
    );
    assert_eq!(*ticketing.snoozes.lock().unwrap(), vec![300u64]);
    assert!(state.pipeline.finalize.as_ref().unwrap().attribute_set);
}

#[tokio::test]
async fn second_hop_accumulates_evidence() {
    let planner = ScriptedPlanner::new(vec![
        lookup_plan(),
        plan_with(vec![
            ActionCall::new("search_docs").with_param("query", json!("review timeline")),
        ]),
    ]);
    let agent = SupportAgent::new(
        planner.clone(),
        ScriptedJudge::new(vec![insufficient(0.3), sufficient(0.8)]),
        FixedDrafter::reply("Reviews take about two weeks."),
        FixedValidator::passing(),
        Arc::new(FakeExecutor),
        RecordingTicketing::working(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-2"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::Success));
    assert_eq!(state.hops.len(), 2);
    assert_eq!(planner.calls(), 2);
    // Hop 0 evidence survives hop 1
    assert_eq!(state.tool_data["get_applications"][0].hop, 0);
    assert!(state.doc_data.contains_key("review timeline (hop 2)"));
    assert_eq!(state.evidence_count(), 2);
}

#[tokio::test]
async fn exhaustion_with_single_hop_budget() {
    let planner = ScriptedPlanner::new(vec![lookup_plan()]);
    let validator = FixedValidator::passing();
    let ticketing = RecordingTicketing::working();
    let agent = SupportAgent::new(
        planner.clone(),
        ScriptedJudge::new(vec![insufficient(0.2)]),
        FixedDrafter::reply("unused"),
        validator.clone(),
        Arc::new(FakeExecutor),
        ticketing.clone(),
    )
    .with_max_hops(1);

    let state = agent
        .run(
            ConversationId::from("conv-3"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::RouteToTeam));
    // One coverage evaluation, never a second plan
    assert_eq!(state.hops.len(), 1);
    assert_eq!(planner.calls(), 1);
    let escalation = state.pipeline.escalation.as_ref().unwrap();
    assert_eq!(escalation.reason, "exceeded maximum hops (1)");
    assert_eq!(escalation.origin, EscalationOrigin::Exhaustion);
    assert_eq!(validator.calls(), 0);
    assert!(ticketing.messages.lock().unwrap().is_empty());
    assert_eq!(
        ticketing.attributes.lock().unwrap()[0].1,
        "route_to_team"
    );
}

#[tokio::test]
async fn exhaustion_after_full_budget() {
    let planner = ScriptedPlanner::new(vec![lookup_plan(), lookup_plan()]);
    let agent = SupportAgent::new(
        planner.clone(),
        ScriptedJudge::new(vec![insufficient(0.2), insufficient(0.4)]),
        FixedDrafter::reply("unused"),
        FixedValidator::passing(),
        Arc::new(FakeExecutor),
        RecordingTicketing::working(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-4"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::RouteToTeam));
    assert_eq!(state.hops.len(), 2);
    assert_eq!(planner.calls(), 2);
    assert_eq!(
        state.pipeline.escalation.as_ref().unwrap().reason,
        "exceeded maximum hops (2)"
    );
}

#[tokio::test]
async fn route_to_team_skips_validation_and_delivery() {
    let validator = FixedValidator::passing();
    let ticketing = RecordingTicketing::working();
    let agent = SupportAgent::new(
        ScriptedPlanner::new(vec![plan_with(vec![])]),
        ScriptedJudge::new(vec![sufficient(0.9)]),
        FixedDrafter::route_to_team(),
        validator.clone(),
        Arc::new(FakeExecutor),
        ticketing.clone(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-5"),
            vec![Message::user("let me talk to a person please")],
            None,
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::RouteToTeam));
    assert_eq!(validator.calls(), 0);
    assert!(ticketing.messages.lock().unwrap().is_empty());
    let escalation = state.pipeline.escalation.as_ref().unwrap();
    assert_eq!(escalation.reason, "user requested a human");
    assert_eq!(escalation.origin, EscalationOrigin::UserRequest);
}

#[tokio::test]
async fn rejected_draft_escalates_without_delivery() {
    let ticketing = RecordingTicketing::working();
    let agent = SupportAgent::new(
        ScriptedPlanner::new(vec![lookup_plan()]),
        ScriptedJudge::new(vec![sufficient(0.9)]),
        FixedDrafter::reply("We guarantee you the job!"),
        FixedValidator::rejecting(),
        Arc::new(FakeExecutor),
        ticketing.clone(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-6"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::ValidationFailed));
    assert!(ticketing.messages.lock().unwrap().is_empty());
    assert_eq!(
        state.pipeline.escalation.as_ref().unwrap().reason,
        "validation failed"
    );
    // The raw verdict went onto the conversation as a note
    let validation = state.pipeline.validation.as_ref().unwrap();
    assert!(!validation.overall_passed);
    assert!(validation.note_added);
    assert!(validation.verdict.is_some());
    assert!(ticketing
        .notes
        .lock()
        .unwrap()
        .iter()
        .any(|n| n.contains("Validation verdict")));
}

#[tokio::test]
async fn validator_transport_failure_is_validation_error() {
    let agent = SupportAgent::new(
        ScriptedPlanner::new(vec![lookup_plan()]),
        ScriptedJudge::new(vec![sufficient(0.9)]),
        FixedDrafter::reply("Your application is in review."),
        FixedValidator::unreachable_service(),
        Arc::new(FakeExecutor),
        RecordingTicketing::working(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-7"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::ValidationFailed));
    let escalation = state.pipeline.escalation.as_ref().unwrap();
    assert!(escalation.reason.starts_with("validation error:"));
    let validation = state.pipeline.validation.as_ref().unwrap();
    assert!(validation.verdict.is_none());
    assert!(validation.error.is_some());
}

#[tokio::test]
async fn delivery_failure_finalizes_without_escalation() {
    let ticketing = RecordingTicketing::broken_delivery();
    let agent = SupportAgent::new(
        ScriptedPlanner::new(vec![lookup_plan()]),
        ScriptedJudge::new(vec![sufficient(0.9)]),
        FixedDrafter::reply("Your application is in review."),
        FixedValidator::passing(),
        Arc::new(FakeExecutor),
        ticketing.clone(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-8"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::MessageFailed));
    // Straight to Finalize: no escalation record for a delivery failure
    assert!(state.pipeline.escalation.is_none());
    let delivery = state.pipeline.delivery.as_ref().unwrap();
    assert!(!delivery.delivered);
    assert!(delivery.error.is_some());
    assert_eq!(
        ticketing.attributes.lock().unwrap()[0].1,
        "message_failed"
    );
}

#[tokio::test]
async fn draft_failure_is_response_failed() {
    let agent = SupportAgent::new(
        ScriptedPlanner::new(vec![lookup_plan()]),
        ScriptedJudge::new(vec![sufficient(0.9)]),
        FixedDrafter::failing("no text field"),
        FixedValidator::passing(),
        Arc::new(FakeExecutor),
        RecordingTicketing::working(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-9"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::ResponseFailed));
    let escalation = state.pipeline.escalation.as_ref().unwrap();
    assert!(escalation.reason.starts_with("draft generation error:"));
    assert_eq!(escalation.origin, EscalationOrigin::Draft);
}

#[tokio::test]
async fn coverage_failure_short_circuits_to_escalation() {
    let planner = ScriptedPlanner::new(vec![lookup_plan()]);
    let agent = SupportAgent::new(
        planner.clone(),
        ScriptedJudge::new(vec![Err(CollaboratorError::MalformedResponse {
            stage: Stage::Coverage,
            detail: "not json".into(),
        })]),
        FixedDrafter::reply("unused"),
        FixedValidator::passing(),
        Arc::new(FakeExecutor),
        RecordingTicketing::working(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-10"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::Error));
    // No complete hop was appended: the judgment never existed
    assert!(state.hops.is_empty());
    assert_eq!(planner.calls(), 1);
    let escalation = state.pipeline.escalation.as_ref().unwrap();
    assert_eq!(escalation.reason, "coverage analysis failed");
    assert!(escalation.detail.is_some());
}

#[tokio::test]
async fn missing_user_message_escalates_before_planning() {
    let planner = ScriptedPlanner::new(vec![]);
    let agent = SupportAgent::new(
        planner.clone(),
        ScriptedJudge::new(vec![]),
        FixedDrafter::reply("unused"),
        FixedValidator::passing(),
        Arc::new(FakeExecutor),
        RecordingTicketing::working(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-11"),
            vec![Message::assistant("Hi, how can I help?")],
            None,
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::Error));
    assert_eq!(planner.calls(), 0);
    assert!(state.hops.is_empty());
    let escalation = state.pipeline.escalation.as_ref().unwrap();
    assert_eq!(escalation.reason, "no user message in conversation");
    assert_eq!(escalation.origin, EscalationOrigin::Initialize);
}

#[tokio::test]
async fn failing_middle_action_is_isolated() {
    let judge = RecordingJudge::sufficient();
    let mut config = hopdesk_config::AppConfig::default();
    config.orchestrator.action_timeout_secs = 1;
    let agent = SupportAgent::new(
        ScriptedPlanner::new(vec![plan_with(vec![
            ActionCall::new("get_applications").with_param("email", json!("user@example.com")),
            ActionCall::new("get_user_profile").with_param("email", json!("user@example.com")),
            ActionCall::new("search_docs").with_param("query", json!("status meanings")),
        ])]),
        judge.clone(),
        FixedDrafter::reply("Here's what I found."),
        FixedValidator::passing(),
        Arc::new(HangingExecutor {
            hang: "get_user_profile",
        }),
        RecordingTicketing::working(),
    )
    .with_config(&config);

    let state = agent
        .run(
            ConversationId::from("conv-13"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    assert_eq!(state.terminal_outcome, Some(TerminalStatus::Success));
    let gather = &state.hops[0].gather;
    assert_eq!(gather.outcomes.len(), 3);
    assert!(gather.outcomes[0].succeeded);
    assert!(!gather.outcomes[1].succeeded);
    assert!(gather.outcomes[2].succeeded);
    // The judge saw exactly the failed action
    assert_eq!(
        *judge.seen_failed.lock().unwrap(),
        vec!["get_user_profile".to_string()]
    );
    // The two survivors produced evidence; the timeout produced none
    assert_eq!(state.tool_data["get_applications"].len(), 1);
    assert!(!state.tool_data.contains_key("get_user_profile"));
    assert!(state.doc_data.contains_key("status meanings (hop 1)"));
}

#[tokio::test]
async fn finalize_tolerates_ticketing_failures() {
    let agent = SupportAgent::new(
        ScriptedPlanner::new(vec![lookup_plan()]),
        ScriptedJudge::new(vec![sufficient(0.9)]),
        FixedDrafter::reply("Your application is in review."),
        FixedValidator::passing(),
        Arc::new(FakeExecutor),
        RecordingTicketing::broken_finalize(),
    );

    let state = agent
        .run(
            ConversationId::from("conv-12"),
            user_messages(),
            Some("user@example.com".into()),
        )
        .await
        .unwrap();

    // The run still reaches a terminal outcome
    assert_eq!(state.terminal_outcome, Some(TerminalStatus::Success));
    let finalize = state.pipeline.finalize.as_ref().unwrap();
    assert!(!finalize.attribute_set);
    assert!(!finalize.suspended);
    assert!(finalize.error.is_some());
}
