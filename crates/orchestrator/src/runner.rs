//! The agent runner — wires collaborators, loop, and pipeline into one run.

use std::sync::Arc;

use hopdesk_actions::{default_registry, PlanValidator};
use hopdesk_config::{AppConfig, OrchestratorConfig};
use hopdesk_core::{
    ActionExecutor, ActionRegistry, ConversationId, ConversationState, CoverageJudge,
    DraftGenerator, EscalationOrigin, EventBus, Message, PlanGenerator, ResponseValidator,
    Result, Ticketing,
};

use crate::controller::{LoopController, LoopExit, StageFailure};
use crate::coverage::CoverageStage;
use crate::gather::GatherStage;
use crate::pipeline::{Pipeline, PipelineEntry};
use crate::plan::PlanStage;

/// The support agent: owns the collaborators and drives one conversation
/// per `run` call. State is per-run; the agent itself is reusable and
/// shareable across conversations.
pub struct SupportAgent {
    planner: Arc<dyn PlanGenerator>,
    judge: Arc<dyn CoverageJudge>,
    drafter: Arc<dyn DraftGenerator>,
    validator: Arc<dyn ResponseValidator>,
    executor: Arc<dyn ActionExecutor>,
    ticketing: Arc<dyn Ticketing>,
    registry: ActionRegistry,
    events: Arc<EventBus>,
    orchestrator: OrchestratorConfig,
    status_attribute: String,
    snooze_duration_secs: u64,
}

impl SupportAgent {
    pub fn new(
        planner: Arc<dyn PlanGenerator>,
        judge: Arc<dyn CoverageJudge>,
        drafter: Arc<dyn DraftGenerator>,
        validator: Arc<dyn ResponseValidator>,
        executor: Arc<dyn ActionExecutor>,
        ticketing: Arc<dyn Ticketing>,
    ) -> Self {
        Self {
            planner,
            judge,
            drafter,
            validator,
            executor,
            ticketing,
            registry: default_registry(),
            events: Arc::new(EventBus::default()),
            orchestrator: OrchestratorConfig::default(),
            status_attribute: "agent_status".into(),
            snooze_duration_secs: 300,
        }
    }

    /// Apply orchestrator and ticketing settings from a loaded config.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.orchestrator = config.orchestrator.clone();
        self.status_attribute = config.ticketing.status_attribute.clone();
        self.snooze_duration_secs = config.ticketing.snooze_duration_secs;
        self
    }

    /// Replace the action registry (defaults to the built-in catalog).
    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Share an event bus (defaults to a private one).
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Override the hop ceiling.
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.orchestrator.max_hops = max_hops;
        self
    }

    /// The event bus runs publish to.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Run one conversation to its terminal state.
    ///
    /// Always returns a finalized state on a successful initialization:
    /// every path through the loop and pipeline ends in Finalize, so
    /// `terminal_outcome` is set whatever happened in between.
    pub async fn run(
        &self,
        conversation_id: ConversationId,
        messages: Vec<Message>,
        user_email: Option<String>,
    ) -> Result<ConversationState> {
        let mut state = ConversationState::initialize(
            conversation_id,
            messages,
            user_email,
            self.orchestrator.max_hops,
        )?;

        let run_id = uuid::Uuid::new_v4();
        tracing::info!(
            run_id = %run_id,
            conversation_id = %state.conversation_id.0,
            max_hops = state.max_hops,
            "starting run"
        );

        let pipeline = self.pipeline();

        let Some(query) = state.query().map(str::to_string) else {
            pipeline
                .run(
                    &mut state,
                    PipelineEntry::Escalate(StageFailure {
                        origin: EscalationOrigin::Initialize,
                        reason: "no user message in conversation".into(),
                        detail: None,
                    }),
                )
                .await;
            return Ok(state);
        };

        let controller = self.controller();
        let entry = match controller.run(&query, &mut state).await {
            LoopExit::Sufficient => PipelineEntry::Respond,
            LoopExit::Exhausted { reason } => PipelineEntry::Escalate(StageFailure {
                origin: EscalationOrigin::Exhaustion,
                reason,
                detail: None,
            }),
            LoopExit::Failed(failure) => PipelineEntry::Escalate(failure),
        };
        pipeline.run(&mut state, entry).await;

        Ok(state)
    }

    fn controller(&self) -> LoopController {
        LoopController::new(
            PlanStage::new(
                self.planner.clone(),
                PlanValidator::new(self.registry.clone()),
                self.orchestrator.plan_timeout(),
                self.orchestrator.max_plan_attempts,
            ),
            GatherStage::new(
                self.executor.clone(),
                self.registry.clone(),
                self.orchestrator.action_timeout(),
                self.events.clone(),
            ),
            CoverageStage::new(self.judge.clone(), self.orchestrator.coverage_timeout()),
            self.events.clone(),
        )
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.drafter.clone(),
            self.validator.clone(),
            self.ticketing.clone(),
            self.events.clone(),
            self.orchestrator.draft_timeout(),
            self.status_attribute.clone(),
            self.snooze_duration_secs,
        )
    }
}
