//! The post-loop pipeline: Draft → Validate → Deliver → Escalate → Finalize.
//!
//! Once the hop loop exits, control is linear. A human-handoff draft skips
//! validation and delivery entirely; a failed delivery goes straight to
//! Finalize as `message_failed` without an escalation detour. Finalize runs
//! on every path and always sets the terminal outcome, recording (never
//! propagating) any ticketing failures along the way.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use hopdesk_core::{
    CollaboratorError, ConversationState, DeliveryRecord, DomainEvent, DraftGenerator,
    DraftRecord, EscalationOrigin, EscalationRecord, EventBus, FinalizeRecord, NextStep,
    ResponseType, ResponseValidator, Stage, TerminalStatus, Ticketing, ValidationRecord,
};

use crate::controller::StageFailure;

/// How the pipeline is entered from the hop loop.
#[derive(Debug, Clone)]
pub enum PipelineEntry {
    /// Coverage was sufficient: draft a reply.
    Respond,

    /// Exhaustion or a hard stage failure: escalate straight away.
    Escalate(StageFailure),
}

pub struct Pipeline {
    drafter: Arc<dyn DraftGenerator>,
    validator: Arc<dyn ResponseValidator>,
    ticketing: Arc<dyn Ticketing>,
    events: Arc<EventBus>,
    draft_timeout: Duration,
    status_attribute: String,
    snooze_duration_secs: u64,
}

impl Pipeline {
    pub fn new(
        drafter: Arc<dyn DraftGenerator>,
        validator: Arc<dyn ResponseValidator>,
        ticketing: Arc<dyn Ticketing>,
        events: Arc<EventBus>,
        draft_timeout: Duration,
        status_attribute: String,
        snooze_duration_secs: u64,
    ) -> Self {
        Self {
            drafter,
            validator,
            ticketing,
            events,
            draft_timeout,
            status_attribute,
            snooze_duration_secs,
        }
    }

    /// Run the pipeline to its terminal state. Always finalizes.
    pub async fn run(&self, state: &mut ConversationState, entry: PipelineEntry) {
        let status = match entry {
            PipelineEntry::Respond => self.respond(state).await,
            PipelineEntry::Escalate(failure) => self.escalate(state, failure).await,
        };
        self.finalize(state, status).await;
    }

    /// Draft → Validate → Deliver, resolving to a terminal status.
    async fn respond(&self, state: &mut ConversationState) -> TerminalStatus {
        state.set_routing(NextStep::Draft, None);

        let draft = match self.draft(state).await {
            Ok(draft) => draft,
            Err(failure) => return self.escalate(state, failure).await,
        };

        if draft.response_type == ResponseType::RouteToTeam {
            // Explicit handoff request: no validation, no delivery.
            return self
                .escalate(
                    state,
                    StageFailure {
                        origin: EscalationOrigin::UserRequest,
                        reason: "user requested a human".into(),
                        detail: None,
                    },
                )
                .await;
        }

        state.set_routing(NextStep::Validate, None);
        if let Err(failure) = self.validate(state, &draft.text).await {
            return self.escalate(state, failure).await;
        }

        state.set_routing(NextStep::Deliver, None);
        self.deliver(state, &draft.text).await
    }

    async fn draft(&self, state: &mut ConversationState) -> Result<DraftRecord, StageFailure> {
        let started = Instant::now();
        let result =
            tokio::time::timeout(self.draft_timeout, self.drafter.draft(state)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let draft = match result {
            Ok(Ok(draft)) => draft,
            Ok(Err(err)) => return Err(Self::draft_failure(err.to_string())),
            Err(_) => {
                let err = CollaboratorError::Timeout {
                    stage: Stage::Draft,
                    timeout_secs: self.draft_timeout.as_secs(),
                };
                return Err(Self::draft_failure(err.to_string()));
            }
        };

        let record = DraftRecord {
            text: draft.text,
            response_type: draft.response_type,
            duration_ms,
        };
        tracing::info!(
            conversation_id = %state.conversation_id.0,
            response_type = ?record.response_type,
            duration_ms,
            "draft produced"
        );
        state.pipeline.draft = Some(record.clone());
        Ok(record)
    }

    fn draft_failure(detail: String) -> StageFailure {
        StageFailure {
            origin: EscalationOrigin::Draft,
            reason: format!("draft generation error: {detail}"),
            detail: Some(detail),
        }
    }

    /// Validate the draft. `Ok(())` means delivery may proceed; the raw
    /// verdict is recorded as an audit note whatever the outcome.
    async fn validate(
        &self,
        state: &mut ConversationState,
        draft_text: &str,
    ) -> Result<(), StageFailure> {
        match self.validator.validate(draft_text, state).await {
            Ok(verdict) => {
                let note = format!(
                    "Validation verdict: {}",
                    serde_json::to_string_pretty(&verdict.details)
                        .unwrap_or_else(|_| verdict.details.to_string())
                );
                let note_added = self.try_note(state, &note).await;
                state.pipeline.validation = Some(ValidationRecord {
                    verdict: Some(verdict.details),
                    overall_passed: verdict.overall_passed,
                    note_added,
                    error: None,
                });
                if verdict.overall_passed {
                    Ok(())
                } else {
                    Err(StageFailure {
                        origin: EscalationOrigin::Validation,
                        reason: "validation failed".into(),
                        detail: None,
                    })
                }
            }
            Err(err) => {
                let detail = err.to_string();
                let note_added = self
                    .try_note(state, &format!("Validation could not complete: {detail}"))
                    .await;
                state.pipeline.validation = Some(ValidationRecord {
                    verdict: None,
                    overall_passed: false,
                    note_added,
                    error: Some(detail.clone()),
                });
                Err(StageFailure {
                    origin: EscalationOrigin::Validation,
                    reason: format!("validation error: {detail}"),
                    detail: Some(detail),
                })
            }
        }
    }

    async fn deliver(&self, state: &mut ConversationState, text: &str) -> TerminalStatus {
        let started = Instant::now();
        let result = self
            .ticketing
            .send_message(&state.conversation_id, text)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let delivered = result.is_ok();
        self.events.publish(DomainEvent::ResponseDelivered {
            conversation_id: state.conversation_id.0.clone(),
            delivered,
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(()) => {
                state.pipeline.delivery = Some(DeliveryRecord {
                    delivered: true,
                    duration_ms,
                    error: None,
                });
                TerminalStatus::Success
            }
            Err(err) => {
                // The reply was ready; delivery alone failed. Straight to
                // Finalize, no escalation detour.
                tracing::error!(
                    conversation_id = %state.conversation_id.0,
                    error = %err,
                    "delivery failed"
                );
                state.pipeline.delivery = Some(DeliveryRecord {
                    delivered: false,
                    duration_ms,
                    error: Some(err.to_string()),
                });
                TerminalStatus::MessageFailed
            }
        }
    }

    /// Record the escalation note and resolve the terminal status. Never
    /// terminates the run by itself; Finalize always follows.
    async fn escalate(
        &self,
        state: &mut ConversationState,
        failure: StageFailure,
    ) -> TerminalStatus {
        state.set_routing(NextStep::Escalate, Some(failure.reason.clone()));
        tracing::warn!(
            conversation_id = %state.conversation_id.0,
            origin = %failure.origin,
            reason = %failure.reason,
            "escalating to human team"
        );

        let mut note = format!(
            "Escalation from {}: {}",
            failure.origin, failure.reason
        );
        if let Some(detail) = &failure.detail {
            note.push_str(&format!("\nDetail: {detail}"));
        }
        let note_added = self.try_note(state, &note).await;

        self.events.publish(DomainEvent::Escalated {
            conversation_id: state.conversation_id.0.clone(),
            origin: failure.origin.as_str().to_string(),
            reason: failure.reason.clone(),
            timestamp: Utc::now(),
        });

        state.pipeline.escalation = Some(EscalationRecord {
            reason: failure.reason,
            origin: failure.origin,
            detail: failure.detail,
            note_added,
        });

        match failure.origin {
            EscalationOrigin::UserRequest | EscalationOrigin::Exhaustion => {
                TerminalStatus::RouteToTeam
            }
            EscalationOrigin::Validation => TerminalStatus::ValidationFailed,
            EscalationOrigin::Draft => TerminalStatus::ResponseFailed,
            EscalationOrigin::Initialize
            | EscalationOrigin::Plan
            | EscalationOrigin::Coverage => TerminalStatus::Error,
        }
    }

    /// Close out the conversation. Runs on every path; ticketing failures
    /// are recorded and logged, never propagated.
    async fn finalize(&self, state: &mut ConversationState, status: TerminalStatus) {
        state.set_routing(NextStep::Finalize, None);

        let mut errors: Vec<String> = Vec::new();

        let attribute_set = match self
            .ticketing
            .set_attribute(&state.conversation_id, &self.status_attribute, status.as_str())
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    conversation_id = %state.conversation_id.0,
                    error = %err,
                    "failed to set status attribute"
                );
                errors.push(err.to_string());
                false
            }
        };

        let suspended = match self
            .ticketing
            .snooze(&state.conversation_id, self.snooze_duration_secs)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    conversation_id = %state.conversation_id.0,
                    error = %err,
                    "failed to snooze conversation"
                );
                errors.push(err.to_string());
                false
            }
        };

        state.pipeline.finalize = Some(FinalizeRecord {
            status,
            attribute_set,
            suspended,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        });
        state.terminal_outcome = Some(status);
        state.set_routing(NextStep::End, None);

        self.events.publish(DomainEvent::Finalized {
            conversation_id: state.conversation_id.0.clone(),
            status: status.as_str().to_string(),
            hops: state.hops.len(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            conversation_id = %state.conversation_id.0,
            status = %status,
            hops = state.hops.len(),
            evidence = state.evidence_count(),
            "run finalized"
        );
    }

    /// Best-effort internal note; a note failure never changes routing.
    async fn try_note(&self, state: &ConversationState, body: &str) -> bool {
        match self.ticketing.add_note(&state.conversation_id, body).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    conversation_id = %state.conversation_id.0,
                    error = %err,
                    "failed to add note"
                );
                false
            }
        }
    }
}
