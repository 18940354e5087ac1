//! # Hopdesk Core
//!
//! Domain types, traits, and error definitions for the Hopdesk support-agent
//! orchestration core. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (plan/coverage/draft generation, action
//! execution, response validation, ticketing) is defined as a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Deterministic testing with scripted mock collaborators
//! - Clean dependency graph (all crates depend inward on core)

pub mod action;
pub mod collaborator;
pub mod error;
pub mod event;
pub mod hop;
pub mod message;
pub mod state;
pub mod ticketing;

// Re-export key types at crate root for ergonomics
pub use action::{
    ActionCall, ActionExecutor, ActionKind, ActionRegistry, ActionSignature, ParameterKind,
    ParameterSpec,
};
pub use collaborator::{
    CoverageJudge, CoverageJudgment, Draft, DraftGenerator, GeneratedPlan, PlanGenerator,
    ResponseType, ResponseValidator, ValidationVerdict,
};
pub use error::{
    ActionError, CollaboratorError, Error, Result, Stage, TicketingError, ValidationError,
};
pub use event::{DomainEvent, EventBus};
pub use hop::{
    ActionOutcome, CoverageRecord, DataGap, GatherRecord, Hop, PlanRecord, RoutingDecision,
};
pub use message::{latest_user_message, Attachment, ConversationId, Message, Role};
pub use state::{
    doc_key, ConversationState, DeliveryRecord, DraftRecord, EscalationOrigin, EscalationRecord,
    Evidence, FinalizeRecord, NextStep, PipelineTrace, Routing, TerminalStatus, ValidationRecord,
    DEFAULT_MAX_HOPS,
};
pub use ticketing::Ticketing;
