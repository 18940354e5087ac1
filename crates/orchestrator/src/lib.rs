//! # Hopdesk Orchestrator
//!
//! The hop loop controller and the post-loop pipeline.
//!
//! A run proceeds in two phases. The **hop loop** iterates
//! Plan → Gather → Coverage under a hard hop ceiling, accumulating evidence
//! until the coverage judge declares it sufficient or the budget runs out.
//! The **pipeline** then drafts a reply, validates it, delivers it, and
//! always finalizes the conversation with a terminal status — whatever
//! happened before.

pub mod controller;
pub mod coverage;
pub mod gather;
pub mod pipeline;
pub mod plan;
pub mod runner;

pub use controller::{LoopController, LoopExit, StageFailure};
pub use coverage::CoverageStage;
pub use gather::GatherStage;
pub use pipeline::{Pipeline, PipelineEntry};
pub use plan::PlanStage;
pub use runner::SupportAgent;
