//! # Hopdesk Actions
//!
//! The catalog of retrieval actions the planner may propose, and the
//! validator that checks every proposed plan against the catalog before
//! anything executes.

pub mod registry;
pub mod validator;

pub use registry::default_registry;
pub use validator::{PlanDefect, PlanRejection, PlanValidator};
