//! # Hopdesk Ticketing
//!
//! HTTP implementations of the two external services the orchestration
//! core talks to: the ticketing platform (replies, notes, attributes,
//! snooze) and the response validation service.

pub mod client;
pub mod validator;

pub use client::DeskClient;
pub use validator::HttpResponseValidator;
