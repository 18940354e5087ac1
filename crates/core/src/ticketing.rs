//! Ticketing trait — the abstraction over the conversation platform.
//!
//! The ticketing system is where conversations live: replies are delivered
//! to the user, internal notes carry the audit trail, custom attributes
//! record the terminal status, and snoozing releases the conversation to a
//! human workflow. Implementations handle the platform specifics; the
//! orchestration core only depends on this trait.

use async_trait::async_trait;

use crate::error::TicketingError;
use crate::message::ConversationId;

/// Operations the orchestration core performs against the ticketing system.
#[async_trait]
pub trait Ticketing: Send + Sync {
    /// Send a user-visible reply on the conversation.
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        body: &str,
    ) -> std::result::Result<(), TicketingError>;

    /// Attach an internal note (audit trail; never user-visible).
    async fn add_note(
        &self,
        conversation_id: &ConversationId,
        body: &str,
    ) -> std::result::Result<(), TicketingError>;

    /// Set a custom attribute on the conversation.
    async fn set_attribute(
        &self,
        conversation_id: &ConversationId,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), TicketingError>;

    /// Temporarily suspend agent activity on the conversation so a separate
    /// human/automation workflow can take over.
    async fn snooze(
        &self,
        conversation_id: &ConversationId,
        duration_seconds: u64,
    ) -> std::result::Result<(), TicketingError>;
}
