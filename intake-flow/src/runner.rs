//! IntakeRunner – locks one chat's session, applies exactly **one** event to it and returns the
//! actions the transport should perform.
//!
//! The session lock is held for the whole transition, adapter calls included. Events for the
//! same chat are therefore applied strictly one after another, while events for different chats
//! run concurrently.

use std::sync::Arc;

use tracing::debug;

use crate::{
    action::OutboundAction,
    error::Result,
    event::InboundEvent,
    machine::IntakeMachine,
    session::{ChatId, IntakeSession},
    storage::SessionStore,
};

#[derive(Clone)]
pub struct IntakeRunner {
    machine: Arc<IntakeMachine>,
    store: Arc<dyn SessionStore>,
}

impl IntakeRunner {
    pub fn new(machine: Arc<IntakeMachine>, store: Arc<dyn SessionStore>) -> Self {
        Self { machine, store }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<Vec<OutboundAction>> {
        let mut session = self.store.lock(event.chat_id).await?;

        let before = session.phase();
        let actions = self.machine.transition(&mut session, &event).await;

        debug!(
            chat_id = %event.chat_id,
            event = event.name(),
            ?before,
            after = ?session.phase(),
            actions = actions.len(),
            "transition applied"
        );
        Ok(actions)
    }

    pub async fn session(&self, chat_id: ChatId) -> Result<Option<IntakeSession>> {
        self.store.snapshot(chat_id).await
    }

    /// Number of chats that have a session
    pub fn session_count(&self) -> usize {
        self.store.len()
    }
}
