use std::sync::Arc;

use super::auth::{AuthGate, Authenticator};
use super::conversation::ConversationStore;
use super::session::{ReplyTarget, Session};

/// Every piece of mutable chat state, owned in one place.
#[derive(Debug)]
pub struct ChatContext {
    pub auth: AuthGate,
    pub conversations: ConversationStore,
    pub pending_response: Option<ReplyTarget>,
}

impl ChatContext {
    pub fn init(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            auth: AuthGate::new(authenticator),
            conversations: ConversationStore::new(),
            pending_response: None,
        }
    }

    /// Wipes the whole context: token, conversations, and pending reply.
    pub fn teardown(&mut self) {
        self.auth.logout();
        self.conversations = ConversationStore::new();
        self.pending_response = None;
    }

    pub fn session(&self) -> Session {
        Session {
            authenticated: self.auth.is_authenticated(),
            active_conversation_id: self.conversations.active_id(),
            pending_response: self.pending_response,
        }
    }
}
