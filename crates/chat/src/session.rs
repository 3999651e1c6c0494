use super::conversation::ConversationStore;
use super::ids::{ConversationId, ExchangeId};
use super::message::Message;

/// Routing key for one in-flight reply.
///
/// A fresh exchange id is minted per submit, so a late completion can never be
/// mistaken for the reply to a newer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyTarget {
    pub conversation_id: ConversationId,
    pub exchange_id: ExchangeId,
}

impl ReplyTarget {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            exchange_id: ExchangeId::new_v7(),
        }
    }
}

/// Point-in-time view of the process-wide chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    pub authenticated: bool,
    pub active_conversation_id: Option<ConversationId>,
    pub pending_response: Option<ReplyTarget>,
}

impl Session {
    pub fn is_pending(&self) -> bool {
        self.pending_response.is_some()
    }
}

/// Messages of the session's active conversation, derived on demand.
pub fn current_messages<'a>(session: &Session, store: &'a ConversationStore) -> &'a [Message] {
    session
        .active_conversation_id
        .and_then(|conversation_id| store.get(conversation_id))
        .map(|conversation| conversation.messages.as_slice())
        .unwrap_or_default()
}
