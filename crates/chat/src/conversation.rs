use snafu::OptionExt;

use super::error::{ChatResult, NotFoundSnafu};
use super::ids::{ConversationId, MessageId};
use super::message::{Message, MessageLog, current_unix_timestamp_seconds};

/// Prefix of the sequence label given to conversations created without a title.
pub const DEFAULT_CONVERSATION_TITLE_PREFIX: &str = "Chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: MessageLog,
    pub created_at_unix_seconds: u64,
}

impl Conversation {
    fn new(title: String) -> Self {
        Self {
            id: ConversationId::new_v7(),
            title,
            messages: MessageLog::new(),
            created_at_unix_seconds: current_unix_timestamp_seconds(),
        }
    }
}

/// Conversations in creation order plus the active selection.
///
/// The active id is always either `None` or the id of a stored conversation;
/// every mutation below restores that before returning.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active_id: Option<ConversationId>,
    created_count: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_conversation(&mut self, title: impl Into<String>) -> &Conversation {
        self.created_count = self.created_count.saturating_add(1);

        let mut title = title.into().trim().to_string();
        if title.is_empty() {
            title = format!("{DEFAULT_CONVERSATION_TITLE_PREFIX} {}", self.created_count);
        }

        let conversation = Conversation::new(title);
        tracing::info!(
            conversation_id = %conversation.id,
            title = %conversation.title,
            "conversation created"
        );

        self.active_id = Some(conversation.id);
        let index = self.conversations.len();
        self.conversations.push(conversation);
        &self.conversations[index]
    }

    pub fn select_conversation(&mut self, conversation_id: ConversationId) -> ChatResult<()> {
        self.position(conversation_id, "select-conversation")?;
        self.active_id = Some(conversation_id);
        tracing::debug!(conversation_id = %conversation_id, "conversation selected");
        Ok(())
    }

    pub fn delete_conversation(
        &mut self,
        conversation_id: ConversationId,
    ) -> ChatResult<Conversation> {
        let index = self.position(conversation_id, "delete-conversation")?;
        let removed = self.conversations.remove(index);

        if self.active_id == Some(conversation_id) {
            self.active_id = self
                .conversations
                .first()
                .map(|conversation| conversation.id);
        }

        tracing::info!(
            conversation_id = %conversation_id,
            next_active = ?self.active_id.map(|id| id.to_string()),
            "conversation deleted"
        );
        Ok(removed)
    }

    pub fn rename_conversation(
        &mut self,
        conversation_id: ConversationId,
        title: impl Into<String>,
    ) -> ChatResult<&Conversation> {
        let index = self.position(conversation_id, "rename-conversation")?;
        let title = title.into().trim().to_string();
        let conversation = &mut self.conversations[index];
        if !title.is_empty() {
            conversation.title = title;
        }
        Ok(conversation)
    }

    pub fn append_message(
        &mut self,
        conversation_id: ConversationId,
        message: Message,
    ) -> ChatResult<&Message> {
        let index = self.position(conversation_id, "append-message")?;
        self.conversations[index].messages.append(message)
    }

    pub fn delete_message(
        &mut self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> ChatResult<Message> {
        let index = self.position(conversation_id, "delete-message")?;
        self.conversations[index].messages.remove(message_id)
    }

    pub fn get(&self, conversation_id: ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == conversation_id)
    }

    pub fn messages(&self, conversation_id: ConversationId) -> ChatResult<&[Message]> {
        let index = self.position(conversation_id, "list-messages")?;
        Ok(self.conversations[index].messages.as_slice())
    }

    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active_id
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id
            .and_then(|conversation_id| self.get(conversation_id))
    }

    pub fn contains(&self, conversation_id: ConversationId) -> bool {
        self.get(conversation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn position(&self, conversation_id: ConversationId, stage: &'static str) -> ChatResult<usize> {
        self.conversations
            .iter()
            .position(|conversation| conversation.id == conversation_id)
            .context(NotFoundSnafu {
                stage,
                entity: "conversation",
                id: conversation_id.to_string(),
            })
    }
}
