use std::time::{SystemTime, UNIX_EPOCH};

use fimum_llm::{AttachmentInfo, ReplyCategory, ReplyContent};
use snafu::{OptionExt, ensure};

use super::error::{ChatResult, ConflictSnafu, NotFoundSnafu};
use super::ids::MessageId;

/// Text shown to the user when the reply collaborator fails.
pub const REPLY_FAILURE_TEXT: &str =
    "I apologize, but I encountered an error while processing your request. Please try again.";

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Done,
    /// Carries the internal failure reason; the visible content stays user-safe.
    Error(String),
}

/// Attached file metadata. Contents never enter the chat state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl FileRef {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub(crate) fn to_attachment_info(&self) -> AttachmentInfo {
        AttachmentInfo {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub attachments: Vec<FileRef>,
    pub created_at_unix_seconds: u64,
    pub status: MessageStatus,
    /// Model that produced an assistant reply.
    pub model: Option<String>,
    pub category: Option<ReplyCategory>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            id: MessageId::new_v7(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            created_at_unix_seconds: current_unix_timestamp_seconds(),
            status,
            model: None,
            category: None,
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<FileRef>) -> Self {
        let mut message = Self::new(Role::User, content, MessageStatus::Done);
        message.attachments = attachments;
        message
    }

    pub fn assistant_reply(reply: ReplyContent) -> Self {
        let mut message = Self::new(Role::Assistant, reply.content, MessageStatus::Done);
        message.model = Some(reply.model);
        message.category = Some(reply.category);
        message
    }

    pub fn assistant_error(reason: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            REPLY_FAILURE_TEXT,
            MessageStatus::Error(reason.into()),
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, MessageStatus::Error(_))
    }
}

/// Ordered messages of one conversation. Append-only apart from delete-by-id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> ChatResult<&Message> {
        ensure!(
            self.get(message.id).is_none(),
            ConflictSnafu {
                stage: "message-log-append",
                entity: "message",
                id: message.id.to_string(),
            }
        );

        let index = self.messages.len();
        self.messages.push(message);
        Ok(&self.messages[index])
    }

    pub fn remove(&mut self, message_id: MessageId) -> ChatResult<Message> {
        let index = self
            .messages
            .iter()
            .position(|message| message.id == message_id)
            .context(NotFoundSnafu {
                stage: "message-log-remove",
                entity: "message",
                id: message_id.to_string(),
            })?;
        Ok(self.messages.remove(index))
    }

    pub fn get(&self, message_id: MessageId) -> Option<&Message> {
        self.messages
            .iter()
            .find(|message| message.id == message_id)
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub(crate) fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    #[test]
    fn append_keeps_insertion_order() {
        let mut log = MessageLog::new();
        for index in 0..5 {
            log.append(Message::user(format!("turn {index}"), Vec::new()))
                .unwrap();
        }

        let contents = log
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, ["turn 0", "turn 1", "turn 2", "turn 3", "turn 4"]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut log = MessageLog::new();
        let message = Message::user("hello", Vec::new());
        log.append(message.clone()).unwrap();

        let result = log.append(message);
        assert!(matches!(result, Err(ChatError::Conflict { .. })));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn remove_drops_only_the_named_message() {
        let mut log = MessageLog::new();
        let first = log.append(Message::user("a", Vec::new())).unwrap().id;
        let second = log.append(Message::user("b", Vec::new())).unwrap().id;

        let removed = log.remove(first).unwrap();
        assert_eq!(removed.content, "a");
        assert_eq!(log.len(), 1);
        assert_eq!(log.as_slice()[0].id, second);

        assert!(matches!(
            log.remove(first),
            Err(ChatError::NotFound { .. })
        ));
    }

    #[test]
    fn error_reply_hides_internal_reason() {
        let message = Message::assistant_error("upstream 502");
        assert!(message.is_error());
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, REPLY_FAILURE_TEXT);
        assert_eq!(
            message.status,
            MessageStatus::Error("upstream 502".to_string())
        );
    }
}
