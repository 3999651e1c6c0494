use std::sync::Arc;
use std::time::Duration;

use fimum_llm::{
    ProviderMessage, ProviderResult, ReplyContent, ReplyGenerator, ReplyRequest,
    Role as ProviderRole, generate_with_timeout,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::auth::{AuthSession, Credential};
use super::context::ChatContext;
use super::conversation::{Conversation, ConversationStore};
use super::error::ChatResult;
use super::ids::{ConversationId, MessageId};
use super::message::{FileRef, Message, Role};
use super::session::{ReplyTarget, Session, current_messages};

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Upper bound on one reply generation before it is reported as failed.
    pub reply_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// User message appended and reply generation started.
    Dispatched(ReplyTarget),
    /// Blank text and no files.
    EmptyInput,
    /// Another exchange is still in flight.
    ResponsePending(ReplyTarget),
}

/// Completion of one reply generation, routed back to the controller.
#[derive(Debug)]
pub struct ReplyEvent {
    pub target: ReplyTarget,
    pub outcome: ProviderResult<ReplyContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyApplied {
    /// Assistant message appended; `failed` marks a user-safe error reply.
    Appended {
        conversation_id: ConversationId,
        message_id: MessageId,
        failed: bool,
    },
    /// Completion for an exchange that is no longer pending.
    Stale(ReplyTarget),
    /// The originating conversation disappeared before the reply landed.
    Discarded(ReplyTarget),
}

/// Turns user input into exchanges with the reply generator.
///
/// All state lives in one [`ChatContext`] and changes only through `&mut self`, so
/// a UI event loop can own the controller without locks. Generation runs on a
/// spawned tokio task and reports back over a channel; callers apply completions
/// with [`SessionController::next_reply`] or [`SessionController::apply_ready_replies`].
pub struct SessionController {
    context: ChatContext,
    generator: Arc<dyn ReplyGenerator>,
    config: ChatConfig,
    reply_tx: mpsc::UnboundedSender<ReplyEvent>,
    reply_rx: mpsc::UnboundedReceiver<ReplyEvent>,
    in_flight: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(
        context: ChatContext,
        generator: Arc<dyn ReplyGenerator>,
        config: ChatConfig,
    ) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        Self {
            context,
            generator,
            config,
            reply_tx,
            reply_rx,
            in_flight: None,
        }
    }

    pub fn context(&self) -> &ChatContext {
        &self.context
    }

    pub fn session(&self) -> Session {
        self.context.session()
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.context.conversations
    }

    pub fn is_pending(&self) -> bool {
        self.context.pending_response.is_some()
    }

    pub fn current_messages(&self) -> &[Message] {
        current_messages(&self.context.session(), &self.context.conversations)
    }

    pub fn login(&mut self, credential: &Credential) -> ChatResult<&AuthSession> {
        self.context.auth.login(credential)
    }

    pub fn signup(&mut self, credential: &Credential) -> ChatResult<&AuthSession> {
        self.context.auth.signup(credential)
    }

    /// Signs out and wipes every conversation; an in-flight reply is aborted.
    pub fn logout(&mut self) {
        self.cancel_pending();
        self.context.teardown();
        while self.reply_rx.try_recv().is_ok() {}
    }

    pub fn create_conversation(&mut self, title: impl Into<String>) -> ChatResult<&Conversation> {
        self.context.auth.require_session("create-conversation")?;
        Ok(self.context.conversations.create_conversation(title))
    }

    pub fn select_conversation(&mut self, conversation_id: ConversationId) -> ChatResult<()> {
        self.context.auth.require_session("select-conversation")?;
        self.context
            .conversations
            .select_conversation(conversation_id)
    }

    pub fn delete_conversation(
        &mut self,
        conversation_id: ConversationId,
    ) -> ChatResult<Conversation> {
        self.context.auth.require_session("delete-conversation")?;
        let removed = self
            .context
            .conversations
            .delete_conversation(conversation_id)?;

        if self
            .context
            .pending_response
            .is_some_and(|target| target.conversation_id == conversation_id)
        {
            self.cancel_pending();
        }
        Ok(removed)
    }

    pub fn rename_conversation(
        &mut self,
        conversation_id: ConversationId,
        title: impl Into<String>,
    ) -> ChatResult<&Conversation> {
        self.context.auth.require_session("rename-conversation")?;
        self.context
            .conversations
            .rename_conversation(conversation_id, title)
    }

    pub fn delete_message(
        &mut self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> ChatResult<Message> {
        self.context.auth.require_session("delete-message")?;
        self.context
            .conversations
            .delete_message(conversation_id, message_id)
    }

    /// Appends the user's turn and starts reply generation.
    ///
    /// Must be called inside a tokio runtime. Without an active conversation a new
    /// one is created first.
    pub fn submit(
        &mut self,
        text: impl Into<String>,
        files: Vec<FileRef>,
    ) -> ChatResult<SubmitOutcome> {
        self.context.auth.require_session("submit")?;

        let text = text.into();
        if text.trim().is_empty() && files.is_empty() {
            return Ok(SubmitOutcome::EmptyInput);
        }

        if let Some(pending) = self.context.pending_response {
            tracing::debug!(
                conversation_id = %pending.conversation_id,
                "submit rejected while a reply is pending"
            );
            return Ok(SubmitOutcome::ResponsePending(pending));
        }

        let conversation_id = match self.context.conversations.active_id() {
            Some(conversation_id) => conversation_id,
            None => self.context.conversations.create_conversation("").id,
        };

        let context =
            Self::build_provider_context(self.context.conversations.messages(conversation_id)?);
        let request = ReplyRequest::new(text.clone())
            .with_attachments(files.iter().map(FileRef::to_attachment_info).collect())
            .with_context(context);

        self.context
            .conversations
            .append_message(conversation_id, Message::user(text, files))?;

        let target = ReplyTarget::new(conversation_id);
        self.context.pending_response = Some(target);
        self.dispatch(target, request);

        tracing::info!(
            conversation_id = %target.conversation_id,
            exchange_id = %target.exchange_id,
            generator_id = self.generator.id(),
            "reply dispatched"
        );
        Ok(SubmitOutcome::Dispatched(target))
    }

    /// Aborts the in-flight exchange, if any. Its completion will be ignored.
    pub fn cancel_pending(&mut self) -> Option<ReplyTarget> {
        let target = self.context.pending_response.take()?;
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        tracing::info!(
            conversation_id = %target.conversation_id,
            exchange_id = %target.exchange_id,
            "pending reply cancelled"
        );
        Some(target)
    }

    /// Waits for the pending exchange to finish and applies it.
    ///
    /// Returns `None` immediately when nothing is pending.
    pub async fn next_reply(&mut self) -> Option<ReplyApplied> {
        while self.context.pending_response.is_some() {
            let event = self.reply_rx.recv().await?;
            match self.apply_reply(event) {
                ReplyApplied::Stale(_) => continue,
                applied => return Some(applied),
            }
        }
        None
    }

    /// Applies every completion that has already arrived, without waiting.
    pub fn apply_ready_replies(&mut self) -> Vec<ReplyApplied> {
        let mut applied = Vec::new();
        while let Ok(event) = self.reply_rx.try_recv() {
            applied.push(self.apply_reply(event));
        }
        applied
    }

    pub fn apply_reply(&mut self, event: ReplyEvent) -> ReplyApplied {
        let ReplyEvent { target, outcome } = event;

        if self.context.pending_response != Some(target) {
            tracing::debug!(
                conversation_id = %target.conversation_id,
                exchange_id = %target.exchange_id,
                "ignoring stale reply"
            );
            return ReplyApplied::Stale(target);
        }

        self.context.pending_response = None;
        self.in_flight = None;

        let message = match outcome {
            Ok(reply) => Message::assistant_reply(reply),
            Err(error) => {
                tracing::warn!(
                    conversation_id = %target.conversation_id,
                    exchange_id = %target.exchange_id,
                    %error,
                    "reply generation failed"
                );
                Message::assistant_error(error.to_string())
            }
        };
        let failed = message.is_error();

        // Replies go to the conversation that asked, not whichever one is active now.
        match self
            .context
            .conversations
            .append_message(target.conversation_id, message)
        {
            Ok(message) => ReplyApplied::Appended {
                conversation_id: target.conversation_id,
                message_id: message.id,
                failed,
            },
            Err(error) => {
                tracing::debug!(%error, "reply discarded");
                ReplyApplied::Discarded(target)
            }
        }
    }

    fn dispatch(&mut self, target: ReplyTarget, request: ReplyRequest) {
        let generator = Arc::clone(&self.generator);
        let reply_tx = self.reply_tx.clone();
        let timeout = self.config.reply_timeout;

        self.in_flight = Some(tokio::spawn(async move {
            let outcome = generate_with_timeout(generator, request, timeout).await;
            // The receiver lives as long as the controller; a send error only means shutdown.
            let _ = reply_tx.send(ReplyEvent { target, outcome });
        }));
    }

    fn build_provider_context(messages: &[Message]) -> Vec<ProviderMessage> {
        messages
            .iter()
            .filter(|message| !message.is_error())
            .filter(|message| !message.content.trim().is_empty())
            .map(|message| {
                ProviderMessage::new(
                    Self::chat_role_to_provider(message.role),
                    message.content.clone(),
                )
            })
            .collect()
    }

    fn chat_role_to_provider(role: Role) -> ProviderRole {
        match role {
            Role::User => ProviderRole::User,
            Role::Assistant => ProviderRole::Assistant,
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}
