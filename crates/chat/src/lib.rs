#![deny(unsafe_code)]

//! Client-side chat core for Fimum: conversations, the reply exchange loop,
//! speech input, and the sign-in gate. Presentation layers drive it and render
//! [`current_messages`].

pub mod auth;
pub mod context;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod ids;
pub mod message;
pub mod session;
pub mod speech;

pub use auth::{
    AuthConfig, AuthGate, AuthSession, AuthToken, Authenticator, Credential, LocalAuthenticator,
};
pub use context::ChatContext;
pub use controller::{
    ChatConfig, DEFAULT_REPLY_TIMEOUT, ReplyApplied, ReplyEvent, SessionController, SubmitOutcome,
};
pub use conversation::{Conversation, ConversationStore, DEFAULT_CONVERSATION_TITLE_PREFIX};
pub use error::{ChatError, ChatResult, SpeechError, SpeechResult};
pub use ids::{ConversationId, ExchangeId, MessageId};
pub use message::{FileRef, Message, MessageLog, MessageStatus, REPLY_FAILURE_TEXT, Role};
pub use session::{ReplyTarget, Session, current_messages};
pub use speech::{
    DEFAULT_RECOGNITION_LANGUAGE, ListeningState, RecognitionEvent, SpeechInputAdapter,
    SpeechRecognizer, UnsupportedRecognizer,
};
