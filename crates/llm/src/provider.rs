use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use snafu::Snafu;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("reply generator '{generator_id}' is not supported"))]
    UnsupportedGenerator {
        stage: &'static str,
        generator_id: String,
    },
    #[snafu(display("reply request has neither text nor attachments"))]
    EmptyInput { stage: &'static str },
    #[snafu(display("reply generation failed on `{stage}`: {details}"))]
    ReplyGenerationFailed {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("reply generation timed out after {seconds}s"))]
    Timeout { stage: &'static str, seconds: u64 },
}

impl ProviderError {
    /// Builds a generation failure from outside this crate, e.g. from a test double
    /// or a remote collaborator that reports its own error type.
    pub fn generation_failed(stage: &'static str, details: impl Into<String>) -> Self {
        Self::ReplyGenerationFailed {
            stage,
            details: details.into(),
        }
    }
}

/// Provider-side speaker role, kept apart from the chat domain enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// File metadata forwarded to the generator; uploads are not part of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl AttachmentInfo {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRequest {
    pub text: String,
    pub attachments: Vec<AttachmentInfo>,
    /// Prior turns of the conversation, oldest first.
    pub context: Vec<ProviderMessage>,
}

impl ReplyRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
            context: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<AttachmentInfo>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_context(mut self, context: Vec<ProviderMessage>) -> Self {
        self.context = context;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}

/// Coarse reply classification reported alongside generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplyCategory {
    #[default]
    Normal,
    Image,
    Coding,
    Thinking,
}

impl ReplyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Image => "image",
            Self::Coding => "coding",
            Self::Thinking => "thinking",
        }
    }
}

impl fmt::Display for ReplyCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyContent {
    pub content: String,
    pub model: String,
    pub category: ReplyCategory,
}

impl ReplyContent {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            category: ReplyCategory::Normal,
        }
    }

    pub fn with_category(mut self, category: ReplyCategory) -> Self {
        self.category = category;
        self
    }
}

pub trait ReplyGenerator: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn generate_reply<'a>(
        &'a self,
        request: ReplyRequest,
    ) -> BoxFuture<'a, ProviderResult<ReplyContent>>;
}

/// Runs one generation bounded by `timeout`.
///
/// Expiry maps to [`ProviderError::Timeout`] and a panicking generator to
/// [`ProviderError::ReplyGenerationFailed`], so every call settles with a result.
pub async fn generate_with_timeout(
    generator: Arc<dyn ReplyGenerator>,
    request: ReplyRequest,
    timeout: Duration,
) -> ProviderResult<ReplyContent> {
    // Polling the outer block also covers panics raised before the future is built.
    let generation = AssertUnwindSafe(async { generator.generate_reply(request).await });

    match tokio::time::timeout(timeout, generation.catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => {
            let details = panic_message(payload.as_ref());
            tracing::error!(
                generator_id = generator.id(),
                %details,
                "reply generator panicked"
            );
            ReplyGenerationFailedSnafu {
                stage: "generate-with-timeout",
                details: format!("generator panicked: {details}"),
            }
            .fail()
        }
        Err(_) => {
            tracing::warn!(
                generator_id = generator.id(),
                timeout_secs = timeout.as_secs(),
                "reply generation exceeded its deadline"
            );
            TimeoutSnafu {
                stage: "generate-with-timeout",
                seconds: timeout.as_secs(),
            }
            .fail()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    impl ReplyGenerator for Stalled {
        fn id(&self) -> &str {
            "stalled"
        }

        fn name(&self) -> &str {
            "Stalled"
        }

        fn generate_reply<'a>(
            &'a self,
            _request: ReplyRequest,
        ) -> BoxFuture<'a, ProviderResult<ReplyContent>> {
            futures::future::pending().boxed()
        }
    }

    struct Exploding;

    impl ReplyGenerator for Exploding {
        fn id(&self) -> &str {
            "exploding"
        }

        fn name(&self) -> &str {
            "Exploding"
        }

        fn generate_reply<'a>(
            &'a self,
            request: ReplyRequest,
        ) -> BoxFuture<'a, ProviderResult<ReplyContent>> {
            let text = request.text;
            async move { panic!("cannot answer {text:?}") }.boxed()
        }
    }

    #[tokio::test]
    async fn panicking_generator_settles_as_failure() {
        let result = generate_with_timeout(
            Arc::new(Exploding),
            ReplyRequest::new("hello"),
            Duration::from_secs(5),
        )
        .await;

        match result {
            Err(ProviderError::ReplyGenerationFailed { details, .. }) => {
                assert!(details.contains("cannot answer \"hello\""));
            }
            other => panic!("expected a generation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_generator_times_out() {
        let result = generate_with_timeout(
            Arc::new(Stalled),
            ReplyRequest::new("hello"),
            Duration::from_millis(20),
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
    }

    #[test]
    fn request_without_text_or_files_is_empty() {
        assert!(ReplyRequest::new("   ").is_empty());

        let photo = AttachmentInfo {
            name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
            size_bytes: 12,
        };
        let with_file = ReplyRequest::new("").with_attachments(vec![photo]);
        assert!(!with_file.is_empty());
        assert!(with_file.attachments[0].is_image());
    }
}
