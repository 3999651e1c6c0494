use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use snafu::ensure;

use super::model::model_for_category;
use super::provider::{
    EmptyInputSnafu, ProviderResult, ReplyCategory, ReplyContent, ReplyGenerator, ReplyRequest,
};

pub const CANNED_GENERATOR_ID: &str = "canned";
pub const DEFAULT_CANNED_LATENCY: Duration = Duration::from_millis(1000);

const IMAGE_REPLY: &str = "I've analyzed the image you provided. It appears to be a landscape \
with mountains and a lake, composed along the rule of thirds. Would you like a more specific \
analysis or help with anything related to this image?";

const CODING_REPLY: &str = "Here's a small Rust function that builds a greeting:\n\n\
```rust\nfn greeting(name: &str) -> String {\n\
\x20   format!(\"Hello, {name}! Welcome to Fimum.\")\n}\n```\n\n\
It borrows the name and returns an owned string, so callers keep their input.";

const THINKING_REPLY: &str = "Let me look at this from a few perspectives.\n\n\
**Analytical**: which principles and constraints govern the problem?\n\n\
**Creative**: which options are not obvious at first glance?\n\n\
**Strategic**: how does it connect to the bigger picture?\n\n\
Putting these together, I'd approach it step by step while staying open to new options.";

const NORMAL_REPLY: &str = "Hello! I'm Fimum, your personal AI assistant. How can I help you \
today?\n\nAsk me anything, from general knowledge to specific tasks or just a friendly chat.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedReplyConfig {
    /// Simulated round-trip before the reply is returned.
    pub latency: Duration,
}

impl Default for CannedReplyConfig {
    fn default() -> Self {
        Self {
            latency: DEFAULT_CANNED_LATENCY,
        }
    }
}

/// Local stand-in for the reply service: waits, classifies, and answers with fixed text.
#[derive(Debug, Clone, Default)]
pub struct CannedReplyGenerator {
    config: CannedReplyConfig,
}

impl CannedReplyGenerator {
    pub fn new(config: CannedReplyConfig) -> Self {
        Self { config }
    }

    pub fn reply_for(category: ReplyCategory) -> ReplyContent {
        let content = match category {
            ReplyCategory::Normal => NORMAL_REPLY,
            ReplyCategory::Image => IMAGE_REPLY,
            ReplyCategory::Coding => CODING_REPLY,
            ReplyCategory::Thinking => THINKING_REPLY,
        };
        ReplyContent::new(content, model_for_category(category)).with_category(category)
    }
}

/// Keyword heuristic used only to pick a canned reply.
pub fn classify(request: &ReplyRequest) -> ReplyCategory {
    let text = request.text.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|keyword| text.contains(keyword));

    if mentions(&["image", "picture", "photo"])
        || request.attachments.iter().any(|file| file.is_image())
    {
        ReplyCategory::Image
    } else if mentions(&["code", "app", "function", "script"]) {
        ReplyCategory::Coding
    } else if mentions(&["think", "analyze", "explain"]) {
        ReplyCategory::Thinking
    } else {
        ReplyCategory::Normal
    }
}

impl ReplyGenerator for CannedReplyGenerator {
    fn id(&self) -> &str {
        CANNED_GENERATOR_ID
    }

    fn name(&self) -> &str {
        "Canned replies"
    }

    fn generate_reply<'a>(
        &'a self,
        request: ReplyRequest,
    ) -> BoxFuture<'a, ProviderResult<ReplyContent>> {
        async move {
            ensure!(
                !request.is_empty(),
                EmptyInputSnafu {
                    stage: "canned-generate-reply",
                }
            );

            if !self.config.latency.is_zero() {
                tokio::time::sleep(self.config.latency).await;
            }

            let category = classify(&request);
            tracing::debug!(
                category = %category,
                context_len = request.context.len(),
                "canned reply selected"
            );
            Ok(Self::reply_for(category))
        }
        .boxed()
    }
}
