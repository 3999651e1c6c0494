use std::fmt;

use snafu::ensure;

use super::error::{PermissionDeniedSnafu, RecognitionFailedSnafu, SpeechResult, UnsupportedSnafu};

pub const DEFAULT_RECOGNITION_LANGUAGE: &str = "en-US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListeningState {
    #[default]
    Idle,
    Listening,
}

/// Event reported by the platform recognizer while a capture is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Final transcript of one utterance.
    Result(String),
    /// Platform error code, e.g. `not-allowed` or `network`.
    Error(String),
    /// Capture ended without a result.
    Ended,
}

/// Host speech-to-text capability.
pub trait SpeechRecognizer: Send {
    fn is_supported(&self) -> bool;
    /// Starts one non-continuous capture; events arrive via [`SpeechInputAdapter::handle_event`].
    fn begin(&mut self, language: &str) -> Result<(), String>;
    fn end(&mut self);
}

/// Recognizer for hosts without a speech capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRecognizer;

impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    fn begin(&mut self, _language: &str) -> Result<(), String> {
        Err("no speech capability".to_string())
    }

    fn end(&mut self) {}
}

type ResultCallback = Box<dyn FnMut(String) + Send>;

/// Single-shot speech input: each `start` yields at most one transcript.
pub struct SpeechInputAdapter<R> {
    recognizer: R,
    state: ListeningState,
    language: String,
    on_result: Option<ResultCallback>,
}

impl<R: SpeechRecognizer> SpeechInputAdapter<R> {
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer,
            state: ListeningState::Idle,
            language: DEFAULT_RECOGNITION_LANGUAGE.to_string(),
            on_result: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.set_language(language);
        self
    }

    /// Applies from the next `start`; a running capture keeps its language.
    pub fn set_language(&mut self, language: impl Into<String>) {
        let language = language.into().trim().to_string();
        self.language = if language.is_empty() {
            DEFAULT_RECOGNITION_LANGUAGE.to_string()
        } else {
            language
        };
    }

    pub fn on_result(&mut self, callback: impl FnMut(String) + Send + 'static) {
        self.on_result = Some(Box::new(callback));
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn state(&self) -> ListeningState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == ListeningState::Listening
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_supported()
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn start(&mut self) -> SpeechResult<()> {
        ensure!(
            self.recognizer.is_supported(),
            UnsupportedSnafu {
                stage: "speech-start",
            }
        );

        if self.is_listening() {
            return Ok(());
        }

        if let Err(reason) = self.recognizer.begin(&self.language) {
            tracing::warn!(language = %self.language, %reason, "speech capture failed to start");
            return RecognitionFailedSnafu {
                stage: "speech-begin",
                reason,
            }
            .fail();
        }

        self.state = ListeningState::Listening;
        tracing::debug!(language = %self.language, "speech capture started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.is_listening() {
            return;
        }

        self.recognizer.end();
        self.state = ListeningState::Idle;
        tracing::debug!("speech capture stopped");
    }

    /// Feeds one recognizer event into the state machine.
    ///
    /// Errors come back as values so the recognizer's event context never unwinds.
    pub fn handle_event(&mut self, event: RecognitionEvent) -> SpeechResult<()> {
        if !self.is_listening() {
            tracing::trace!(?event, "ignoring speech event while idle");
            return Ok(());
        }

        self.state = ListeningState::Idle;

        match event {
            RecognitionEvent::Result(transcript) => {
                match self.on_result.as_mut() {
                    Some(callback) => callback(transcript),
                    None => tracing::debug!("speech transcript dropped: no result callback"),
                }
                Ok(())
            }
            RecognitionEvent::Ended => Ok(()),
            RecognitionEvent::Error(code) => {
                tracing::warn!(%code, "speech recognition failed");
                if is_permission_error(&code) {
                    PermissionDeniedSnafu {
                        stage: "speech-event",
                    }
                    .fail()
                } else {
                    RecognitionFailedSnafu {
                        stage: "speech-event",
                        reason: code,
                    }
                    .fail()
                }
            }
        }
    }
}

impl<R> fmt::Debug for SpeechInputAdapter<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SpeechInputAdapter")
            .field("state", &self.state)
            .field("language", &self.language)
            .field("has_result_callback", &self.on_result.is_some())
            .finish_non_exhaustive()
    }
}

fn is_permission_error(code: &str) -> bool {
    matches!(code, "not-allowed" | "service-not-allowed")
}
