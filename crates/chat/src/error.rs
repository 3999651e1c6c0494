use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("{entity} '{id}' was not found"))]
    NotFound {
        stage: &'static str,
        entity: &'static str,
        id: String,
    },
    #[snafu(display("{entity} '{id}' already exists"))]
    Conflict {
        stage: &'static str,
        entity: &'static str,
        id: String,
    },
    #[snafu(display("invalid credential: {reason}"))]
    InvalidCredential {
        stage: &'static str,
        reason: &'static str,
    },
    #[snafu(display("operation `{stage}` requires a signed-in session"))]
    NotAuthenticated { stage: &'static str },
    #[snafu(display("'{raw}' is not a valid {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SpeechError {
    #[snafu(display("speech recognition is not supported on this host"))]
    Unsupported { stage: &'static str },
    #[snafu(display("microphone permission was denied"))]
    PermissionDenied { stage: &'static str },
    #[snafu(display("speech recognition failed: {reason}"))]
    RecognitionFailed {
        stage: &'static str,
        reason: String,
    },
}

pub type SpeechResult<T> = Result<T, SpeechError>;
