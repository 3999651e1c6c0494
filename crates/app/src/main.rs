#![deny(unsafe_code)]

mod settings;
mod shell;

use std::sync::Arc;

use fimum_chat::{
    ChatContext, LocalAuthenticator, SessionController, SpeechInputAdapter, UnsupportedRecognizer,
};
use fimum_llm::{CannedReplyGenerator, ReplyGenerator, create_generator};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use settings::SettingsStore;
use shell::Shell;

#[tokio::main]
async fn main() {
    // Logs go to stderr so they never interleave with chat output on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings_store = SettingsStore::load();
    let settings = settings_store.settings();

    let generator_config = settings.generator_config();
    let generator: Arc<dyn ReplyGenerator> = match create_generator(generator_config.clone()) {
        Ok(generator) => generator,
        Err(error) => {
            tracing::warn!(%error, "falling back to canned replies");
            Arc::new(CannedReplyGenerator::new(generator_config.canned))
        }
    };
    tracing::info!(
        generator_id = generator.id(),
        generator_name = generator.name(),
        "reply generator ready"
    );

    let context = ChatContext::init(Arc::new(LocalAuthenticator::new(settings.auth_config())));
    let controller = SessionController::new(context, generator, settings.chat_config());
    // A terminal host has no microphone, so nothing ever feeds recognizer events.
    let speech = SpeechInputAdapter::new(UnsupportedRecognizer)
        .with_language(settings.speech.language.clone());
    let (_speech_event_tx, speech_events) = mpsc::unbounded_channel();

    let shell = Shell::new(controller, speech, speech_events, settings_store);
    if let Err(error) = shell.run().await {
        tracing::error!(%error, "shell stopped");
        std::process::exit(1);
    }
}
