use std::sync::{Arc, Mutex};

use fimum_chat::{
    ChatConfig, ChatContext, Credential, ListeningState, LocalAuthenticator, RecognitionEvent,
    SessionController, SpeechError, SpeechInputAdapter, SpeechRecognizer, SubmitOutcome,
    UnsupportedRecognizer,
};
use fimum_llm::{CannedReplyConfig, CannedReplyGenerator, FIMUM_CODER};

#[derive(Default)]
struct Microphone {
    captures: usize,
}

impl SpeechRecognizer for Microphone {
    fn is_supported(&self) -> bool {
        true
    }

    fn begin(&mut self, _language: &str) -> Result<(), String> {
        self.captures += 1;
        Ok(())
    }

    fn end(&mut self) {}
}

#[tokio::test]
async fn dictated_text_flows_into_a_submit() {
    let transcript = Arc::new(Mutex::new(None::<String>));
    let sink = Arc::clone(&transcript);
    let mut speech = SpeechInputAdapter::new(Microphone::default());
    speech.on_result(move |text| {
        *sink.lock().unwrap() = Some(text);
    });

    let generator = Arc::new(CannedReplyGenerator::new(CannedReplyConfig {
        latency: std::time::Duration::ZERO,
    }));
    let context = ChatContext::init(Arc::new(LocalAuthenticator::default()));
    let mut controller = SessionController::new(context, generator, ChatConfig::default());
    controller
        .login(&Credential::new("voice@example.com", "password123"))
        .unwrap();

    speech.start().unwrap();
    let utterance = RecognitionEvent::Result("write some code for me".to_string());
    speech.handle_event(utterance).unwrap();
    assert_eq!(speech.state(), ListeningState::Idle);

    let dictated = transcript.lock().unwrap().take().unwrap();
    let outcome = controller.submit(dictated, Vec::new()).unwrap();
    assert!(matches!(outcome, SubmitOutcome::Dispatched(_)));
    controller.next_reply().await.unwrap();

    let reply = &controller.current_messages()[1];
    assert_eq!(reply.model.as_deref(), Some(FIMUM_CODER));
}

#[test]
fn terminal_host_reports_unsupported() {
    let mut speech = SpeechInputAdapter::new(UnsupportedRecognizer);
    assert!(matches!(
        speech.start(),
        Err(SpeechError::Unsupported { .. })
    ));
    assert_eq!(speech.state(), ListeningState::Idle);
}
