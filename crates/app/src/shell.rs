use std::num::ParseIntError;

use fimum_chat::{
    ChatError, ConversationId, Credential, FileRef, Message, MessageId, MessageStatus,
    RecognitionEvent, ReplyApplied, Role, SessionController, SpeechInputAdapter, SpeechRecognizer,
    SubmitOutcome,
};
use fimum_llm::fimum_models;
use snafu::{OptionExt, ResultExt, Snafu};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;

use crate::settings::SettingsStore;

pub const HELP_TEXT: &str = "\
commands:
  /login <email> <password>    sign in
  /signup <email> <password>   create an account and sign in
  /logout                      sign out and clear every conversation
  /new [title]                 start a conversation
  /list                        list conversations
  /select <id>                 switch conversation
  /delete <id>                 delete a conversation
  /rename <id> <title>         rename a conversation
  /rm <message-id>             delete a message from the active conversation
  /attach <name> <mime> <bytes> stage a file for the next message
  /mic                         start or stop dictating a message
  /language <code>             set the dictation language, e.g. fr-FR
  /cancel                      abort the pending reply
  /show                        print the active conversation
  /models                      list the reply models
  /help                        show this help
  /quit                        exit
anything else is sent as a message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Signup { email: String, password: String },
    Logout,
    New { title: String },
    List,
    Select { id: String },
    Delete { id: String },
    Rename { id: String, title: String },
    RemoveMessage { id: String },
    Attach(FileRef),
    Mic,
    Language { code: String },
    Cancel,
    Show,
    Models,
    Help,
    Quit,
    Say(String),
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ShellError {
    #[snafu(display("/{command} needs <{argument}>"))]
    MissingArgument {
        stage: &'static str,
        command: &'static str,
        argument: &'static str,
    },
    #[snafu(display("'{raw}' is not a byte count"))]
    InvalidSize {
        stage: &'static str,
        raw: String,
        source: ParseIntError,
    },
    #[snafu(display("unknown command /{name}, try /help"))]
    UnknownCommand { stage: &'static str, name: String },
    #[snafu(display("failed to read input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type ShellResult<T> = Result<T, ShellError>;

/// Parses one input line. Lines not starting with `/` are messages.
pub fn parse_command(line: &str) -> ShellResult<Command> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let (name, arguments) = rest
        .split_once(char::is_whitespace)
        .map(|(name, arguments)| (name, arguments.trim()))
        .unwrap_or((rest, ""));
    let mut words = arguments.split_whitespace();

    let command = match name {
        "login" | "signup" => {
            let command = if name == "login" { "login" } else { "signup" };
            let email = words.next().context(MissingArgumentSnafu {
                stage: "parse-credential",
                command,
                argument: "email",
            })?;
            let password = words.next().context(MissingArgumentSnafu {
                stage: "parse-credential",
                command,
                argument: "password",
            })?;
            let (email, password) = (email.to_string(), password.to_string());
            if command == "login" {
                Command::Login { email, password }
            } else {
                Command::Signup { email, password }
            }
        }
        "logout" => Command::Logout,
        "new" => Command::New {
            title: arguments.to_string(),
        },
        "list" => Command::List,
        "select" | "delete" | "rm" => {
            let id = words
                .next()
                .context(MissingArgumentSnafu {
                    stage: "parse-id",
                    command: match name {
                        "select" => "select",
                        "delete" => "delete",
                        _ => "rm",
                    },
                    argument: "id",
                })?
                .to_string();
            match name {
                "select" => Command::Select { id },
                "delete" => Command::Delete { id },
                _ => Command::RemoveMessage { id },
            }
        }
        "rename" => {
            let (id, title) = arguments
                .split_once(char::is_whitespace)
                .map(|(id, title)| (id, title.trim()))
                .filter(|(_, title)| !title.is_empty())
                .context(MissingArgumentSnafu {
                    stage: "parse-rename",
                    command: "rename",
                    argument: "title",
                })?;
            Command::Rename {
                id: id.to_string(),
                title: title.to_string(),
            }
        }
        "attach" => {
            let file_name = words.next().context(MissingArgumentSnafu {
                stage: "parse-attach",
                command: "attach",
                argument: "name",
            })?;
            let mime_type = words.next().context(MissingArgumentSnafu {
                stage: "parse-attach",
                command: "attach",
                argument: "mime",
            })?;
            let raw_size = words.next().context(MissingArgumentSnafu {
                stage: "parse-attach",
                command: "attach",
                argument: "bytes",
            })?;
            let size_bytes = raw_size.parse::<u64>().context(InvalidSizeSnafu {
                stage: "parse-attach-size",
                raw: raw_size.to_string(),
            })?;
            Command::Attach(FileRef::new(file_name, mime_type, size_bytes))
        }
        "mic" => Command::Mic,
        "language" => Command::Language {
            code: words
                .next()
                .context(MissingArgumentSnafu {
                    stage: "parse-language",
                    command: "language",
                    argument: "code",
                })?
                .to_string(),
        },
        "cancel" => Command::Cancel,
        "show" => Command::Show,
        "models" => Command::Models,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => {
            return UnknownCommandSnafu {
                stage: "parse-command",
                name: name.to_string(),
            }
            .fail();
        }
    };

    Ok(command)
}

pub fn render_message(message: &Message) -> String {
    let speaker = match (&message.role, &message.status) {
        (_, MessageStatus::Error(_)) => "error".to_string(),
        (Role::User, _) => "you".to_string(),
        (Role::Assistant, _) => message
            .model
            .clone()
            .unwrap_or_else(|| "assistant".to_string()),
    };

    let mut rendered = format!("[{speaker}] {}", message.content);
    for file in &message.attachments {
        rendered.push_str(&format!(
            "\n  + {} ({}, {} bytes)",
            file.name, file.mime_type, file.size_bytes
        ));
    }
    rendered.push_str(&format!("\n  id: {}", message.id));
    rendered
}

fn print_models() {
    for model in fimum_models() {
        let description = model.description.unwrap_or_default();
        println!("{:<16} {:<16} {description}", model.id, model.name);
    }
}

/// Terminal front-end over one [`SessionController`].
///
/// Recognizer events arrive on `speech_events`; a finished transcript is sent as a
/// message, the same as a typed line.
pub struct Shell<R> {
    controller: SessionController,
    speech: SpeechInputAdapter<R>,
    speech_events: mpsc::UnboundedReceiver<RecognitionEvent>,
    transcripts: mpsc::UnboundedReceiver<String>,
    settings_store: SettingsStore,
    staged_files: Vec<FileRef>,
}

impl<R: SpeechRecognizer> Shell<R> {
    pub fn new(
        controller: SessionController,
        mut speech: SpeechInputAdapter<R>,
        speech_events: mpsc::UnboundedReceiver<RecognitionEvent>,
        settings_store: SettingsStore,
    ) -> Self {
        let (transcript_tx, transcripts) = mpsc::unbounded_channel();
        speech.on_result(move |transcript| {
            let _ = transcript_tx.send(transcript);
        });

        Self {
            controller,
            speech,
            speech_events,
            transcripts,
            settings_store,
            staged_files: Vec::new(),
        }
    }

    pub async fn run(self) -> ShellResult<()> {
        println!("Fimum ready. /login to begin, /help for commands.");
        let input = BufReader::new(tokio::io::stdin());
        self.run_with_input(input).await
    }

    pub async fn run_with_input<I>(mut self, input: I) -> ShellResult<()>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = line.context(ReadInputSnafu {
                        stage: "read-command-line",
                    })?;
                    let Some(line) = line else {
                        break;
                    };
                    if !self.handle_line(&line, &mut lines).await? {
                        break;
                    }
                }
                Some(event) = self.speech_events.recv() => {
                    self.dictate(event, &mut lines).await?;
                }
            }
        }

        self.speech.stop();
        self.controller.logout();
        Ok(())
    }

    /// Returns `false` once the user asks to quit.
    async fn handle_line<I>(&mut self, line: &str, lines: &mut Lines<I>) -> ShellResult<bool>
    where
        I: AsyncBufRead + Unpin,
    {
        if line.trim().is_empty() {
            return Ok(true);
        }

        match parse_command(line) {
            Ok(Command::Quit) => return Ok(false),
            Ok(Command::Say(text)) => self.say(text, lines).await?,
            Ok(command) => self.execute(command),
            Err(error) => println!("{error}"),
        }
        Ok(true)
    }

    /// Applies one recognizer event and sends any transcript it produced.
    async fn dictate<I>(&mut self, event: RecognitionEvent, lines: &mut Lines<I>) -> ShellResult<()>
    where
        I: AsyncBufRead + Unpin,
    {
        if let Err(error) = self.speech.handle_event(event) {
            println!("{error}");
            return Ok(());
        }

        while let Ok(transcript) = self.transcripts.try_recv() {
            println!("heard: {transcript}");
            self.say(transcript, lines).await?;
        }
        Ok(())
    }

    fn execute(&mut self, command: Command) {
        let result = match command {
            Command::Login { email, password } => self
                .controller
                .login(&Credential::new(email, password))
                .map(|session| println!("signed in as {}", session.email)),
            Command::Signup { email, password } => self
                .controller
                .signup(&Credential::new(email, password))
                .map(|session| println!("account created for {}", session.email)),
            Command::Logout => {
                self.controller.logout();
                self.staged_files.clear();
                println!("signed out");
                Ok(())
            }
            Command::New { title } => self
                .controller
                .create_conversation(title)
                .map(|conversation| println!("{} {}", conversation.id, conversation.title)),
            Command::List => {
                self.print_conversations();
                Ok(())
            }
            Command::Select { id } => ConversationId::parse(&id)
                .and_then(|id| self.controller.select_conversation(id))
                .map(|()| self.print_active()),
            Command::Delete { id } => ConversationId::parse(&id)
                .and_then(|id| self.controller.delete_conversation(id))
                .map(|removed| println!("deleted {}", removed.title)),
            Command::Rename { id, title } => match ConversationId::parse(&id) {
                Ok(id) => self
                    .controller
                    .rename_conversation(id, title)
                    .map(|conversation| println!("renamed to {}", conversation.title)),
                Err(error) => Err(error),
            },
            Command::RemoveMessage { id } => self.remove_message(&id),
            Command::Attach(file) => {
                println!("staged {}", file.name);
                self.staged_files.push(file);
                Ok(())
            }
            Command::Mic => {
                self.toggle_listening();
                Ok(())
            }
            Command::Language { code } => {
                self.set_language(code);
                Ok(())
            }
            Command::Cancel => {
                if self.controller.cancel_pending().is_none() {
                    println!("nothing to cancel");
                }
                Ok(())
            }
            Command::Show => {
                self.print_active();
                Ok(())
            }
            Command::Models => {
                print_models();
                Ok(())
            }
            Command::Help => {
                println!("{HELP_TEXT}");
                Ok(())
            }
            Command::Quit | Command::Say(_) => Ok(()),
        };

        if let Err(error) = result {
            println!("error: {error}");
        }
    }

    async fn say<I>(&mut self, text: String, lines: &mut Lines<I>) -> ShellResult<()>
    where
        I: AsyncBufRead + Unpin,
    {
        let files = std::mem::take(&mut self.staged_files);
        let outcome = match self.controller.submit(text, files.clone()) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.staged_files = files;
                println!("error: {error}");
                return Ok(());
            }
        };

        match outcome {
            SubmitOutcome::Dispatched(_) => self.await_reply(lines).await,
            SubmitOutcome::EmptyInput => {
                self.staged_files = files;
                Ok(())
            }
            SubmitOutcome::ResponsePending(_) => {
                self.staged_files = files;
                println!("still waiting for the previous reply");
                Ok(())
            }
        }
    }

    /// Waits for the pending reply while still accepting `/cancel`.
    async fn await_reply<I>(&mut self, lines: &mut Lines<I>) -> ShellResult<()>
    where
        I: AsyncBufRead + Unpin,
    {
        loop {
            tokio::select! {
                applied = self.controller.next_reply() => {
                    self.print_reply(applied);
                    return Ok(());
                }
                line = lines.next_line() => {
                    let line = line.context(ReadInputSnafu {
                        stage: "read-while-pending",
                    })?;
                    match line.as_deref().map(str::trim) {
                        Some("/cancel") => {
                            self.controller.cancel_pending();
                            println!("cancelled");
                            return Ok(());
                        }
                        Some(_) => println!("waiting for reply, /cancel to abort"),
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    fn print_reply(&self, applied: Option<ReplyApplied>) {
        let Some(ReplyApplied::Appended {
            conversation_id,
            message_id,
            ..
        }) = applied
        else {
            return;
        };

        let reply = self
            .controller
            .conversations()
            .get(conversation_id)
            .and_then(|conversation| conversation.messages.get(message_id));
        if let Some(reply) = reply {
            println!("{}", render_message(reply));
        }
    }

    fn toggle_listening(&mut self) {
        if self.speech.is_listening() {
            self.speech.stop();
            println!("stopped listening");
            return;
        }

        match self.speech.start() {
            Ok(()) => println!("listening ({})...", self.speech.language()),
            Err(error) => println!("{error}"),
        }
    }

    fn set_language(&mut self, code: String) {
        self.speech.set_language(code);

        let language = self.speech.language().to_string();
        match self
            .settings_store
            .update(|settings| settings.speech.language = language)
        {
            Ok(_) => println!("dictation language set to {}", self.speech.language()),
            Err(error) => {
                tracing::warn!(%error, "failed to persist dictation language");
                println!(
                    "dictation language set to {} (not saved)",
                    self.speech.language()
                );
            }
        }
    }

    fn remove_message(&mut self, raw_id: &str) -> Result<(), ChatError> {
        let message_id = MessageId::parse(raw_id)?;
        let Some(conversation_id) = self.controller.session().active_conversation_id else {
            println!("no active conversation");
            return Ok(());
        };
        self.controller.delete_message(conversation_id, message_id)?;
        println!("message removed");
        Ok(())
    }

    fn print_conversations(&self) {
        let active_id = self.controller.session().active_conversation_id;
        for conversation in self.controller.conversations().list() {
            let marker = if Some(conversation.id) == active_id {
                "*"
            } else {
                " "
            };
            println!(
                "{marker} {} {} ({} messages)",
                conversation.id,
                conversation.title,
                conversation.messages.len()
            );
        }
    }

    fn print_active(&self) {
        let Some(conversation) = self.controller.conversations().active() else {
            println!("no active conversation");
            return;
        };
        println!("== {}", conversation.title);
        for message in self.controller.current_messages() {
            println!("{}", render_message(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use fimum_chat::{ChatConfig, ChatContext, ListeningState, LocalAuthenticator};
    use fimum_llm::{CannedReplyConfig, CannedReplyGenerator};

    use super::*;
    use crate::settings::SETTINGS_FILE_NAME;

    struct Microphone;

    impl SpeechRecognizer for Microphone {
        fn is_supported(&self) -> bool {
            true
        }

        fn begin(&mut self, _language: &str) -> Result<(), String> {
            Ok(())
        }

        fn end(&mut self) {}
    }

    fn dictation_shell(settings_path: std::path::PathBuf) -> Shell<Microphone> {
        let generator = Arc::new(CannedReplyGenerator::new(CannedReplyConfig {
            latency: Duration::ZERO,
        }));
        let context = ChatContext::init(Arc::new(LocalAuthenticator::default()));
        let mut controller = SessionController::new(context, generator, ChatConfig::default());
        controller
            .login(&Credential::new("voice@example.com", "password123"))
            .unwrap();

        let (_event_tx, speech_events) = mpsc::unbounded_channel();
        Shell::new(
            controller,
            SpeechInputAdapter::new(Microphone),
            speech_events,
            SettingsStore::new(settings_path),
        )
    }

    #[tokio::test]
    async fn dictated_transcript_is_sent_as_a_message() {
        let directory = tempfile::tempdir().unwrap();
        let mut shell = dictation_shell(directory.path().join(SETTINGS_FILE_NAME));
        let mut lines = BufReader::new(&b""[..]).lines();

        shell.execute(Command::Mic);
        assert_eq!(shell.speech.state(), ListeningState::Listening);

        let utterance = RecognitionEvent::Result("hello from the mic".to_string());
        shell.dictate(utterance, &mut lines).await.unwrap();

        assert_eq!(shell.speech.state(), ListeningState::Idle);
        let first = &shell.controller.current_messages()[0];
        assert_eq!(first.role, Role::User);
        assert_eq!(first.content, "hello from the mic");
    }

    #[tokio::test]
    async fn recognizer_errors_submit_nothing() {
        let directory = tempfile::tempdir().unwrap();
        let mut shell = dictation_shell(directory.path().join(SETTINGS_FILE_NAME));
        let mut lines = BufReader::new(&b""[..]).lines();

        shell.execute(Command::Mic);
        let denied = RecognitionEvent::Error("not-allowed".to_string());
        shell.dictate(denied, &mut lines).await.unwrap();

        assert_eq!(shell.speech.state(), ListeningState::Idle);
        assert!(shell.controller.current_messages().is_empty());
    }

    #[test]
    fn mic_command_toggles_listening() {
        let directory = tempfile::tempdir().unwrap();
        let mut shell = dictation_shell(directory.path().join(SETTINGS_FILE_NAME));

        shell.execute(Command::Mic);
        assert!(shell.speech.is_listening());
        shell.execute(Command::Mic);
        assert!(!shell.speech.is_listening());
    }

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse_command("  what is rust?  ").unwrap(),
            Command::Say("what is rust?".to_string())
        );
    }

    #[test]
    fn credentials_need_both_parts() {
        assert_eq!(
            parse_command("/login demo@example.com hunter22").unwrap(),
            Command::Login {
                email: "demo@example.com".to_string(),
                password: "hunter22".to_string(),
            }
        );
        assert!(matches!(
            parse_command("/signup demo@example.com"),
            Err(ShellError::MissingArgument {
                argument: "password",
                ..
            })
        ));
    }

    #[test]
    fn new_takes_the_rest_of_the_line_as_title() {
        assert_eq!(
            parse_command("/new Trip to Lisbon").unwrap(),
            Command::New {
                title: "Trip to Lisbon".to_string()
            }
        );
        assert_eq!(
            parse_command("/new").unwrap(),
            Command::New {
                title: String::new()
            }
        );
    }

    #[test]
    fn rename_requires_a_title() {
        assert_eq!(
            parse_command("/rename abc  New name ").unwrap(),
            Command::Rename {
                id: "abc".to_string(),
                title: "New name".to_string(),
            }
        );
        assert!(matches!(
            parse_command("/rename abc"),
            Err(ShellError::MissingArgument { .. })
        ));
    }

    #[test]
    fn attach_parses_size() {
        assert_eq!(
            parse_command("/attach cat.png image/png 2048").unwrap(),
            Command::Attach(FileRef::new("cat.png", "image/png", 2048))
        );
        assert!(matches!(
            parse_command("/attach cat.png image/png big"),
            Err(ShellError::InvalidSize { .. })
        ));
    }

    #[test]
    fn models_command_takes_no_arguments() {
        assert_eq!(parse_command("/models").unwrap(), Command::Models);
    }

    #[test]
    fn language_needs_a_code() {
        assert_eq!(
            parse_command("/language fr-FR").unwrap(),
            Command::Language {
                code: "fr-FR".to_string()
            }
        );
        assert!(parse_command("/language").is_err());
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert!(matches!(
            parse_command("/teleport"),
            Err(ShellError::UnknownCommand { ref name, .. }) if name == "teleport"
        ));
    }

    #[test]
    fn error_messages_render_with_error_speaker() {
        let rendered = render_message(&Message::assistant_error("boom"));
        assert!(rendered.starts_with("[error] "));
        assert!(!rendered.contains("boom"));
    }
}
