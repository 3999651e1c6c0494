use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use fimum_chat::{AuthConfig, ChatConfig, DEFAULT_RECOGNITION_LANGUAGE};
use fimum_llm::{CANNED_GENERATOR_ID, CannedReplyConfig, GeneratorConfig};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "fimum";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplySettings {
    #[serde(default = "default_generator_id")]
    pub generator_id: String,
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            generator_id: default_generator_id(),
            latency_ms: default_latency_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            min_password_length: default_min_password_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FimumSettings {
    #[serde(default)]
    pub reply: ReplySettings,
    #[serde(default)]
    pub speech: SpeechSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl FimumSettings {
    pub fn normalized(mut self) -> Self {
        self.reply.generator_id = if self.reply.generator_id.trim().is_empty() {
            default_generator_id()
        } else {
            self.reply.generator_id.trim().to_string()
        };
        // A zero deadline would fail every exchange before it starts.
        if self.reply.timeout_secs == 0 {
            self.reply.timeout_secs = default_timeout_secs();
        }
        self.speech.language = if self.speech.language.trim().is_empty() {
            default_language()
        } else {
            self.speech.language.trim().to_string()
        };
        self.auth.min_password_length = self.auth.min_password_length.max(1);
        self
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            generator_id: self.reply.generator_id.clone(),
            canned: CannedReplyConfig {
                latency: Duration::from_millis(self.reply.latency_ms),
            },
        }
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            reply_timeout: Duration::from_secs(self.reply.timeout_secs),
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            min_password_length: self.auth.min_password_length,
        }
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Settings shared between the shell and the controller wiring.
///
/// Reads never block on disk; `update` applies an edit, normalizes it, and writes the
/// file before publishing the new value.
pub struct SettingsStore {
    current: ArcSwap<FimumSettings>,
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        let settings = read_settings(&path);
        Self {
            current: ArcSwap::from_pointee(settings),
            path,
        }
    }

    /// Opens `<config dir>/fimum/settings.json`, or `.fimum/settings.json` without one.
    pub fn load() -> Self {
        let directory = dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".fimum"));
        Self::new(directory.join(SETTINGS_FILE_NAME))
    }

    pub fn settings(&self) -> Arc<FimumSettings> {
        self.current.load_full()
    }

    pub fn update(
        &self,
        edit: impl FnOnce(&mut FimumSettings),
    ) -> SettingsResult<Arc<FimumSettings>> {
        let mut settings = FimumSettings::clone(&self.current.load());
        edit(&mut settings);
        let settings = Arc::new(settings.normalized());

        self.write(&settings)?;
        self.current.store(Arc::clone(&settings));
        Ok(settings)
    }

    fn write(&self, settings: &FimumSettings) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(EncodeSettingsSnafu {
            stage: "serialize-settings",
        })?;

        // Readers only ever see a complete file.
        let staging_path = self.path.with_extension("json.tmp");
        std::fs::write(&staging_path, content).context(WriteFileSnafu {
            stage: "write-staged-settings",
            path: staging_path.clone(),
        })?;
        std::fs::rename(&staging_path, &self.path).context(WriteFileSnafu {
            stage: "replace-settings-file",
            path: self.path.clone(),
        })?;

        tracing::info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

fn read_settings(path: &Path) -> FimumSettings {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no settings file, using defaults");
        return FimumSettings::default();
    }

    let figment = Figment::from(Serialized::defaults(FimumSettings::default()))
        .merge(Json::file(path));
    match figment.extract::<FimumSettings>() {
        Ok(settings) => {
            tracing::debug!(path = %path.display(), "settings loaded");
            settings.normalized()
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "unreadable settings, using defaults");
            FimumSettings::default()
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to encode settings on `{stage}`: {source}"))]
    EncodeSettings {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

fn default_generator_id() -> String {
    CANNED_GENERATOR_ID.to_string()
}

fn default_latency_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_language() -> String {
    DEFAULT_RECOGNITION_LANGUAGE.to_string()
}

fn default_min_password_length() -> usize {
    fimum_chat::auth::DEFAULT_MIN_PASSWORD_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(directory.path().join("absent.json"));

        let settings = store.settings();
        assert_eq!(settings.reply.generator_id, CANNED_GENERATOR_ID);
        assert_eq!(settings.reply.timeout_secs, 30);
        assert_eq!(settings.speech.language, "en-US");
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(SETTINGS_FILE_NAME);
        std::fs::write(
            &path,
            r#"{ "reply": { "latency_ms": 5 }, "speech": { "language": " de-DE " } }"#,
        )
        .unwrap();

        let settings = SettingsStore::new(path).settings();
        assert_eq!(settings.reply.latency_ms, 5);
        assert_eq!(settings.reply.timeout_secs, 30);
        assert_eq!(settings.speech.language, "de-DE");
        assert_eq!(
            settings.generator_config().canned.latency,
            Duration::from_millis(5)
        );
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let settings = SettingsStore::new(path).settings();
        assert_eq!(*settings, FimumSettings::default());
    }

    #[test]
    fn update_persists_normalized_settings() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("nested").join(SETTINGS_FILE_NAME);
        let store = SettingsStore::new(path.clone());

        let updated = store
            .update(|settings| {
                settings.reply.timeout_secs = 0;
                settings.reply.generator_id = "  ".to_string();
                settings.speech.language = "pt-BR".to_string();
            })
            .unwrap();

        assert_eq!(updated.reply.timeout_secs, 30);
        assert_eq!(updated.reply.generator_id, CANNED_GENERATOR_ID);
        assert_eq!(*store.settings(), *updated);

        let reloaded = SettingsStore::new(path).settings();
        assert_eq!(*reloaded, *updated);
        assert_eq!(reloaded.speech.language, "pt-BR");
    }
}
