use std::fmt;
use std::sync::Arc;

use snafu::{OptionExt, ensure};
use uuid::Uuid;

use super::error::{ChatResult, InvalidCredentialSnafu, NotAuthenticatedSnafu};

pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token treated as an opaque string by the chat core.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("AuthToken(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub email: String,
    pub token: AuthToken,
}

pub trait Authenticator: Send + Sync {
    fn login(&self, credential: &Credential) -> ChatResult<AuthSession>;
    fn signup(&self, credential: &Credential) -> ChatResult<AuthSession>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }
}

/// Offline authenticator: accepts any well-formed credential and mints a random token.
#[derive(Debug, Clone, Default)]
pub struct LocalAuthenticator {
    config: AuthConfig,
}

impl LocalAuthenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn validate(&self, credential: &Credential, stage: &'static str) -> ChatResult<()> {
        let email = credential.email.as_str();
        let well_formed_email = email
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && !domain.is_empty());
        ensure!(
            well_formed_email,
            InvalidCredentialSnafu {
                stage,
                reason: "email address is malformed",
            }
        );
        ensure!(
            credential.password.chars().count() >= self.config.min_password_length,
            InvalidCredentialSnafu {
                stage,
                reason: "password is too short",
            }
        );
        Ok(())
    }

    fn mint_session(credential: &Credential) -> AuthSession {
        AuthSession {
            email: credential.email.clone(),
            token: AuthToken::new(Uuid::new_v4().simple().to_string()),
        }
    }
}

impl Authenticator for LocalAuthenticator {
    fn login(&self, credential: &Credential) -> ChatResult<AuthSession> {
        self.validate(credential, "local-login")?;
        Ok(Self::mint_session(credential))
    }

    fn signup(&self, credential: &Credential) -> ChatResult<AuthSession> {
        self.validate(credential, "local-signup")?;
        Ok(Self::mint_session(credential))
    }
}

/// Holds the signed-in session, if any.
pub struct AuthGate {
    authenticator: Arc<dyn Authenticator>,
    session: Option<AuthSession>,
}

impl AuthGate {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            session: None,
        }
    }

    pub fn login(&mut self, credential: &Credential) -> ChatResult<&AuthSession> {
        let session = self.authenticator.login(credential)?;
        tracing::info!(email = %session.email, "signed in");
        Ok(self.session.insert(session))
    }

    pub fn signup(&mut self, credential: &Credential) -> ChatResult<&AuthSession> {
        let session = self.authenticator.signup(credential)?;
        tracing::info!(email = %session.email, "account created");
        Ok(self.session.insert(session))
    }

    /// Drops the token. Callers owning chat state must wipe it as well.
    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(email = %session.email, "signed out");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.session.as_ref().map(|session| &session.token)
    }

    pub fn require_session(&self, stage: &'static str) -> ChatResult<&AuthSession> {
        self.session
            .as_ref()
            .context(NotAuthenticatedSnafu { stage })
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthGate")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    fn gate() -> AuthGate {
        AuthGate::new(Arc::new(LocalAuthenticator::default()))
    }

    #[test]
    fn valid_login_unlocks_gate_with_token() {
        let mut gate = gate();
        let session = gate
            .login(&Credential::new("demo@example.com", "correct horse"))
            .unwrap();
        assert_eq!(session.email, "demo@example.com");
        assert!(!session.token.as_str().is_empty());
        assert!(gate.is_authenticated());
        assert!(gate.token().is_some());
    }

    #[test]
    fn malformed_credentials_are_rejected() {
        let mut gate = gate();

        let bad_email = gate.login(&Credential::new("demo.example.com", "long enough"));
        assert!(matches!(
            bad_email,
            Err(ChatError::InvalidCredential { .. })
        ));

        let short_password = gate.signup(&Credential::new("demo@example.com", "short"));
        assert!(matches!(
            short_password,
            Err(ChatError::InvalidCredential { .. })
        ));
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn logout_clears_token() {
        let mut gate = gate();
        gate.login(&Credential::new("a@b.c", "password1")).unwrap();
        gate.logout();

        assert!(!gate.is_authenticated());
        assert!(gate.token().is_none());
        assert!(matches!(
            gate.require_session("test"),
            Err(ChatError::NotAuthenticated { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let credential = Credential::new("a@b.c", "hunter2hunter2");
        assert!(!format!("{credential:?}").contains("hunter2"));

        let token = AuthToken::new("secret-token");
        assert!(!format!("{token:?}").contains("secret-token"));
    }
}
