use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::state::User;

/// Channel over which a verification code is (re)delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResendMethod {
    /// Deliver by email.
    Email,
    /// Deliver by SMS.
    Sms,
}

/// How the user wants to recover a forgotten password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMethod {
    /// Emailed verification code.
    Code,
    /// Emailed time-limited reset link.
    Link,
    /// Pre-configured security question, then a code.
    SecurityQuestion,
}

/// Profile fields submitted when creating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProfile {
    /// Display name, 2-100 characters.
    pub name: String,
    /// Account email.
    pub email: String,
    /// Ten-digit phone number.
    pub phone: String,
    /// Chosen password.
    pub password: String,
    /// Password confirmation, must match.
    pub confirm_password: String,
}

/// Result of the initial password check.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Password accepted; a second factor is required. The `temp_token`
    /// scopes the pending two-factor stage and nothing else.
    TwoFactorRequired {
        /// Ephemeral credential for the 2FA stage.
        temp_token: String,
    },
    /// The backend established a session without a second factor.
    Established(VerifiedLogin),
}

/// A fully verified login, ready for session establishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedLogin {
    /// The authenticated identity.
    pub user: User,
    /// Opaque session credential.
    pub credential: String,
}

/// Backend response to a password recovery request.
///
/// The message is generic by design: it reads the same whether or not the
/// account exists. A token (and, on the security-question path, the question
/// text) is only present when the backend chose to open a recovery stage.
#[derive(Debug, Clone, Default)]
pub struct RecoveryChallenge {
    /// Generic acknowledgement to show the user.
    pub message: String,
    /// Ephemeral credential for the next recovery stage, if one was opened.
    pub temp_token: Option<String>,
    /// Security question text, present only on that path.
    pub question: Option<String>,
}

/// Result of checking an out-of-band email verification link.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCheck {
    /// Whether the link is still valid.
    pub is_valid: bool,
    /// Email the link was issued for, when valid.
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of checking an out-of-band password reset link.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetLinkCheck {
    /// Whether the link is still valid.
    pub is_valid: bool,
    /// Ephemeral credential for the reset stage, when valid. Carried in
    /// memory only, never written to the credential store.
    #[serde(default)]
    pub temp_token: Option<String>,
}

/// Every remote operation the authentication flows consume.
///
/// The wire format is the backend's business; implementations translate it
/// into these types and into the [`AuthError`] taxonomy. All flow tokens are
/// opaque strings: the client never inspects or parses them.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Check email and password. Success either opens the 2FA stage or
    /// establishes a session outright.
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError>;

    /// Verify the six-digit second factor for a pending login.
    async fn verify_two_factor(
        &self,
        temp_token: &str,
        code: &str,
    ) -> Result<VerifiedLogin, AuthError>;

    /// Ask for the 2FA code to be sent again. The pending flow and its token
    /// are unchanged.
    async fn resend_two_factor(
        &self,
        temp_token: &str,
        method: ResendMethod,
    ) -> Result<(), AuthError>;

    /// Create an account. Success leaves the account pending email
    /// verification and returns the backend's acknowledgement message.
    async fn register(&self, profile: &RegisterProfile) -> Result<String, AuthError>;

    /// Verify the emailed registration code for `email`.
    async fn verify_registration(&self, email: &str, code: &str) -> Result<String, AuthError>;

    /// Ask for a fresh verification link/code for a pending registration.
    async fn resend_verification_link(&self, email: &str) -> Result<String, AuthError>;

    /// Check an out-of-band registration link by its URL-carried id.
    async fn verify_email_link(&self, link_id: &str) -> Result<LinkCheck, AuthError>;

    /// Start password recovery for `email` using `method`.
    async fn forgot_password(
        &self,
        email: &str,
        method: RecoveryMethod,
    ) -> Result<RecoveryChallenge, AuthError>;

    /// Check an out-of-band reset link by its URL-carried id.
    async fn verify_reset_token(&self, link_id: &str) -> Result<ResetLinkCheck, AuthError>;

    /// Verify the security answer. Success returns the token for the
    /// recovery-code stage.
    async fn verify_security_answer(
        &self,
        temp_token: &str,
        answer: &str,
    ) -> Result<String, AuthError>;

    /// Verify the recovery code. Success returns the reset token.
    async fn verify_recovery_code(&self, temp_token: &str, code: &str)
        -> Result<String, AuthError>;

    /// Ask for the recovery code to be sent again.
    async fn resend_recovery_code(
        &self,
        temp_token: &str,
        method: ResendMethod,
    ) -> Result<(), AuthError>;

    /// Change the password at the end of the link recovery path.
    async fn reset_password_with_link(
        &self,
        temp_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, AuthError>;

    /// Change the password at the end of the code recovery path.
    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, AuthError>;

    /// Invalidate the session server-side. Best effort: callers clear local
    /// state regardless of the outcome.
    async fn logout(&self) -> Result<(), AuthError>;

    /// Fetch the profile for the current session credential.
    async fn profile(&self) -> Result<User, AuthError>;

    /// Exchange the current session credential for a fresh one.
    async fn refresh_token(&self) -> Result<String, AuthError> {
        Err(AuthError::rejected(
            "token refresh not supported by this backend",
        ))
    }
}
