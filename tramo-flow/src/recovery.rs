//! Password recovery: emailed link, emailed code, or security-question-gated
//! code, ending in a password change.

use std::sync::Arc;

use async_trait::async_trait;

use tramo_core::{validate, AuthBackend, AuthError, RecoveryMethod, ResendMethod, ValidationError};
use tramo_store::{CredentialStore, FlowKey, FlowRecord};

use crate::policy::{OutOfOrder, Route};
use crate::stage::{StageDriver, StageError, StageSpec};

/// Result of a recovery request.
///
/// The message is always the backend's generic acknowledgement: it reads the
/// same whether or not the account exists. `next` is `None` exactly when the
/// flow has no further client stage right now (link method waiting for the
/// out-of-band click, or the security-question path with no question
/// configured).
#[derive(Debug, Clone)]
pub struct RecoveryRequested {
    /// Generic acknowledgement to show the user.
    pub message: String,
    /// Next client-side stage, when one was opened.
    pub next: Option<Route>,
}

/// Outcome of a successful security-answer verification.
#[derive(Debug, Clone)]
pub struct AnswerAccepted {
    /// Next stage: the recovery-code verification.
    pub next: Route,
}

/// Outcome of a successful recovery-code verification.
#[derive(Debug, Clone)]
pub struct CodeAccepted {
    /// Next stage: the password change.
    pub next: Route,
}

/// Outcome of a completed password change.
#[derive(Debug, Clone)]
pub struct PasswordChanged {
    /// Backend acknowledgement to show before redirecting.
    pub message: String,
    /// Where the flow terminates. Always login.
    pub next: Route,
}

/// Orchestrates the recovery flow.
pub struct RecoveryFlow<B: AuthBackend + ?Sized> {
    backend: Arc<B>,
    store: Arc<dyn CredentialStore>,
}

impl<B: AuthBackend + ?Sized> RecoveryFlow<B> {
    pub(crate) fn new(backend: Arc<B>, store: Arc<dyn CredentialStore>) -> Self {
        Self { backend, store }
    }

    /// Request recovery for `email` using `method`.
    ///
    /// Whatever the method, the caller gets the same generic message whether
    /// or not the account exists; pending records are only written when the
    /// backend actually opened a stage. On the security-question path with no
    /// question configured nothing is stored and nothing navigates.
    pub async fn request(
        &self,
        email: &str,
        method: RecoveryMethod,
    ) -> Result<RecoveryRequested, StageError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingEmail.into());
        }
        if !validate::is_valid_email(email) {
            return Err(ValidationError::InvalidEmail.into());
        }

        let challenge = self.backend.forgot_password(email, method).await?;

        let next = match method {
            RecoveryMethod::SecurityQuestion => {
                match (challenge.temp_token, challenge.question) {
                    (Some(temp_token), Some(question)) => {
                        self.store
                            .put(FlowRecord::SecurityPending {
                                temp_token,
                                email: email.to_string(),
                                question,
                            })
                            .await?;
                        Some(Route::SecurityQuestion)
                    }
                    // no question configured (or no account): generic
                    // message, nothing stored, no navigation
                    _ => None,
                }
            }
            RecoveryMethod::Code => {
                if let Some(temp_token) = challenge.temp_token {
                    self.store
                        .put(FlowRecord::RecoveryPending {
                            temp_token,
                            email: email.to_string(),
                        })
                        .await?;
                }
                // the code stage is entered either way; its guard bounces
                // back here when no record was written
                Some(Route::VerifyRecovery)
            }
            // the reset link arrives out of band; no client stage until the
            // user clicks it
            RecoveryMethod::Link => None,
        };

        Ok(RecoveryRequested {
            message: challenge.message,
            next,
        })
    }

    /// Enter the security-answer stage.
    pub async fn answer_stage(
        &self,
    ) -> Result<StageDriver<B, SecurityAnswerSpec>, OutOfOrder> {
        let record = self
            .store
            .get(FlowKey::SecurityPending)
            .await
            .ok()
            .flatten()
            .ok_or(OutOfOrder(Route::ForgotPassword))?;
        let FlowRecord::SecurityPending {
            temp_token,
            email,
            question,
        } = record
        else {
            return Err(OutOfOrder(Route::ForgotPassword));
        };
        Ok(StageDriver::new(
            Arc::clone(&self.backend),
            SecurityAnswerSpec {
                store: Arc::clone(&self.store),
                temp_token,
                email,
                question,
            },
        ))
    }

    /// Enter the recovery-code stage.
    pub async fn code_stage(&self) -> Result<StageDriver<B, RecoveryCodeSpec>, OutOfOrder> {
        let record = self
            .store
            .get(FlowKey::RecoveryPending)
            .await
            .ok()
            .flatten()
            .ok_or(OutOfOrder(Route::ForgotPassword))?;
        let FlowRecord::RecoveryPending { temp_token, email } = record else {
            return Err(OutOfOrder(Route::ForgotPassword));
        };
        Ok(StageDriver::new(
            Arc::clone(&self.backend),
            RecoveryCodeSpec {
                store: Arc::clone(&self.store),
                temp_token,
                email,
            },
        ))
    }

    /// Change the password at the end of the code path.
    ///
    /// Entry guard: requires the reset record the code stage left. Local
    /// checks run first; success discards the whole recovery context and
    /// terminates at login.
    pub async fn reset_password(
        &self,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<PasswordChanged, StageError> {
        let record = self
            .store
            .get(FlowKey::ResetReady)
            .await
            .ok()
            .flatten()
            .ok_or(StageError::Rejected(
                "The recovery session has expired".to_string(),
            ))?;
        let FlowRecord::ResetReady { reset_token } = record else {
            return Err(StageError::Rejected(
                "The recovery session has expired".to_string(),
            ));
        };

        check_new_password(new_password, confirm_password)?;

        let message = self
            .backend
            .reset_password(&reset_token, new_password, confirm_password)
            .await?;
        self.store.clear(FlowKey::ResetReady).await?;
        self.store.clear(FlowKey::RecoveryPending).await?;
        Ok(PasswordChanged {
            message,
            next: Route::Login,
        })
    }

    /// Check an out-of-band reset link carried in a URL.
    ///
    /// The returned token stays in memory only; the link path never writes
    /// the credential store.
    pub async fn verify_reset_link(&self, link_id: &str) -> Result<String, StageError> {
        let check = self.backend.verify_reset_token(link_id).await?;
        match (check.is_valid, check.temp_token) {
            (true, Some(temp_token)) => Ok(temp_token),
            _ => Err(StageError::Rejected(
                "The link is invalid or has expired".to_string(),
            )),
        }
    }

    /// Change the password at the end of the link path.
    pub async fn reset_password_with_link(
        &self,
        temp_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<PasswordChanged, StageError> {
        check_new_password(new_password, confirm_password)?;
        let message = self
            .backend
            .reset_password_with_link(temp_token, new_password, confirm_password)
            .await?;
        Ok(PasswordChanged {
            message,
            next: Route::Login,
        })
    }

    /// Abandon the security-answer stage, clearing its context.
    pub async fn cancel_answer(&self) -> Route {
        if let Err(err) = self.store.clear(FlowKey::SecurityPending).await {
            log::error!("failed to clear pending security stage: {err}");
        }
        Route::ForgotPassword
    }

    /// Abandon the recovery-code stage, clearing its context.
    pub async fn cancel_code(&self) -> Route {
        if let Err(err) = self.store.clear(FlowKey::RecoveryPending).await {
            log::error!("failed to clear pending recovery: {err}");
        }
        Route::ForgotPassword
    }
}

fn check_new_password(new_password: &str, confirm_password: &str) -> Result<(), ValidationError> {
    if new_password.is_empty() {
        return Err(ValidationError::MissingPassword);
    }
    if !validate::is_valid_password(new_password) {
        return Err(ValidationError::WeakPassword);
    }
    if new_password != confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Stage spec for the security answer.
pub struct SecurityAnswerSpec {
    store: Arc<dyn CredentialStore>,
    temp_token: String,
    email: String,
    question: String,
}

impl SecurityAnswerSpec {
    /// Question text, for display. The answer is only ever checked remotely.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Email under recovery, for display.
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[async_trait]
impl<B: AuthBackend + ?Sized> StageSpec<B> for SecurityAnswerSpec {
    type Outcome = AnswerAccepted;

    fn name(&self) -> &'static str {
        "security-answer"
    }

    fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        validate::validate_answer(raw)
    }

    async fn verify(&self, backend: &B, input: &str) -> Result<Self::Outcome, StageError> {
        let next_token = backend
            .verify_security_answer(&self.temp_token, input)
            .await?;
        // hand off: the answer token is spent, the narrower code token
        // replaces it
        self.store.clear(FlowKey::SecurityPending).await?;
        self.store
            .put(FlowRecord::RecoveryPending {
                temp_token: next_token,
                email: self.email.clone(),
            })
            .await?;
        Ok(AnswerAccepted {
            next: Route::VerifyRecovery,
        })
    }
}

/// Stage spec for the emailed recovery code.
pub struct RecoveryCodeSpec {
    store: Arc<dyn CredentialStore>,
    temp_token: String,
    email: String,
}

impl RecoveryCodeSpec {
    /// Email under recovery, for display.
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[async_trait]
impl<B: AuthBackend + ?Sized> StageSpec<B> for RecoveryCodeSpec {
    type Outcome = CodeAccepted;

    fn name(&self) -> &'static str {
        "recovery-code"
    }

    fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        validate::validate_code(raw)
    }

    async fn verify(&self, backend: &B, input: &str) -> Result<Self::Outcome, StageError> {
        let reset_token = backend
            .verify_recovery_code(&self.temp_token, input)
            .await?;
        self.store.clear(FlowKey::RecoveryPending).await?;
        self.store
            .put(FlowRecord::ResetReady { reset_token })
            .await?;
        Ok(CodeAccepted {
            next: Route::ResetPassword,
        })
    }

    async fn resend(&self, backend: &B) -> Result<(), AuthError> {
        backend
            .resend_recovery_code(&self.temp_token, ResendMethod::Email)
            .await
    }
}
