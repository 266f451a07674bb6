//! Login flow: password check, mandatory second factor, session
//! establishment.

use std::sync::Arc;

use async_trait::async_trait;

use tramo_core::{
    validate, AuthBackend, AuthError, LoginOutcome, ResendMethod, ValidationError, VerifiedLogin,
};
use tramo_store::{CredentialStore, FlowKey, FlowRecord};

use crate::policy::{OutOfOrder, Route};
use crate::session::SessionEstablisher;
use crate::stage::{StageDriver, StageError, StageSpec};

/// Result of the password stage.
#[derive(Debug)]
pub enum LoginBegun {
    /// A second factor is required; proceed to the 2FA stage.
    TwoFactorRequired,
    /// The backend established the session outright; the caller receives the
    /// verified login for session establishment.
    Established(VerifiedLogin),
}

/// Orchestrates the login flow against a backend and a credential store.
pub struct LoginFlow<B: AuthBackend + ?Sized> {
    backend: Arc<B>,
    store: Arc<dyn CredentialStore>,
    establisher: SessionEstablisher,
}

impl<B: AuthBackend + ?Sized> LoginFlow<B> {
    pub(crate) fn new(
        backend: Arc<B>,
        store: Arc<dyn CredentialStore>,
        establisher: SessionEstablisher,
    ) -> Self {
        Self {
            backend,
            store,
            establisher,
        }
    }

    /// Submit email and password.
    ///
    /// Shape checks are presence-only here; whether the credentials are right
    /// is the backend's call. On a 2FA-required response the pending login
    /// record is stored and the caller moves to the 2FA stage.
    pub async fn begin(&self, email: &str, password: &str) -> Result<LoginBegun, StageError> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingEmail.into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingPassword.into());
        }

        match self.backend.login(email.trim(), password).await? {
            LoginOutcome::TwoFactorRequired { temp_token } => {
                self.store
                    .put(FlowRecord::LoginPending { temp_token })
                    .await?;
                Ok(LoginBegun::TwoFactorRequired)
            }
            LoginOutcome::Established(verified) => Ok(LoginBegun::Established(verified)),
        }
    }

    /// Enter the 2FA stage.
    ///
    /// Entry guard: without a pending login record the flow was entered out
    /// of order and the caller redirects to login. No remote call is made in
    /// that case.
    pub async fn two_factor_stage(
        &self,
    ) -> Result<StageDriver<B, TwoFactorSpec>, OutOfOrder> {
        let record = self
            .store
            .get(FlowKey::LoginPending)
            .await
            .ok()
            .flatten()
            .ok_or(OutOfOrder(Route::Login))?;
        let FlowRecord::LoginPending { temp_token } = record else {
            return Err(OutOfOrder(Route::Login));
        };
        Ok(StageDriver::new(
            Arc::clone(&self.backend),
            TwoFactorSpec {
                store: Arc::clone(&self.store),
                temp_token,
            },
        ))
    }

    /// Finish the flow for a verified login: commit the session and navigate
    /// by role (with the hard-navigation fallback armed). Works from either
    /// end of the flow, the 2FA stage or a direct password-only login.
    pub async fn complete(&self, verified: VerifiedLogin) -> Route {
        self.establisher.establish(verified).await
    }

    /// Abandon the pending 2FA stage, clearing its token.
    pub async fn cancel_two_factor(&self) -> Route {
        if let Err(err) = self.store.clear(FlowKey::LoginPending).await {
            log::error!("failed to clear pending login: {err}");
        }
        Route::Login
    }
}

/// Stage spec for the mandatory second factor.
pub struct TwoFactorSpec {
    store: Arc<dyn CredentialStore>,
    temp_token: String,
}

#[async_trait]
impl<B: AuthBackend + ?Sized> StageSpec<B> for TwoFactorSpec {
    type Outcome = VerifiedLogin;

    fn name(&self) -> &'static str {
        "two-factor"
    }

    fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        validate::validate_code(raw)
    }

    async fn verify(&self, backend: &B, input: &str) -> Result<Self::Outcome, StageError> {
        let verified = backend.verify_two_factor(&self.temp_token, input).await?;
        // the pending token is spent; the session credential replaces it
        self.store.clear(FlowKey::LoginPending).await?;
        Ok(verified)
    }

    async fn resend(&self, backend: &B) -> Result<(), AuthError> {
        backend
            .resend_two_factor(&self.temp_token, ResendMethod::Email)
            .await
    }
}
