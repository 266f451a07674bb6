//! Registration flow: account creation, then email verification by code or
//! by out-of-band link.

use std::sync::Arc;

use async_trait::async_trait;

use tramo_core::{validate, AuthBackend, AuthError, RegisterProfile, ValidationError};
use tramo_store::{CredentialStore, FlowKey, FlowRecord};

use crate::policy::{OutOfOrder, Route};
use crate::stage::{StageDriver, StageError, StageSpec};

/// Seconds the link-verified confirmation is displayed before the login
/// redirect.
pub const LINK_CONFIRM_SECONDS: u32 = 3;

/// Outcome of a successful registration-code verification.
#[derive(Debug, Clone)]
pub struct RegistrationVerified {
    /// Backend acknowledgement to show before redirecting.
    pub message: String,
    /// Where the flow terminates. Always login.
    pub next: Route,
}

/// Outcome of a valid out-of-band verification link.
#[derive(Debug, Clone)]
pub struct LinkConfirmed {
    /// Email the link verified, when the backend reports it.
    pub email: Option<String>,
    /// Where to go after the confirmation display. Always login.
    pub next: Route,
    /// How long to show the confirmation before redirecting.
    pub confirm_seconds: u32,
}

/// Orchestrates the registration flow.
pub struct RegistrationFlow<B: AuthBackend + ?Sized> {
    backend: Arc<B>,
    store: Arc<dyn CredentialStore>,
}

impl<B: AuthBackend + ?Sized> RegistrationFlow<B> {
    pub(crate) fn new(backend: Arc<B>, store: Arc<dyn CredentialStore>) -> Self {
        Self { backend, store }
    }

    /// Submit the registration form.
    ///
    /// The whole profile is shape-checked locally first; any failure returns
    /// without a remote call. Success stores the pending email and the caller
    /// proceeds to the verification stage.
    pub async fn begin(&self, profile: RegisterProfile) -> Result<Route, StageError> {
        validate_profile(&profile)?;

        let message = self.backend.register(&profile).await?;
        log::debug!("registration pending for {}: {message}", profile.email);
        self.store
            .put(FlowRecord::RegistrationPending {
                email: profile.email,
            })
            .await?;
        Ok(Route::VerifyRegistration)
    }

    /// Enter the email-code verification stage.
    ///
    /// Entry guard: without a pending registration record the caller
    /// redirects to the registration form. No remote call is made.
    pub async fn code_stage(
        &self,
    ) -> Result<StageDriver<B, RegistrationCodeSpec>, OutOfOrder> {
        let record = self
            .store
            .get(FlowKey::RegistrationPending)
            .await
            .ok()
            .flatten()
            .ok_or(OutOfOrder(Route::Register))?;
        let FlowRecord::RegistrationPending { email } = record else {
            return Err(OutOfOrder(Route::Register));
        };
        Ok(StageDriver::new(
            Arc::clone(&self.backend),
            RegistrationCodeSpec {
                store: Arc::clone(&self.store),
                email,
            },
        ))
    }

    /// Verify an out-of-band registration link carried in a URL.
    ///
    /// The link id never touches the credential store. A valid link discards
    /// the pending registration context and terminates the flow at login
    /// after a short confirmation display.
    pub async fn verify_email_link(&self, link_id: &str) -> Result<LinkConfirmed, StageError> {
        let check = self.backend.verify_email_link(link_id).await?;
        if !check.is_valid {
            return Err(StageError::Rejected(
                "The link is invalid or has expired".to_string(),
            ));
        }
        self.store.clear(FlowKey::RegistrationPending).await?;
        Ok(LinkConfirmed {
            email: check.email,
            next: Route::Login,
            confirm_seconds: LINK_CONFIRM_SECONDS,
        })
    }

    /// Abandon the pending verification stage, clearing its context.
    pub async fn cancel(&self) -> Route {
        if let Err(err) = self.store.clear(FlowKey::RegistrationPending).await {
            log::error!("failed to clear pending registration: {err}");
        }
        Route::Register
    }
}

fn validate_profile(profile: &RegisterProfile) -> Result<(), ValidationError> {
    if !validate::is_input_safe(&profile.name)
        || !validate::is_input_safe(&profile.email)
        || !validate::is_input_safe(&profile.password)
    {
        return Err(ValidationError::UnsafeInput);
    }
    if !validate::is_valid_name(&profile.name) {
        return Err(ValidationError::InvalidName);
    }
    if profile.email.trim().is_empty() {
        return Err(ValidationError::MissingEmail);
    }
    if !validate::is_valid_email(profile.email.trim()) {
        return Err(ValidationError::InvalidEmail);
    }
    if !validate::is_valid_phone(&profile.phone) {
        return Err(ValidationError::InvalidPhone);
    }
    if !validate::is_valid_password(&profile.password) {
        return Err(ValidationError::WeakPassword);
    }
    if profile.password != profile.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Stage spec for the emailed registration code.
pub struct RegistrationCodeSpec {
    store: Arc<dyn CredentialStore>,
    email: String,
}

impl RegistrationCodeSpec {
    /// Email the code was sent to, for display.
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[async_trait]
impl<B: AuthBackend + ?Sized> StageSpec<B> for RegistrationCodeSpec {
    type Outcome = RegistrationVerified;

    fn name(&self) -> &'static str {
        "registration-code"
    }

    fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        validate::validate_code(raw)
    }

    async fn verify(&self, backend: &B, input: &str) -> Result<Self::Outcome, StageError> {
        let message = backend.verify_registration(&self.email, input).await?;
        self.store.clear(FlowKey::RegistrationPending).await?;
        Ok(RegistrationVerified {
            message,
            next: Route::Login,
        })
    }

    async fn resend(&self, backend: &B) -> Result<(), AuthError> {
        backend.resend_verification_link(&self.email).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> RegisterProfile {
        RegisterProfile {
            name: "Ana Torres".into(),
            email: "ana@example.com".into(),
            phone: "5512345678".into(),
            password: "Valid1!@".into(),
            confirm_password: "Valid1!@".into(),
        }
    }

    #[test]
    fn test_profile_accepts_valid_form() {
        assert!(validate_profile(&profile()).is_ok());
    }

    #[test]
    fn test_profile_rejects_each_bad_field() {
        let mut p = profile();
        p.name = "A".into();
        assert_eq!(validate_profile(&p), Err(ValidationError::InvalidName));

        let mut p = profile();
        p.email = "not-an-email".into();
        assert_eq!(validate_profile(&p), Err(ValidationError::InvalidEmail));

        let mut p = profile();
        p.phone = "12345".into();
        assert_eq!(validate_profile(&p), Err(ValidationError::InvalidPhone));

        let mut p = profile();
        p.password = "weak".into();
        p.confirm_password = "weak".into();
        assert_eq!(validate_profile(&p), Err(ValidationError::WeakPassword));

        let mut p = profile();
        p.confirm_password = "Valid1!@x".into();
        assert_eq!(validate_profile(&p), Err(ValidationError::PasswordMismatch));

        let mut p = profile();
        p.name = "Ana<script>".into();
        assert_eq!(validate_profile(&p), Err(ValidationError::UnsafeInput));
    }
}
