//! # Tramo Flow
//!
//! `tramo-flow` orchestrates the multi-step client-side authentication
//! flows: login with a mandatory second factor, registration with email
//! verification, and password recovery by link or security-question-gated
//! code. It is the bridge between the core backend contract and whatever
//! renders the stages.
//!
//! ## Key components
//!
//! - **[`Tramo`]**: the main service holding the backend, the credential
//!   store, the auth context and the navigation layer.
//! - **[`StageDriver`]**: the generic verification step handler shared by
//!   every code/answer stage.
//! - **[`Countdown`]**: the per-stage expiry timer resource.
//! - **[`AuthContext`]** / **[`SessionEstablisher`]**: application-wide
//!   identity state and the terminal login stage.
//!
//! Every stage enforces the traversal order through its entry guard: a stage
//! whose predecessor left no record redirects to the flow's entry route
//! without touching the network.

#![warn(missing_docs)]

use std::sync::Arc;

use tramo_core::AuthBackend;
use tramo_store::{CredentialStore, MemoryStore};

/// Per-stage expiry countdown.
pub mod countdown;
/// Login flow orchestration.
pub mod login;
/// Flow transition policy and routes.
pub mod policy;
/// Recovery flow orchestration.
pub mod recovery;
/// Registration flow orchestration.
pub mod registration;
/// Session establishment and identity state.
pub mod session;
/// Generic verification step handler.
pub mod stage;

pub use countdown::{format_remaining, Countdown, STAGE_SECONDS};
pub use login::{LoginBegun, LoginFlow, TwoFactorSpec};
pub use policy::{dashboard_for, OutOfOrder, Route};
pub use recovery::{
    AnswerAccepted, CodeAccepted, PasswordChanged, RecoveryCodeSpec, RecoveryFlow,
    RecoveryRequested, SecurityAnswerSpec,
};
pub use registration::{
    LinkConfirmed, RegistrationCodeSpec, RegistrationFlow, RegistrationVerified,
    LINK_CONFIRM_SECONDS,
};
pub use session::{AuthContext, Navigator, SessionEstablisher, NAVIGATION_DEADLINE};
pub use stage::{StageDriver, StageError, StageSpec, StageStatus};

/// The unified flow controller service.
///
/// Cheap to clone pieces out of: each flow accessor builds a lightweight
/// orchestrator sharing the same backend, store and context.
pub struct Tramo<B: AuthBackend + ?Sized> {
    backend: Arc<B>,
    store: Arc<dyn CredentialStore>,
    context: AuthContext,
    navigator: Arc<dyn Navigator>,
}

impl<B: AuthBackend + ?Sized> Tramo<B> {
    /// Start configuring a [`Tramo`] service.
    pub fn builder() -> TramoBuilder<B> {
        TramoBuilder::new()
    }

    /// The shared identity state.
    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    /// The login flow.
    pub fn login(&self) -> LoginFlow<B> {
        LoginFlow::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.store),
            SessionEstablisher::new(self.context.clone(), Arc::clone(&self.navigator)),
        )
    }

    /// The registration flow.
    pub fn registration(&self) -> RegistrationFlow<B> {
        RegistrationFlow::new(Arc::clone(&self.backend), Arc::clone(&self.store))
    }

    /// The recovery flow.
    pub fn recovery(&self) -> RecoveryFlow<B> {
        RecoveryFlow::new(Arc::clone(&self.backend), Arc::clone(&self.store))
    }

    /// End the session: best-effort remote logout, then a full local clear
    /// and a redirect home.
    ///
    /// Local state is cleared whatever the remote call returns; a stale flow
    /// token must never survive into a later, unrelated flow.
    pub async fn logout(&self) -> Route {
        if let Err(err) = self.backend.logout().await {
            log::debug!("remote logout failed, clearing locally anyway: {err}");
        }
        self.context.clear();
        if let Err(err) = self.store.clear_all().await {
            log::error!("failed to clear flow credentials on logout: {err}");
        }
        self.navigator.navigate(Route::Home).await;
        Route::Home
    }

    /// Re-validate the current session against the backend.
    ///
    /// Refreshes the stored identity when the credential still holds;
    /// otherwise logs the user out locally. A no-op when unauthenticated.
    pub async fn check_auth(&self) -> bool {
        let Some(session) = self.context.session() else {
            return false;
        };
        match self.backend.profile().await {
            Ok(user) => {
                self.context.set(tramo_core::AuthenticatedSession {
                    user,
                    ..session
                });
                true
            }
            Err(err) => {
                log::debug!("session credential no longer valid: {err}");
                self.context.clear();
                if let Err(err) = self.store.clear_all().await {
                    log::error!("failed to clear flow credentials: {err}");
                }
                false
            }
        }
    }
}

/// Builder for a [`Tramo`] service.
pub struct TramoBuilder<B: AuthBackend + ?Sized> {
    backend: Option<Arc<B>>,
    store: Option<Arc<dyn CredentialStore>>,
    context: Option<AuthContext>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl<B: AuthBackend + ?Sized> TramoBuilder<B> {
    fn new() -> Self {
        Self {
            backend: None,
            store: None,
            context: None,
            navigator: None,
        }
    }

    /// Set the remote backend. Required.
    pub fn backend(mut self, backend: Arc<B>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the credential store. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing auth context. Defaults to a fresh one.
    pub fn context(mut self, context: AuthContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Set the navigation layer. Required.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Build the service.
    ///
    /// # Panics
    ///
    /// Panics if the backend or the navigator was not provided; both are
    /// wiring, not runtime input.
    pub fn build(self) -> Tramo<B> {
        Tramo {
            backend: self.backend.expect("Tramo requires a backend"),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            context: self.context.unwrap_or_default(),
            navigator: self.navigator.expect("Tramo requires a navigator"),
        }
    }
}

impl<B: AuthBackend + ?Sized> Default for TramoBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}
