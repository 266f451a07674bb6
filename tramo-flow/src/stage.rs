//! Generic verification step handler.
//!
//! Every code/answer stage in the three flows shares one shape: read the
//! ephemeral token the previous stage left, accept user input, shape-check it
//! locally, verify it remotely, and either advance (consuming the token) or
//! surface a retryable error (leaving the token alone). [`StageDriver`] owns
//! that machinery once; the per-stage differences (what counts as valid
//! input, which remote call to make, which records to swap on success) live
//! behind the [`StageSpec`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use tramo_core::{AuthBackend, AuthError, ValidationError};

use crate::countdown::{Countdown, STAGE_SECONDS};

/// Where a stage instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Ready for user input.
    AwaitingInput,
    /// A submit or resend is in flight.
    Submitting,
    /// Verification succeeded; this instance is finished.
    Advanced,
    /// Last attempt was rejected; retry is permitted.
    Failed,
    /// The countdown reached zero. Submission is blocked until a resend.
    Expired,
}

/// Error surfaced by a stage's submit or resend.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// Input failed the local shape check. No remote call was made.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// The backend rejected the attempt. The flow token is untouched and the
    /// message already carries the remaining-attempts suffix when reported.
    #[error("{0}")]
    Rejected(String),
    /// The backend faulted or was unreachable.
    #[error("something went wrong, try again later")]
    Unavailable,
    /// The code expired locally; a resend is required before submitting.
    #[error("the code has expired, request a new one")]
    Expired,
    /// A submit or resend is already in flight for this stage instance.
    #[error("a request is already in progress")]
    Busy,
    /// The stage already advanced; this instance is spent.
    #[error("this step is already complete")]
    Completed,
    /// The stage's flow record could not be read or written.
    #[error("credential storage failed: {0}")]
    Store(String),
}

impl From<tramo_store::StoreError> for StageError {
    fn from(err: tramo_store::StoreError) -> Self {
        StageError::Store(err.to_string())
    }
}

impl From<AuthError> for StageError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected { .. } => StageError::Rejected(err.user_message()),
            AuthError::Unavailable(_) => StageError::Unavailable,
        }
    }
}

/// The per-stage half of a verification step.
///
/// A spec is built by its flow at stage entry, after the entry guard has
/// confirmed the required flow record exists, and holds whatever token and
/// context that record carried. `verify` performs the record hand-off itself
/// on success, so the driver observes the swap as a single step.
#[async_trait]
pub trait StageSpec<B: AuthBackend + ?Sized>: Send + Sync {
    /// What a successful verification yields to the transition policy.
    type Outcome: Send;

    /// Stage name for log correlation.
    fn name(&self) -> &'static str;

    /// Shape-check and normalize raw user input. Must not touch the network.
    fn validate(&self, raw: &str) -> Result<String, ValidationError>;

    /// Run the remote verification. On success the implementation clears its
    /// own flow record and writes the next stage's record before returning.
    async fn verify(&self, backend: &B, input: &str) -> Result<Self::Outcome, StageError>;

    /// Ask the backend to resend this stage's code. The pending flow token is
    /// reused; only the countdown is refreshed by the driver afterwards.
    async fn resend(&self, _backend: &B) -> Result<(), AuthError> {
        Err(AuthError::rejected("resend is not available for this step"))
    }
}

/// Drives one stage instance through
/// `AwaitingInput → Submitting → {Advanced | Failed | Expired}`.
pub struct StageDriver<B: AuthBackend + ?Sized, S> {
    id: Uuid,
    backend: Arc<B>,
    spec: S,
    countdown: Countdown,
    status: StageStatus,
    in_flight: bool,
}

impl<B, S> StageDriver<B, S>
where
    B: AuthBackend + ?Sized,
    S: StageSpec<B>,
{
    /// Create a driver with a fresh full countdown.
    pub fn new(backend: Arc<B>, spec: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend,
            spec,
            countdown: Countdown::start(STAGE_SECONDS),
            status: StageStatus::AwaitingInput,
            in_flight: false,
        }
    }

    /// Current lifecycle status, folding in local expiry.
    pub fn status(&self) -> StageStatus {
        if self.status == StageStatus::AwaitingInput && self.countdown.is_expired() {
            StageStatus::Expired
        } else {
            self.status
        }
    }

    /// Seconds left on the stage's code.
    pub fn remaining(&self) -> u32 {
        self.countdown.remaining()
    }

    /// Observe the countdown tick by tick.
    pub fn countdown(&self) -> watch::Receiver<u32> {
        self.countdown.subscribe()
    }

    /// Whether submission is currently possible.
    pub fn can_submit(&self) -> bool {
        !self.in_flight
            && !self.countdown.is_expired()
            && !matches!(self.status, StageStatus::Advanced | StageStatus::Submitting)
    }

    /// Submit user input for verification.
    ///
    /// Shape failures return without any remote call. A rejection leaves the
    /// flow token and the countdown untouched. Expiry is only checked before
    /// the call is issued: a success that lands after the countdown hits zero
    /// still advances the flow.
    pub async fn submit(&mut self, raw: &str) -> Result<S::Outcome, StageError> {
        if self.in_flight {
            return Err(StageError::Busy);
        }
        if self.status == StageStatus::Advanced {
            return Err(StageError::Completed);
        }
        if self.countdown.is_expired() {
            self.status = StageStatus::Expired;
            return Err(StageError::Expired);
        }

        let input = self.spec.validate(raw)?;

        self.in_flight = true;
        self.status = StageStatus::Submitting;
        let result = self.spec.verify(self.backend.as_ref(), &input).await;
        self.in_flight = false;

        match result {
            Ok(outcome) => {
                log::debug!("stage {} ({}) advanced", self.spec.name(), self.id);
                self.status = StageStatus::Advanced;
                self.countdown.stop();
                Ok(outcome)
            }
            Err(err) => {
                match &err {
                    StageError::Unavailable | StageError::Store(_) => {
                        log::error!("stage {} ({}) fault: {err}", self.spec.name(), self.id);
                    }
                    _ => {
                        log::debug!("stage {} ({}) rejected: {err}", self.spec.name(), self.id);
                    }
                }
                self.status = if self.countdown.is_expired() {
                    StageStatus::Expired
                } else {
                    StageStatus::Failed
                };
                Err(err)
            }
        }
    }

    /// Request a fresh code for the same pending flow.
    ///
    /// Allowed after failed attempts and after expiry; on success the
    /// countdown restarts at the full window and the stage returns to
    /// `AwaitingInput`. On failure countdown and token are unchanged.
    pub async fn resend(&mut self) -> Result<(), StageError> {
        if self.in_flight {
            return Err(StageError::Busy);
        }
        if self.status == StageStatus::Advanced {
            return Err(StageError::Completed);
        }

        self.in_flight = true;
        let result = self.spec.resend(self.backend.as_ref()).await;
        self.in_flight = false;

        match result {
            Ok(()) => {
                log::debug!("stage {} ({}) resent code", self.spec.name(), self.id);
                self.countdown.reset(STAGE_SECONDS);
                self.status = StageStatus::AwaitingInput;
                Ok(())
            }
            Err(err) => {
                if !err.is_retryable() {
                    log::error!("stage {} ({}) resend fault: {err}", self.spec.name(), self.id);
                }
                Err(err.into())
            }
        }
    }

    /// Access the stage spec (token, display context).
    pub fn spec(&self) -> &S {
        &self.spec
    }
}
