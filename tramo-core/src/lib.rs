//! # Tramo Core
//!
//! `tramo-core` provides the foundational types and traits for the tramo
//! authentication flow controller. It defines the user identity model, the
//! error taxonomy shared by every flow, the local input shape validators, and
//! the [`AuthBackend`] trait describing every remote operation the flows
//! consume.
//!
//! The crate is deliberately free of any HTTP machinery: the concrete wire
//! client lives in `tramo-client`, and anything implementing [`AuthBackend`]
//! (including a test double) can drive the flows in `tramo-flow`.

#![warn(missing_docs)]

/// Remote operation contract consumed by the flows.
pub mod backend;

/// Errors that can occur while driving an authentication flow.
pub mod error;

/// User identity and session types.
pub mod state;

/// Local input shape validation.
pub mod validate;

pub use backend::{
    AuthBackend, LinkCheck, LoginOutcome, RecoveryChallenge, RecoveryMethod, RegisterProfile,
    ResendMethod, ResetLinkCheck, VerifiedLogin,
};
pub use error::{AuthError, ValidationError};
pub use state::{AuthenticatedSession, User, UserRole};
