use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role assigned to an authenticated user.
///
/// The role decides which dashboard the user lands on after login. Anything
/// the backend sends that is not a known role deserializes to
/// [`UserRole::Unknown`] and is routed back to login rather than to a
/// dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    /// Administrative user.
    #[serde(rename = "ADMIN")]
    Admin,
    /// Regular customer account.
    #[serde(rename = "CLIENTE")]
    Cliente,
    /// Any role the client does not recognize.
    #[serde(other)]
    Unknown,
}

/// A user identity as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend-assigned identifier.
    pub id: String,
    /// Account email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: String,
    /// Role driving post-login routing.
    #[serde(default = "UserRole::unknown")]
    pub role: UserRole,
}

impl UserRole {
    fn unknown() -> Self {
        UserRole::Unknown
    }
}

/// The durable end-state of a completed login flow.
///
/// Created only by session establishment after a successful two-factor
/// verification, destroyed on logout. The `credential` is the opaque session
/// token the backend issued; the client never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedSession {
    /// The authenticated identity.
    pub user: User,
    /// Opaque session credential issued by the backend.
    pub credential: String,
    /// When the session was established on this client.
    pub established_at: DateTime<Utc>,
}

impl AuthenticatedSession {
    /// Create a session established now.
    pub fn new(user: User, credential: impl Into<String>) -> Self {
        Self {
            user,
            credential: credential.into(),
            established_at: Utc::now(),
        }
    }
}
