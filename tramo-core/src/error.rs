use thiserror::Error;

/// Error reported by a remote authentication operation.
///
/// The two variants split the remote failure space the way the flows need it
/// split: an expected rejection keeps the current flow token alive and
/// permits a retry, while an unavailable backend is surfaced generically and
/// is the only class eligible for error-level logging.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The backend understood and rejected the request (wrong code, locked
    /// account, duplicate email, rate limit). Not a system fault.
    #[error("{message}")]
    Rejected {
        /// User-facing message from the backend.
        message: String,
        /// Remaining verification attempts, when the backend reports them.
        attempts_left: Option<u32>,
    },
    /// The backend faulted or could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Build an expected rejection with no attempt counter.
    pub fn rejected(message: impl Into<String>) -> Self {
        AuthError::Rejected {
            message: message.into(),
            attempts_left: None,
        }
    }

    /// Whether retrying the same stage makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Rejected { .. })
    }

    /// The message to surface in the stage's single error slot.
    ///
    /// Appends the remaining-attempts count when the backend reported one;
    /// unavailable backends always surface the same generic text.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Rejected {
                message,
                attempts_left: Some(n),
            } => format!("{message}. Attempts left: {n}"),
            AuthError::Rejected { message, .. } => message.clone(),
            AuthError::Unavailable(_) => "Something went wrong. Try again later.".to_string(),
        }
    }
}

/// Local input shape failure. Never triggers a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Verification code is not exactly six digits.
    #[error("the code must be 6 digits")]
    InvalidCode,
    /// Security answer outside the 2-100 character window after trimming.
    #[error("the answer must be between 2 and 100 characters")]
    InvalidAnswer,
    /// Required email field is empty.
    #[error("email is required")]
    MissingEmail,
    /// Email does not look like an address.
    #[error("the email format is invalid")]
    InvalidEmail,
    /// Required password field is empty.
    #[error("password is required")]
    MissingPassword,
    /// Password does not meet the strength rule.
    #[error(
        "the password needs at least 8 characters with an uppercase letter, \
         a lowercase letter, a digit and a special character"
    )]
    WeakPassword,
    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,
    /// Name outside the 2-100 character window after trimming.
    #[error("the name must be between 2 and 100 characters")]
    InvalidName,
    /// Phone number is not ten digits.
    #[error("the phone number must be 10 digits")]
    InvalidPhone,
    /// Input contains a character from the rejected set.
    #[error(r#"the characters < > ' " ` ; \ are not allowed"#)]
    UnsafeInput,
}
