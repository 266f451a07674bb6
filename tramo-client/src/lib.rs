//! # Tramo Client
//!
//! `tramo-client` is the concrete HTTP implementation of the
//! [`AuthBackend`] contract, speaking the backend's JSON envelope over
//! `reqwest`. It owns the translation from HTTP status codes into the flow
//! error taxonomy: 4xx responses become expected rejections that keep the
//! current flow token alive, while 5xx and transport failures surface as
//! generic unavailability and are the only class logged at error level.

#![warn(missing_docs)]

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use tramo_core::{
    AuthBackend, AuthError, LinkCheck, LoginOutcome, RecoveryChallenge, RecoveryMethod,
    RegisterProfile, ResendMethod, ResetLinkCheck, User, VerifiedLogin,
};

/// Generic acknowledgement used when the backend omits its message.
const GENERIC_MESSAGE: &str = "If the account exists, instructions have been sent to the email.";

/// `reqwest`-backed [`AuthBackend`].
///
/// The session credential, once set, rides along as a bearer header on every
/// request. Flow tokens never pass through here except as opaque request
/// fields.
pub struct HttpBackend {
    http: reqwest::Client,
    base: String,
    credential: RwLock<Option<String>>,
}

impl HttpBackend {
    /// Create a client for the API rooted at `base_url`
    /// (e.g. `http://localhost:5000/api`).
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(base_url)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base: parsed.as_str().trim_end_matches('/').to_string(),
            credential: RwLock::new(None),
        })
    }

    /// Create a client reusing an existing `reqwest` client.
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(base_url)?;
        Ok(Self {
            http,
            base: parsed.as_str().trim_end_matches('/').to_string(),
            credential: RwLock::new(None),
        })
    }

    /// Attach a session credential to subsequent requests.
    pub fn set_credential(&self, credential: impl Into<String>) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential.into());
    }

    /// Drop the session credential.
    pub fn clear_credential(&self) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.credential.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<Envelope<T>, AuthError> {
        let req = self.authorize(self.http.post(self.endpoint(path)).json(body));
        self.execute(path, req).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, AuthError> {
        let req = self.authorize(self.http.get(self.endpoint(path)));
        self.execute(path, req).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>, AuthError> {
        let resp = req.send().await.map_err(|err| {
            log::error!("transport failure for {path}: {err}");
            AuthError::Unavailable(err.to_string())
        })?;

        let status = resp.status();
        if status.is_success() {
            return resp.json::<Envelope<T>>().await.map_err(|err| {
                log::error!("malformed response from {path}: {err}");
                AuthError::Unavailable(err.to_string())
            });
        }

        let body = resp.json::<ErrorBody>().await.unwrap_or_default();
        Err(classify(path, status, body))
    }
}

/// Standard response envelope: `{ success, data, message, error }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn message_or(self, fallback: &str) -> String {
        self.message.unwrap_or_else(|| fallback.to_string())
    }

    fn require_data(self, path: &str) -> Result<T, AuthError> {
        self.data.ok_or_else(|| {
            log::error!("response from {path} is missing its data payload");
            AuthError::Unavailable(format!("missing data in response from {path}"))
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
    attempts_left: Option<u32>,
}

fn classify(path: &str, status: StatusCode, body: ErrorBody) -> AuthError {
    let message = body
        .error
        .or(body.message)
        .unwrap_or_else(|| format!("request rejected ({status})"));
    if status.is_server_error() {
        log::error!("backend fault at {path}: {status} {message}");
        AuthError::Unavailable(message)
    } else {
        log::debug!("expected rejection at {path}: {status} {message}");
        AuthError::Rejected {
            message,
            attempts_left: body.attempts_left,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    #[serde(rename = "requires2FA", default)]
    requires_2fa: bool,
    temp_token: Option<String>,
    token: Option<String>,
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForgotData {
    temp_token: Option<String>,
    security_question: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenData {
    temp_token: Option<String>,
    reset_token: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    user: User,
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let env: Envelope<LoginData> = self
            .post("/auth/login", &json!({ "email": email, "password": password }))
            .await?;
        let data = env.require_data("/auth/login")?;

        if data.requires_2fa || data.temp_token.is_some() {
            let temp_token = data.temp_token.ok_or_else(|| {
                AuthError::Unavailable("2FA required but no token was issued".to_string())
            })?;
            return Ok(LoginOutcome::TwoFactorRequired { temp_token });
        }
        match (data.token, data.user) {
            (Some(token), Some(user)) => Ok(LoginOutcome::Established(VerifiedLogin {
                user,
                credential: token,
            })),
            _ => Err(AuthError::Unavailable(
                "login response carried neither a pending token nor a session".to_string(),
            )),
        }
    }

    async fn verify_two_factor(
        &self,
        temp_token: &str,
        code: &str,
    ) -> Result<VerifiedLogin, AuthError> {
        let env: Envelope<SessionData> = self
            .post(
                "/auth/verify-2fa",
                &json!({ "tempToken": temp_token, "code": code }),
            )
            .await?;
        let data = env.require_data("/auth/verify-2fa")?;
        Ok(VerifiedLogin {
            user: data.user,
            credential: data.token,
        })
    }

    async fn resend_two_factor(
        &self,
        temp_token: &str,
        method: ResendMethod,
    ) -> Result<(), AuthError> {
        self.post::<serde_json::Value>(
            "/auth/resend-2fa",
            &json!({ "tempToken": temp_token, "method": method }),
        )
        .await
        .map(drop)
    }

    async fn register(&self, profile: &RegisterProfile) -> Result<String, AuthError> {
        let env: Envelope<serde_json::Value> = self.post("/auth/register", profile).await?;
        Ok(env.message_or("Account created. Check your email to verify it."))
    }

    async fn verify_registration(&self, email: &str, code: &str) -> Result<String, AuthError> {
        let env: Envelope<serde_json::Value> = self
            .post(
                "/auth/verify-registration",
                &json!({ "email": email, "emailCode": code }),
            )
            .await?;
        Ok(env.message_or("Email verified. You can sign in now."))
    }

    async fn resend_verification_link(&self, email: &str) -> Result<String, AuthError> {
        let env: Envelope<serde_json::Value> = self
            .post("/auth/resend-verification-link", &json!({ "email": email }))
            .await?;
        Ok(env.message_or("A new verification email is on its way."))
    }

    async fn verify_email_link(&self, link_id: &str) -> Result<LinkCheck, AuthError> {
        let env: Envelope<LinkCheck> = self
            .get(&format!("/auth/verify-email-link/{link_id}"))
            .await?;
        env.require_data("/auth/verify-email-link")
    }

    async fn forgot_password(
        &self,
        email: &str,
        method: RecoveryMethod,
    ) -> Result<RecoveryChallenge, AuthError> {
        let env: Envelope<ForgotData> = self
            .post(
                "/auth/forgot-password",
                &json!({ "email": email, "method": method }),
            )
            .await?;
        // data is optional by design: its absence is the generic,
        // account-existence-preserving answer
        let data = env.data.unwrap_or(ForgotData {
            temp_token: None,
            security_question: None,
        });
        Ok(RecoveryChallenge {
            message: env.message.unwrap_or_else(|| GENERIC_MESSAGE.to_string()),
            temp_token: data.temp_token,
            question: data.security_question,
        })
    }

    async fn verify_reset_token(&self, link_id: &str) -> Result<ResetLinkCheck, AuthError> {
        let env: Envelope<ResetLinkCheck> = self
            .get(&format!("/auth/verify-reset-id/{link_id}"))
            .await?;
        env.require_data("/auth/verify-reset-id")
    }

    async fn verify_security_answer(
        &self,
        temp_token: &str,
        answer: &str,
    ) -> Result<String, AuthError> {
        let env: Envelope<TokenData> = self
            .post(
                "/auth/verify-security-answer",
                &json!({ "tempToken": temp_token, "answer": answer }),
            )
            .await?;
        env.require_data("/auth/verify-security-answer")?
            .temp_token
            .ok_or_else(|| {
                AuthError::Unavailable("answer accepted but no token was issued".to_string())
            })
    }

    async fn verify_recovery_code(
        &self,
        temp_token: &str,
        code: &str,
    ) -> Result<String, AuthError> {
        let env: Envelope<TokenData> = self
            .post(
                "/auth/verify-recovery-code",
                &json!({ "tempToken": temp_token, "code": code }),
            )
            .await?;
        env.require_data("/auth/verify-recovery-code")?
            .reset_token
            .ok_or_else(|| {
                AuthError::Unavailable("code accepted but no reset token was issued".to_string())
            })
    }

    async fn resend_recovery_code(
        &self,
        temp_token: &str,
        method: ResendMethod,
    ) -> Result<(), AuthError> {
        self.post::<serde_json::Value>(
            "/auth/resend-recovery-code",
            &json!({ "tempToken": temp_token, "method": method }),
        )
        .await
        .map(drop)
    }

    async fn reset_password_with_link(
        &self,
        temp_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, AuthError> {
        let env: Envelope<serde_json::Value> = self
            .post(
                "/auth/reset-password-link",
                &json!({
                    "tempToken": temp_token,
                    "newPassword": new_password,
                    "confirmPassword": confirm_password,
                }),
            )
            .await?;
        Ok(env.message_or("Password updated. You can sign in now."))
    }

    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, AuthError> {
        let env: Envelope<serde_json::Value> = self
            .post(
                "/auth/reset-password",
                &json!({
                    "resetToken": reset_token,
                    "newPassword": new_password,
                    "confirmPassword": confirm_password,
                }),
            )
            .await?;
        Ok(env.message_or("Password updated. You can sign in now."))
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let result = self
            .post::<serde_json::Value>("/auth/logout", &json!({}))
            .await
            .map(drop);
        self.clear_credential();
        result
    }

    async fn profile(&self) -> Result<User, AuthError> {
        let env: Envelope<ProfileData> = self.get("/user/profile").await?;
        Ok(env.require_data("/user/profile")?.user)
    }

    async fn refresh_token(&self) -> Result<String, AuthError> {
        let env: Envelope<TokenData> = self
            .post("/auth/refresh-token", &json!({}))
            .await?;
        let token = env.require_data("/auth/refresh-token")?.token.ok_or_else(|| {
            AuthError::Unavailable("refresh succeeded but no token was issued".to_string())
        })?;
        self.set_credential(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_survives_a_poisoned_lock() {
        let backend = HttpBackend::new("http://localhost:5000/api").unwrap();
        backend.set_credential("first");

        // poison the lock from a thread that panics while holding it
        let poisoner = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = backend.credential.write().unwrap();
                panic!("poisoning the credential lock");
            })
            .join()
        });
        assert!(poisoner.is_err());

        backend.set_credential("second");
        assert_eq!(
            backend
                .credential
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_deref(),
            Some("second")
        );
        backend.clear_credential();
        assert!(backend
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none());
    }
}
