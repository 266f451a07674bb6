//! Flow transition policy: where a successful stage sends the user next.

use thiserror::Error;
use tramo_core::UserRole;

/// Client-side destinations the flows navigate between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Public landing page.
    Home,
    /// Login entry stage.
    Login,
    /// Two-factor verification stage.
    TwoFactor,
    /// Registration entry stage.
    Register,
    /// Registration email-code verification stage.
    VerifyRegistration,
    /// Recovery entry stage.
    ForgotPassword,
    /// Security-question answer stage.
    SecurityQuestion,
    /// Recovery-code verification stage.
    VerifyRecovery,
    /// Password change stage.
    ResetPassword,
    /// Administrator dashboard.
    AdminDashboard,
    /// Customer dashboard.
    ClientDashboard,
}

impl Route {
    /// The route's path, as the navigation layer sees it.
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::TwoFactor => "/verify-2fa",
            Route::Register => "/register",
            Route::VerifyRegistration => "/verify-registration",
            Route::ForgotPassword => "/forgot-password",
            Route::SecurityQuestion => "/security-question",
            Route::VerifyRecovery => "/verify-recovery",
            Route::ResetPassword => "/reset-password",
            Route::AdminDashboard => "/dashboard/admin",
            Route::ClientDashboard => "/dashboard/cliente",
        }
    }
}

/// Dashboard a freshly authenticated user is sent to.
///
/// An unknown role never lands on a dashboard; it is routed back to login.
pub fn dashboard_for(role: UserRole) -> Route {
    match role {
        UserRole::Admin => Route::AdminDashboard,
        UserRole::Cliente => Route::ClientDashboard,
        UserRole::Unknown => Route::Login,
    }
}

/// A stage was entered without the record its predecessor should have left.
///
/// Not a user-facing error: the caller silently redirects to the carried
/// entry route. No remote call has been made when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("flow entered out of order, redirecting to {}", .0.path())]
pub struct OutOfOrder(pub Route);

impl OutOfOrder {
    /// Entry route to silently redirect to.
    pub fn redirect(&self) -> Route {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_by_role() {
        assert_eq!(dashboard_for(UserRole::Admin), Route::AdminDashboard);
        assert_eq!(dashboard_for(UserRole::Cliente), Route::ClientDashboard);
        assert_eq!(dashboard_for(UserRole::Unknown), Route::Login);
    }

    #[test]
    fn test_paths_are_distinct() {
        let routes = [
            Route::Home,
            Route::Login,
            Route::TwoFactor,
            Route::Register,
            Route::VerifyRegistration,
            Route::ForgotPassword,
            Route::SecurityQuestion,
            Route::VerifyRecovery,
            Route::ResetPassword,
            Route::AdminDashboard,
            Route::ClientDashboard,
        ];
        for (i, a) in routes.iter().enumerate() {
            for b in &routes[i + 1..] {
                assert_ne!(a.path(), b.path());
            }
        }
    }
}
