//! Session establishment and application-wide identity state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use tramo_core::{AuthenticatedSession, User, VerifiedLogin};

use crate::policy::{dashboard_for, Route};

/// How long the primary in-app navigation gets before the hard fallback
/// fires.
pub const NAVIGATION_DEADLINE: Duration = Duration::from_millis(1500);

const CONFIRM_POLL: Duration = Duration::from_millis(100);

/// Navigation seam between the flows and the host application.
///
/// `navigate` is the ordinary client-side route change and is allowed to fail
/// silently; `force_navigate` is the reload-style fallback that must not.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Attempt an in-app route change.
    async fn navigate(&self, route: Route);

    /// Hard, reload-style navigation to `route`.
    async fn force_navigate(&self, route: Route);

    /// Path the user is currently on.
    fn current(&self) -> String;
}

/// Shared authenticated-identity state with an update-and-notify contract.
///
/// Handed explicitly to every component that needs identity or role; cloning
/// is cheap and every clone observes the same state. Subscribers see each
/// change through a watch channel, so concurrently rendered surfaces reflect
/// a login before any navigation happens.
#[derive(Debug, Clone)]
pub struct AuthContext {
    tx: Arc<watch::Sender<Option<AuthenticatedSession>>>,
}

impl AuthContext {
    /// Create an unauthenticated context.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The current session, if any.
    pub fn session(&self) -> Option<AuthenticatedSession> {
        self.tx.borrow().clone()
    }

    /// The current user, if authenticated.
    pub fn user(&self) -> Option<User> {
        self.tx.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Whether a session is established.
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Observe every session change.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthenticatedSession>> {
        self.tx.subscribe()
    }

    /// Commit a session and notify subscribers.
    pub fn set(&self, session: AuthenticatedSession) {
        self.tx.send_replace(Some(session));
    }

    /// Drop the session and notify subscribers.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal stage of the login flow: commit identity, then land the user on
/// the right dashboard even if client-side routing fails silently.
pub struct SessionEstablisher {
    context: AuthContext,
    navigator: Arc<dyn Navigator>,
}

impl SessionEstablisher {
    /// Create an establisher over the given context and navigation layer.
    pub fn new(context: AuthContext, navigator: Arc<dyn Navigator>) -> Self {
        Self { context, navigator }
    }

    /// Establish the session for a verified login and navigate by role.
    ///
    /// Identity is committed first, so any rendered surface reflects the
    /// logged-in state before navigation. The page the user is on is
    /// snapshotted before the primary in-app transition runs, whichever stage
    /// the flow finished on; the deadline then arms against that snapshot: if
    /// the location is still the origin when it fires, a hard navigation
    /// forces the landing, and if the transition is confirmed earlier the
    /// deadline is cancelled and no reload happens.
    pub async fn establish(&self, verified: VerifiedLogin) -> Route {
        let target = dashboard_for(verified.user.role);
        let origin = self.navigator.current();
        let session = AuthenticatedSession::new(verified.user, verified.credential);
        log::debug!("session established for {}", session.user.email);
        self.context.set(session);

        self.navigator.navigate(target).await;

        let deadline = tokio::time::sleep(NAVIGATION_DEADLINE);
        tokio::pin!(deadline);
        loop {
            if self.navigator.current() != origin {
                // primary transition confirmed, fallback cancelled
                return target;
            }
            tokio::select! {
                () = &mut deadline => {
                    log::warn!(
                        "in-app navigation to {} not confirmed, forcing reload",
                        target.path()
                    );
                    self.navigator.force_navigate(target).await;
                    return target;
                }
                () = tokio::time::sleep(CONFIRM_POLL) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tramo_core::UserRole;

    fn verified(role: UserRole) -> VerifiedLogin {
        VerifiedLogin {
            user: User {
                id: "u1".into(),
                email: "a@b.com".into(),
                name: "A".into(),
                phone: String::new(),
                role,
            },
            credential: "S1".into(),
        }
    }

    /// Navigator double: optionally ignores in-app navigation.
    struct FakeNavigator {
        soft_works: bool,
        location: Mutex<String>,
        forced: Mutex<Vec<Route>>,
    }

    impl FakeNavigator {
        fn new(soft_works: bool, at: Route) -> Arc<Self> {
            Arc::new(Self {
                soft_works,
                location: Mutex::new(at.path().to_string()),
                forced: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Navigator for FakeNavigator {
        async fn navigate(&self, route: Route) {
            if self.soft_works {
                *self.location.lock().unwrap() = route.path().to_string();
            }
        }

        async fn force_navigate(&self, route: Route) {
            self.forced.lock().unwrap().push(route);
            *self.location.lock().unwrap() = route.path().to_string();
        }

        fn current(&self) -> String {
            self.location.lock().unwrap().clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_commits_before_navigation() {
        let context = AuthContext::new();
        let navigator = FakeNavigator::new(true, Route::TwoFactor);
        let establisher = SessionEstablisher::new(context.clone(), navigator);

        let mut seen = context.subscribe();
        let target = establisher.establish(verified(UserRole::Cliente)).await;

        assert_eq!(target, Route::ClientDashboard);
        assert!(context.is_authenticated());
        assert!(seen.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_routes_to_admin_dashboard() {
        let context = AuthContext::new();
        let navigator = FakeNavigator::new(true, Route::TwoFactor);
        let establisher = SessionEstablisher::new(context, Arc::clone(&navigator) as _);

        let target = establisher.establish(verified(UserRole::Admin)).await;

        assert_eq!(target, Route::AdminDashboard);
        assert_eq!(navigator.current(), Route::AdminDashboard.path());
        assert!(navigator.forced.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_routing_failure_forces_reload() {
        let context = AuthContext::new();
        let navigator = FakeNavigator::new(false, Route::TwoFactor);
        let establisher = SessionEstablisher::new(context, Arc::clone(&navigator) as _);

        let target = establisher.establish(verified(UserRole::Cliente)).await;

        assert_eq!(target, Route::ClientDashboard);
        assert_eq!(
            navigator.forced.lock().unwrap().as_slice(),
            &[Route::ClientDashboard]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_arms_whatever_page_the_flow_finished_on() {
        // a login established without a second factor leaves the user on the
        // login page; a silent routing failure there must still force the
        // landing
        let context = AuthContext::new();
        let navigator = FakeNavigator::new(false, Route::Login);
        let establisher = SessionEstablisher::new(context, Arc::clone(&navigator) as _);

        let target = establisher.establish(verified(UserRole::Cliente)).await;

        assert_eq!(target, Route::ClientDashboard);
        assert_eq!(
            navigator.forced.lock().unwrap().as_slice(),
            &[Route::ClientDashboard]
        );
        assert_eq!(navigator.current(), Route::ClientDashboard.path());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_role_lands_on_login() {
        let context = AuthContext::new();
        let navigator = FakeNavigator::new(true, Route::TwoFactor);
        let establisher = SessionEstablisher::new(context, navigator);

        let target = establisher.establish(verified(UserRole::Unknown)).await;
        assert_eq!(target, Route::Login);
    }
}
