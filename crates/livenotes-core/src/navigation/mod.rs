//! Route guard between the sign-in screens and the notes screens.

use crate::auth::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Splash shown until the first identity report arrives
    Loading,
    /// Sign-in screens
    Login,
    /// Signed-in screens (note list, profile)
    Notes,
}

impl Route {
    pub const fn in_auth_group(self) -> bool {
        matches!(self, Self::Login)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Stay,
    Redirect(Route),
}

/// Decide where a view on `current` belongs for `state`.
pub const fn resolve_route(state: &SessionState, current: Route) -> RouteDecision {
    match state {
        SessionState::Initializing if matches!(current, Route::Loading) => RouteDecision::Stay,
        SessionState::Initializing => RouteDecision::Redirect(Route::Loading),
        SessionState::Unauthenticated if current.in_auth_group() => RouteDecision::Stay,
        SessionState::Unauthenticated => RouteDecision::Redirect(Route::Login),
        SessionState::Authenticated(_) if matches!(current, Route::Notes) => RouteDecision::Stay,
        SessionState::Authenticated(_) => RouteDecision::Redirect(Route::Notes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;

    #[test]
    fn loading_blocks_every_screen() {
        assert_eq!(
            resolve_route(&SessionState::Initializing, Route::Notes),
            RouteDecision::Redirect(Route::Loading)
        );
        assert_eq!(
            resolve_route(&SessionState::Initializing, Route::Loading),
            RouteDecision::Stay
        );
    }

    #[test]
    fn signed_out_users_land_on_login() {
        assert_eq!(
            resolve_route(&SessionState::Unauthenticated, Route::Notes),
            RouteDecision::Redirect(Route::Login)
        );
        assert_eq!(
            resolve_route(&SessionState::Unauthenticated, Route::Login),
            RouteDecision::Stay
        );
    }

    #[test]
    fn signed_in_users_leave_the_auth_group() {
        let state = SessionState::Authenticated(Identity::new("u1"));
        assert!(Route::Login.in_auth_group());
        assert_eq!(
            resolve_route(&state, Route::Login),
            RouteDecision::Redirect(Route::Notes)
        );
        assert_eq!(resolve_route(&state, Route::Notes), RouteDecision::Stay);
    }
}
