//! Authorization Gate: decides whether a region may render.
//!
//! The decision itself is [`antco_auth::authorize`]; the gate adds the
//! session lifecycle around it (checking on entry, login redirect carrying
//! the requested location, fallback on insufficient privileges) and
//! re-evaluates whenever the session changes.

use std::sync::Arc;

use tokio::sync::watch;

use antco_auth::{AccessRule, AuthorizationExplanation, AuthzError, authorize, explain_authorization};

use crate::navigation::{Redirect, routes};
use crate::session::{Session, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// The session is being validated; render a loading indicator.
    Checking,
    Authorized,
    Denied(Denial),
}

impl GateState {
    pub fn is_authorized(&self) -> bool {
        matches!(self, GateState::Authorized)
    }

    /// The in-app redirect to perform, if any.
    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            GateState::Denied(Denial::Login(r)) => Some(r),
            GateState::Denied(Denial::Unauthorized { redirect, .. }) => Some(redirect),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Not logged in: go to the login page, remembering where we were.
    Login(Redirect),
    /// Logged in but lacking privileges: render the caller's fallback.
    Fallback(AuthzError),
    /// Logged in but lacking privileges: leave for the unauthorized page.
    Unauthorized { redirect: Redirect, reason: AuthzError },
}

/// What a protected region shows to a logged-in user who fails its rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Redirect(String),
    Render,
}

impl Default for Fallback {
    fn default() -> Self {
        Fallback::Redirect(routes::UNAUTHORIZED.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedRegion {
    pub location: String,
    pub rule: AccessRule,
    pub fallback: Fallback,
}

impl ProtectedRegion {
    /// A region that only needs a logged-in user.
    pub fn new(location: impl Into<String>) -> Self {
        Self::with_rule(location, AccessRule::authenticated())
    }

    pub fn with_rule(location: impl Into<String>, rule: AccessRule) -> Self {
        Self {
            location: location.into(),
            rule,
            fallback: Fallback::default(),
        }
    }

    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Pure gate decision for one session snapshot.
pub fn evaluate(session: &Session, region: &ProtectedRegion) -> GateState {
    if session.is_loading {
        return GateState::Checking;
    }

    let user = session.user.as_ref().filter(|_| session.is_authenticated);
    match authorize(user, &region.rule) {
        Ok(()) => GateState::Authorized,
        Err(AuthzError::Unauthenticated) => GateState::Denied(Denial::Login(
            Redirect::to(routes::LOGIN).from_location(region.location.clone()),
        )),
        Err(reason) => match &region.fallback {
            Fallback::Render => GateState::Denied(Denial::Fallback(reason)),
            Fallback::Redirect(path) => GateState::Denied(Denial::Unauthorized {
                redirect: Redirect::to(path.clone()),
                reason,
            }),
        },
    }
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    session: Arc<SessionStore>,
}

impl AuthGate {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    /// State to show before [`AuthGate::enter`] completes.
    pub fn initial_state(&self, region: &ProtectedRegion) -> GateState {
        let session = self.session.snapshot();
        if !session.is_authenticated {
            return GateState::Checking;
        }
        evaluate(&session, region)
    }

    /// Enter a protected region, validating the session first when the
    /// store does not already consider the user logged in.
    pub async fn enter(&self, region: &ProtectedRegion) -> GateState {
        if !self.session.is_authenticated() {
            self.session.check_auth().await;
        }

        let state = evaluate(&self.session.snapshot(), region);
        if let GateState::Denied(denial) = &state {
            tracing::debug!(location = %region.location, ?denial, "gate denied entry");
        }
        state
    }

    /// Gate for public pages such as login and register: a logged-in user
    /// is sent to the dashboard instead.
    pub fn public(&self) -> Option<Redirect> {
        self.session
            .is_authenticated()
            .then(|| Redirect::to(routes::DASHBOARD))
    }

    /// Follow the session and recompute the region's state on every change.
    pub fn watch(&self, region: ProtectedRegion) -> GateWatch {
        GateWatch {
            rx: self.session.subscribe(),
            region,
        }
    }

    pub fn explain(&self, region: &ProtectedRegion) -> AuthorizationExplanation {
        let session = self.session.snapshot();
        let user = session.user.as_ref().filter(|_| session.is_authenticated);
        explain_authorization(user, &region.rule)
    }
}

pub struct GateWatch {
    rx: watch::Receiver<Session>,
    region: ProtectedRegion,
}

impl GateWatch {
    pub fn current(&self) -> GateState {
        evaluate(&self.rx.borrow(), &self.region)
    }

    /// Wait for the next session change and return the new state.
    /// `None` once the session store is gone.
    pub async fn changed(&mut self) -> Option<GateState> {
        self.rx.changed().await.ok()?;
        Some(evaluate(&self.rx.borrow_and_update(), &self.region))
    }
}
