use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

/// `Unknown` is only ever the initial phase; once a status exchange completes the session
/// moves between `Authenticated` and `Anonymous`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Unknown,
    Authenticated(User),
    Anonymous,
}

/// Outcome of the capability gate protecting download and forum features.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Pending,
    Allowed,
    Denied,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    phase: SessionPhase,
    in_flight: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Unknown,
            in_flight: 0,
        }
    }
}

impl Session {
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn user(&self) -> Option<&User> {
        match &self.phase {
            SessionPhase::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, SessionPhase::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0 || self.phase == SessionPhase::Unknown
    }

    pub fn access(&self) -> Access {
        if self.is_loading() {
            return Access::Pending;
        }
        if self.is_authenticated() {
            Access::Allowed
        } else {
            Access::Denied
        }
    }

    pub(crate) fn begin_exchange(&mut self) {
        self.in_flight += 1;
    }

    pub(crate) fn end_exchange(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub(crate) fn authenticate(&mut self, user: User) {
        self.phase = SessionPhase::Authenticated(user);
    }

    pub(crate) fn sign_out(&mut self) {
        self.phase = SessionPhase::Anonymous;
    }
}

pub trait CapabilityGate: Send + Sync {
    fn access(&self) -> Access;
}

/// A fixed answer, for consoles or tests that do not track a session.
impl CapabilityGate for Access {
    fn access(&self) -> Access {
        *self
    }
}

impl CapabilityGate for watch::Receiver<Session> {
    fn access(&self) -> Access {
        self.borrow().access()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            username: "alice".into(),
        }
    }

    #[test]
    fn starts_unknown_and_loading() {
        let session = Session::default();
        assert_eq!(session.phase(), &SessionPhase::Unknown);
        assert!(session.is_loading());
        assert!(!session.is_authenticated());
        assert_eq!(session.access(), Access::Pending);
    }

    #[test]
    fn user_present_iff_authenticated() {
        let mut session = Session::default();
        session.authenticate(alice());
        assert!(session.is_authenticated());
        assert_eq!(session.user(), Some(&alice()));
        session.sign_out();
        assert!(!session.is_authenticated());
        assert_eq!(session.user(), None);
    }

    #[test]
    fn gate_denies_anonymous_once_settled() {
        let mut session = Session::default();
        session.sign_out();
        assert!(!session.is_loading());
        assert_eq!(session.access(), Access::Denied);
    }

    #[test]
    fn gate_is_pending_while_exchange_outstanding() {
        let mut session = Session::default();
        session.authenticate(alice());
        assert_eq!(session.access(), Access::Allowed);
        session.begin_exchange();
        assert_eq!(session.access(), Access::Pending);
        session.sign_out();
        assert_eq!(session.access(), Access::Pending);
        session.end_exchange();
        assert_eq!(session.access(), Access::Denied);
    }

    #[test]
    fn end_exchange_never_underflows() {
        let mut session = Session::default();
        session.sign_out();
        session.end_exchange();
        assert!(!session.is_loading());
    }
}
