//! Session expiry tracking

/// Where the host should send the operator once the session is gone
pub const LOGIN_REDIRECT: &str = "/login?error=session_expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Expired { status: u16 },
}

/// Remembers that the backend rejected our credentials
///
/// The first 401/403 flips the guard and raises a single login signal; from
/// then on requests fail fast until [`SessionGuard::rearm`].
#[derive(Debug)]
pub struct SessionGuard {
    state: SessionState,
    login_signal: bool,
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGuard {
    pub fn new() -> Self {
        Self {
            state: SessionState::Active,
            login_signal: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.state, SessionState::Expired { .. })
    }

    /// Record an auth failure; returns `true` only for the first one
    pub fn expire(&mut self, status: u16) -> bool {
        if self.is_suspended() {
            return false;
        }
        self.state = SessionState::Expired { status };
        self.login_signal = true;
        true
    }

    /// Consume the pending login signal
    pub fn take_login_required(&mut self) -> bool {
        std::mem::take(&mut self.login_signal)
    }

    pub fn rearm(&mut self) {
        self.state = SessionState::Active;
        self.login_signal = false;
    }
}
