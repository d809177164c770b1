//! Shared-secret check in front of the couple's dashboard.
//!
//! This is a convenience gate, not an authentication system: no sessions,
//! no tokens, no lockout. The client keeps the password in memory and
//! presents it again on every dashboard request.

use std::fmt;

#[derive(Clone)]
pub struct AdminGate {
    secret: String,
}

impl AdminGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Exact comparison against the configured secret. No trimming or case folding.
    pub fn verify(&self, candidate: &str) -> bool {
        !candidate.is_empty() && candidate == self.secret
    }
}

impl fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminGate").finish_non_exhaustive()
    }
}
