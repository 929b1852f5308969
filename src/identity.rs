// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Authenticated identity boundary.
//!
//! The remote store partitions documents per user and refuses to run without
//! one. Where the identity comes from (OAuth, device pairing) is the host's
//! business; the engine only asks who is signed in right now.

use parking_lot::RwLock;

pub trait IdentityProvider: Send + Sync {
    /// Id of the signed-in user, or `None` when signed out.
    fn current_user(&self) -> Option<String>;
}

/// Identity held in memory, switchable at runtime (sign-in / sign-out).
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self { user: RwLock::new(Some(user_id.into())) }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user.write() = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.user.write() = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        self.user.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let identity = StaticIdentity::signed_out();
        assert_eq!(identity.current_user(), None);

        identity.sign_in("user-1");
        assert_eq!(identity.current_user().as_deref(), Some("user-1"));

        identity.sign_out();
        assert!(identity.current_user().is_none());
    }
}
