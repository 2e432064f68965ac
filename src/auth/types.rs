//! Authentication user types.

use crate::db::UserRole;
use crate::jwt::AccessClaims;

/// Identity attached to a request by a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// JWT claims from the access token
    pub claims: AccessClaims,
}

impl AuthenticatedUser {
    /// The user's UUID.
    pub fn uuid(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> UserRole {
        self.claims.role
    }
}
