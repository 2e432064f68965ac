//! JWT authentication with role-based access control.
//!
//! Dual-token system: short-lived access tokens (sent as a Bearer header)
//! and long-lived refresh tokens (HttpOnly cookie scoped to the refresh
//! endpoint). Nothing about a session is stored server-side.

mod cookie;
mod errors;
mod extractors;
mod issuer;
mod state;
mod types;

pub use cookie::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, Auth, OptionalAuth, RoleConstraint, bearer_token};
pub use issuer::{AuthError, AuthService, IssuedSession, normalize_email};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
