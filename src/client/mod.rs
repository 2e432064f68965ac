//! Client side of the session protocol.
//!
//! [`ApiClient`] keeps the access token in memory and the refresh token in
//! its cookie jar. Expired access tokens are renewed by the
//! [`RenewalCoordinator`], which guarantees at most one renewal exchange at
//! a time no matter how many requests fail together.

mod coordinator;
mod error;
mod http;
mod token;
mod types;

pub use coordinator::{DEFAULT_RENEWAL_DEADLINE, RenewalCoordinator, Renewer, SessionState};
pub use error::ClientError;
pub use http::{ApiClient, HttpRenewer, TaskInput};
pub use token::TokenStore;
pub use types::{AccessToken, AuthSession, Pagination, TaskPage, TaskRecord, UserProfile};
