//! Credential issuer: turns verified identities into signed token pairs.

use std::sync::Arc;

use tracing::{info, warn};

use crate::db::{Database, NewUser, User, UserRole, is_unique_violation};
use crate::jwt::{JwtConfig, JwtError, TokenResult};
use crate::password::{self, PasswordError};

/// Failures raised by the issuer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered")]
    Conflict,
    /// Shared by "unknown email" and "wrong password".
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is deactivated")]
    AccountDisabled,
    #[error("Refresh token expired")]
    TokenExpired,
    #[error("Invalid refresh token")]
    TokenInvalid,
    /// The renewal token names a user that no longer exists.
    #[error("User no longer exists")]
    UnknownSubject,
    #[error("User not found")]
    UserNotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hashing(#[from] PasswordError),
    #[error("token generation failed: {0}")]
    Token(JwtError),
}

/// A freshly authenticated user with both tokens.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub access: TokenResult,
    pub refresh: TokenResult,
}

/// Trim surrounding whitespace and lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(db: Database, jwt: Arc<JwtConfig>) -> Self {
        Self { db, jwt }
    }

    /// Create an account and sign the user in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        let email = normalize_email(email);

        // Early exit only; the UNIQUE constraint decides races.
        if self.db.users().email_exists(&email).await? {
            return Err(AuthError::Conflict);
        }

        let password_hash = password::hash_password_blocking(password.to_string()).await?;
        let uuid = uuid::Uuid::new_v4().to_string();
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        let id = self
            .db
            .users()
            .create(&NewUser {
                uuid: &uuid,
                email: &email,
                password_hash: &password_hash,
                name,
                role: UserRole::User,
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuthError::Conflict
                } else {
                    AuthError::Database(e)
                }
            })?;

        let user = self
            .db
            .users()
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(user = %user.uuid, "User registered");
        self.issue(user)
    }

    /// Check credentials and sign the user in.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let email = normalize_email(email);
        let credentials = self.db.users().get_credentials_by_email(&email).await?;

        let Some(credentials) = credentials else {
            password::verify_password_blocking(
                password.to_string(),
                password::dummy_hash().to_string(),
            )
            .await?;
            return Err(AuthError::InvalidCredentials);
        };

        let matches =
            password::verify_password_blocking(password.to_string(), credentials.password_hash)
                .await?;

        // A deactivated account is refused before the password result is used.
        if !credentials.user.is_active {
            warn!(user = %credentials.user.uuid, "Login refused: account deactivated");
            return Err(AuthError::AccountDisabled);
        }
        if !matches {
            warn!(user = %credentials.user.uuid, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user = %credentials.user.uuid, "User logged in");
        self.issue(credentials.user)
    }

    /// Exchange a renewal token for a new access token. The renewal token
    /// itself is not rotated.
    pub async fn renew(&self, refresh_token: &str) -> Result<TokenResult, AuthError> {
        let claims = self.jwt.validate_refresh_token(refresh_token).map_err(|e| {
            if e.is_expired() {
                AuthError::TokenExpired
            } else {
                AuthError::TokenInvalid
            }
        })?;

        let user = self
            .db
            .users()
            .get_by_uuid(&claims.sub)
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        if !user.is_active {
            warn!(user = %user.uuid, "Renewal refused: account deactivated");
            return Err(AuthError::AccountDisabled);
        }

        self.jwt
            .generate_access_token(&user)
            .map_err(AuthError::Token)
    }

    /// Load the current profile for a verified subject.
    pub async fn current_user(&self, uuid: &str) -> Result<User, AuthError> {
        self.db
            .users()
            .get_by_uuid(uuid)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    fn issue(&self, user: User) -> Result<IssuedSession, AuthError> {
        let access = self
            .jwt
            .generate_access_token(&user)
            .map_err(AuthError::Token)?;
        let refresh = self
            .jwt
            .generate_refresh_token(&user)
            .map_err(AuthError::Token)?;
        Ok(IssuedSession {
            user,
            access,
            refresh,
        })
    }
}
