//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with different HS256 secrets, so a
//! leaked access secret cannot be used to forge refresh tokens and vice versa.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::db::{User, UserRole};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token, sent as a Bearer header
    Access,
    /// Long-lived refresh token, only ever sent in the refresh cookie
    Refresh,
}

/// JWT claims. Access and refresh tokens share the same payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// Normalized email
    pub email: String,
    /// User role
    pub role: UserRole,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Unique token ID
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Claims carried by an access token.
pub type AccessClaims = Claims;

/// Claims carried by a refresh token.
pub type RefreshClaims = Claims;

/// Default access token lifetime: 15 minutes
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKey {
    fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

/// Configuration for JWT operations.
pub struct JwtConfig {
    access: SigningKey,
    refresh: SigningKey,
}

/// Result of generating a token.
#[derive(Debug, Clone)]
pub struct TokenResult {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

impl JwtConfig {
    /// Create a JWT configuration with distinct secrets and lifetimes.
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: SigningKey::new(access_secret, access_ttl),
            refresh: SigningKey::new(refresh_secret, refresh_ttl),
        }
    }

    /// Create a JWT configuration with the default lifetimes.
    pub fn with_default_ttls(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::new(
            access_secret,
            refresh_secret,
            DEFAULT_ACCESS_TOKEN_TTL,
            DEFAULT_REFRESH_TOKEN_TTL,
        )
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> u64 {
        self.access.ttl.as_secs()
    }

    /// Refresh token lifetime in seconds.
    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh.ttl.as_secs()
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<TokenResult, JwtError> {
        mint(&self.access, user, TokenType::Access)
    }

    /// Generate a refresh token for a user.
    pub fn generate_refresh_token(&self, user: &User) -> Result<TokenResult, JwtError> {
        mint(&self.refresh, user, TokenType::Refresh)
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let claims: Claims = decode(&self.access, token)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let claims: Claims = decode(&self.refresh, token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

fn mint(key: &SigningKey, user: &User, token_type: TokenType) -> Result<TokenResult, JwtError> {
    let now = now_secs()?;
    let duration = key.ttl.as_secs();
    let exp = now.checked_add(duration).ok_or(JwtError::TimeError)?;

    let claims = Claims {
        sub: user.uuid.clone(),
        email: user.email.clone(),
        role: user.role,
        token_type,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now,
        exp,
    };

    let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
        .map_err(JwtError::Encoding)?;

    Ok(TokenResult {
        token,
        expires_at: exp,
        duration,
    })
}

fn decode<T: DeserializeOwned>(key: &SigningKey, token: &str) -> Result<T, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    jsonwebtoken::decode::<T>(token, &key.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                JwtError::Expired
            } else {
                JwtError::Invalid(e)
            }
        })
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// The token's `exp` has passed
    #[error("token expired")]
    Expired,
    /// Bad signature, malformed token or missing claims
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    /// Wrong token type (e.g., using refresh token as access token)
    #[error("wrong token type")]
    WrongTokenType,
    /// Error encoding the token
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    /// System clock before the epoch, or an expiry past `u64::MAX`
    #[error("system time error")]
    TimeError,
}

impl JwtError {
    /// Whether the token was rejected only because it expired.
    pub fn is_expired(&self) -> bool {
        matches!(self, JwtError::Expired)
    }
}
