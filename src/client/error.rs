/// Errors surfaced by the API client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Renewal failed; the session is gone and the user must log in again.
    #[error("session expired, please log in again")]
    SessionExpired,
    /// The server rejected the request's credentials (HTTP 401).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    /// Any other non-success response.
    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether the failure means the access token was not accepted.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        ClientError::InvalidUrl(e.to_string())
    }
}
