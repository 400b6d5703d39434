//! Error types for login, token exchange and token storage

/// Errors from the OAuth client.
///
/// Login variants abort the user's login attempt. Exchange variants carry
/// the provider's status and body so the caller can show them. Storage
/// variants come from the token repository.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authorization callback carried no code")]
    MissingCode,

    #[error("authorization callback state does not match the pending login")]
    StateMismatch,

    #[error("pending login has no PKCE code verifier")]
    MissingVerifier,

    #[error("invalid authorization endpoint: {0}")]
    AuthorizationUrl(String),

    #[error("token endpoint request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("token set not persisted: {0}")]
    Persist(String),

    #[error("token store I/O error: {0}")]
    Io(String),

    #[error("token store serialization error: {0}")]
    Serialize(String),
}

impl Error {
    /// True for the errors that end a login attempt at callback time.
    pub fn is_login_error(&self) -> bool {
        matches!(
            self,
            Error::MissingCode | Error::StateMismatch | Error::MissingVerifier
        )
    }

    /// HTTP status returned by the token endpoint, if it answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::TokenEndpoint { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw error body returned by the token endpoint.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::TokenEndpoint { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::MissingCode => "missing_code",
            Error::StateMismatch => "state_mismatch",
            Error::MissingVerifier => "missing_verifier",
            Error::AuthorizationUrl(_) => "authorization_url",
            Error::Http(_) => "http",
            Error::TokenEndpoint { .. } => "token_endpoint",
            Error::InvalidResponse(_) => "invalid_response",
            Error::Persist(_) => "persist",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }
}

/// Result alias for OAuth client operations.
pub type Result<T> = std::result::Result<T, Error>;
