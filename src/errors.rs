//! Error taxonomy. `ForgeError` and `CacheError` follow the structured-enum
//! idiom (`thiserror`); `AuthError` keeps the teacher's own hand-rolled
//! `Display`/`Error` impls, since that is how the codebase this crate is
//! adapted from expresses auth-layer failures.

use thiserror::Error;

/// Errors from `Transport` and `ForgeClient`. One variant per bucket in the
/// error-handling taxonomy: configuration, transient I/O, authoritative
/// rejection, cache corruption (surfaced only where a caller must react to
/// it directly; most corruption is handled silently inside DiskTier),
/// GraphQL, and cancellation.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ForgeError>,
    },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("forge rejected the request ({status}): {body}")]
    Authoritative { status: u16, body: String },

    #[error("graphql error: {0}")]
    GraphQl(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("pr-count lookup failed recently and is cached as a failure: {0}")]
    CachedFailure(String),
}

impl ForgeError {
    /// Retriable per §4.6: 429, any 5xx, or a network error whose message
    /// matches one of the known-transient substrings.
    pub fn is_retriable(&self) -> bool {
        match self {
            ForgeError::Authoritative { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            ForgeError::Transient(_) => true,
            ForgeError::Http(e) => {
                let msg = e.to_string().to_lowercase();
                ["rate limited", "server error", "connection refused", "timeout", "temporary failure", "eof"]
                    .iter()
                    .any(|needle| msg.contains(needle))
            }
            _ => false,
        }
    }
}

/// Errors constructing or operating the disk cache tier.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache directory must be an absolute path, got {0:?}")]
    RelativeDirectory(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Auth-layer errors, matching the teacher's `models::auth::AuthError` shape:
/// a plain enum with manual `Display`/`Error`, no derive macro.
#[derive(Debug)]
pub enum AuthError {
    InvalidAppId,
    InvalidToken,
    InvalidPrivateKey(String),
    MissingInstallation(String),
    TokenMintFailed(String),
    Jwt(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidAppId => write!(f, "app id must be numeric in [1, 999999999]"),
            AuthError::InvalidToken => write!(f, "invalid personal access token"),
            AuthError::InvalidPrivateKey(msg) => write!(f, "invalid private key: {msg}"),
            AuthError::MissingInstallation(org) => {
                write!(f, "no known installation id for org {org}")
            }
            AuthError::TokenMintFailed(msg) => write!(f, "installation token mint failed: {msg}"),
            AuthError::Jwt(e) => write!(f, "jwt error: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AuthError::Jwt(e)
    }
}

impl From<AuthError> for ForgeError {
    fn from(e: AuthError) -> Self {
        ForgeError::Config(e.to_string())
    }
}
