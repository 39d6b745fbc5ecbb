use std::sync::Arc;

use thiserror::Error;

pub(super) type KeySetResult<T> = std::result::Result<T, KeySetError>;

pub(super) type VerificationResult<T> =
    std::result::Result<T, VerificationError>;

/// Errors that can occur while locating, fetching or materializing a key set.
///
/// Cloning is cheap, so one failed refresh can be reported to every caller
/// that waited on it.
#[derive(Debug, Clone, Error)]
pub enum KeySetError {
    /// The endpoint could not be reached, timed out, or answered with a
    /// non-success status.
    #[error("failed to fetch '{url}': {source}")]
    Transport {
        /// URL of the failed request.
        url: String,
        /// Underlying HTTP client error.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// The response body or the key material inside it was malformed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The OIDC discovery document has no usable `jwks_uri`.
    #[error("jwks_uri not found in discovery document of '{provider}'")]
    Resolution {
        /// Provider base URL the discovery document was fetched from.
        provider: String,
    },

    /// The caller cancelled the retrieval before it completed.
    #[error("key set retrieval was cancelled")]
    Cancelled,
}

/// Malformed JSON documents or key components.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The body is not valid JSON for the expected shape.
    #[error("invalid JSON document: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    /// A base64url key component could not be decoded.
    #[error("invalid base64url in '{field}' of key {kid:?}: {source}")]
    Base64 {
        /// JWK member name (`n` or `e`).
        field: &'static str,
        /// Key identifier, if the key has one.
        kid: Option<String>,
        /// Underlying base64 error.
        #[source]
        source: base64::DecodeError,
    },

    /// A required key component is absent.
    #[error("missing '{field}' in RSA key {kid:?}")]
    MissingComponent {
        /// JWK member name (`n` or `e`).
        field: &'static str,
        /// Key identifier, if the key has one.
        kid: Option<String>,
    },

    /// A required key component decoded to zero bytes.
    #[error("empty '{field}' in RSA key {kid:?}")]
    EmptyComponent {
        /// JWK member name (`n` or `e`).
        field: &'static str,
        /// Key identifier, if the key has one.
        kid: Option<String>,
    },
}

impl KeySetError {
    pub(super) fn transport(url: &str, source: reqwest::Error) -> Self {
        KeySetError::Transport {
            url: url.to_owned(),
            source: Arc::new(source),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(Arc::new(err))
    }
}

impl From<serde_json::Error> for KeySetError {
    fn from(err: serde_json::Error) -> Self {
        KeySetError::Decode(err.into())
    }
}

/// Errors that can occur during token verification.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The token format is invalid or could not be parsed.
    #[error("Invalid token")]
    InvalidToken,

    /// The token algorithm is not allowed, or an allowed algorithm name is
    /// unknown.
    #[error("Invalid key algorithm")]
    InvalidKeyAlgorithm,

    /// No key in the current key set matches the token header.
    #[error("No matching public key found for 'kid'")]
    NoMatchingKey,

    /// The token signature could not be verified.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token has expired.
    #[error("Token has expired")]
    Expired,

    /// The token's `nbf` lies in the future.
    #[error("Token is not valid yet")]
    NotYetValid,

    /// Audience, issuer, subject or a required claim did not validate.
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::ImmatureSignature => VerificationError::NotYetValid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                VerificationError::InvalidKeyAlgorithm
            }
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => {
                VerificationError::InvalidClaims(err.to_string())
            }
            _ => VerificationError::InvalidToken,
        }
    }
}
