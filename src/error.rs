/// A crate-wide result type alias using the custom [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for key retrieval and token verification failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Errors that occur while resolving, fetching or materializing the key
    /// set.
    #[error(transparent)]
    KeySetError(#[from] crate::jwk::KeySetError),

    /// Errors that occur during JWT verification or claim validation.
    #[error(transparent)]
    VerificationError(#[from] crate::jwk::VerificationError),
}

impl Error {
    /// Whether the failure came from the key source rather than the token.
    ///
    /// Such failures warrant alerting; token failures warrant rejecting the
    /// request.
    pub fn is_key_source_failure(&self) -> bool {
        matches!(self, Error::KeySetError(_))
    }
}
