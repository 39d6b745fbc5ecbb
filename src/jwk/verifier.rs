use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation};
use serde::de::DeserializeOwned;

use super::error::{VerificationError, VerificationResult};

/// Expectations a token must meet besides carrying a valid signature.
///
/// An empty `audience`, `issuer` or `subject` skips that check, and the
/// claim becomes optional. Expiry and not-before are checked without leeway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Accepted `alg` header values, e.g. `["RS256"]`.
    pub allowed_algorithms: Vec<String>,
    /// Required `aud` claim, or empty to accept any.
    pub audience: String,
    /// Required `iss` claim, or empty to accept any.
    pub issuer: String,
    /// Required `sub` claim, or empty to accept any.
    pub subject: String,
}

impl VerifyOptions {
    fn validation(&self) -> VerificationResult<Validation> {
        let algorithms = self
            .allowed_algorithms
            .iter()
            .map(|name| Algorithm::from_str(name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VerificationError::InvalidKeyAlgorithm)?;

        let Some(&first) = algorithms.first() else {
            return Err(VerificationError::InvalidKeyAlgorithm);
        };

        let mut validation = Validation::new(first);
        validation.algorithms = algorithms;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        let mut required = vec!["exp"];
        if self.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[&self.audience]);
            required.push("aud");
        }
        if !self.issuer.is_empty() {
            validation.set_issuer(&[&self.issuer]);
            required.push("iss");
        }
        if !self.subject.is_empty() {
            validation.sub = Some(self.subject.clone());
            required.push("sub");
        }
        validation.set_required_spec_claims(&required);

        Ok(validation)
    }
}

/// Verifies a compact JWT and deserializes its claims into `C`.
///
/// `key_lookup` receives the header's `kid` and `alg` and returns the key
/// to check the signature with. Expiration is always required.
pub fn verify<C, F>(
    token: &str,
    key_lookup: F,
    options: &VerifyOptions,
) -> VerificationResult<TokenData<C>>
where
    C: DeserializeOwned,
    F: FnOnce(Option<&str>, Algorithm) -> Option<DecodingKey>,
{
    let validation = options.validation()?;

    let header = jsonwebtoken::decode_header(token)
        .map_err(|_| VerificationError::InvalidToken)?;

    if !validation.algorithms.contains(&header.alg) {
        return Err(VerificationError::InvalidKeyAlgorithm);
    }

    let decoding_key = key_lookup(header.kid.as_deref(), header.alg)
        .ok_or(VerificationError::NoMatchingKey)?;

    Ok(jsonwebtoken::decode::<C>(token, &decoding_key, &validation)?)
}
