use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use num_bigint::BigUint;
use tracing::debug;

use super::error::{DecodeError, KeySetError, KeySetResult};
use super::key::{JsonWebKey, JsonWebKeySet};

/// An RSA public key materialized from a JWK.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationKey {
    kid: Option<String>,
    alg: Option<String>,
    modulus: BigUint,
    exponent: BigUint,
    modulus_bytes: Vec<u8>,
    exponent_bytes: Vec<u8>,
}

impl VerificationKey {
    /// Key identifier copied from the JWK.
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Algorithm hint copied from the JWK.
    pub fn alg(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    /// RSA modulus.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// RSA public exponent.
    pub fn exponent(&self) -> &BigUint {
        &self.exponent
    }

    /// Builds the key handed to `jsonwebtoken` for signature checks.
    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_rsa_raw_components(
            &self.modulus_bytes,
            &self.exponent_bytes,
        )
    }

    /// Whether this key may verify a token signed with `alg`.
    ///
    /// Keys without an `alg` hint accept every RSA algorithm.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        if !is_rsa_algorithm(alg) {
            return false;
        }
        match self.alg.as_deref() {
            None => true,
            Some(hint) => {
                hint.parse::<Algorithm>().is_ok_and(|hinted| hinted == alg)
            }
        }
    }

    fn from_rsa_jwk(jwk: &JsonWebKey) -> KeySetResult<Self> {
        let kid = jwk.kid.as_deref();
        let modulus_bytes = decode_component("n", jwk.n.as_deref(), kid)?;
        let exponent_bytes = decode_component("e", jwk.e.as_deref(), kid)?;

        Ok(VerificationKey {
            kid: jwk.kid.clone(),
            alg: jwk.alg.clone(),
            modulus: BigUint::from_bytes_be(&modulus_bytes),
            exponent: BigUint::from_bytes_be(&exponent_bytes),
            modulus_bytes,
            exponent_bytes,
        })
    }
}

/// Verification keys materialized from a [`JsonWebKeySet`], in document order.
///
/// Only RSA keys are materialized. Keys of any other `kty` are skipped
/// silently so that a provider publishing new key types does not break
/// verification with its RSA keys; such a set may therefore hold fewer
/// entries than the document it came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationKeySet {
    keys: Vec<VerificationKey>,
}

impl VerificationKeySet {
    /// Materializes every RSA key of `set`.
    ///
    /// A malformed `n` or `e` fails the whole set.
    pub fn materialize(set: &JsonWebKeySet) -> KeySetResult<Self> {
        let mut keys = Vec::with_capacity(set.keys.len());

        for jwk in &set.keys {
            if !jwk.is_rsa() {
                debug!(
                    kid = ?jwk.kid,
                    kty = ?jwk.kty,
                    "Skipping unsupported key type"
                );
                continue;
            }
            keys.push(VerificationKey::from_rsa_jwk(jwk)?);
        }

        Ok(VerificationKeySet { keys })
    }

    /// Materialized keys in document order.
    pub fn keys(&self) -> &[VerificationKey] {
        &self.keys
    }

    /// Number of materialized keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no usable key.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Selects the key for a token header.
    ///
    /// With a `kid` the first key carrying it is chosen, and only returned
    /// if it accepts `alg`. Without one the first key accepting `alg` wins.
    pub fn find(
        &self,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Option<&VerificationKey> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|key| key.kid() == Some(kid))
                .filter(|key| key.accepts(alg)),
            None => self.keys.iter().find(|key| key.accepts(alg)),
        }
    }

    /// Key-lookup callback for [`verify`](super::verify).
    pub fn decoding_key(
        &self,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Option<DecodingKey> {
        self.find(kid, alg).map(VerificationKey::decoding_key)
    }
}

impl TryFrom<&JsonWebKeySet> for VerificationKeySet {
    type Error = KeySetError;

    fn try_from(set: &JsonWebKeySet) -> Result<Self, Self::Error> {
        VerificationKeySet::materialize(set)
    }
}

fn is_rsa_algorithm(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

/// Decodes a base64url big-endian component, with or without `=` padding.
fn decode_component(
    field: &'static str,
    value: Option<&str>,
    kid: Option<&str>,
) -> Result<Vec<u8>, DecodeError> {
    let value = value.ok_or_else(|| DecodeError::MissingComponent {
        field,
        kid: kid.map(str::to_owned),
    })?;

    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|source| DecodeError::Base64 {
            field,
            kid: kid.map(str::to_owned),
            source,
        })?;

    if bytes.is_empty() {
        return Err(DecodeError::EmptyComponent {
            field,
            kid: kid.map(str::to_owned),
        });
    }

    Ok(bytes)
}
