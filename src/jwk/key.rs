use serde::{Deserialize, Serialize};

/// A JSON Web Key Set document (`{"keys": [...]}`).
///
/// Keys keep the order of the document. Duplicate `kid`s are preserved;
/// lookups by `kid` return the first match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Set of keys within this key set.
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Returns the first key carrying the given `kid`.
    pub fn find(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
    }
}

/// One key record of a JSON Web Key Set.
///
/// Every member is optional on the wire; absent members never fail decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Family of cryptographic algorithms used with the key (e.g. `RSA`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,

    /// Intended usage; `sig` marks a signing key.
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Algorithm hint (e.g. `RS256`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key identifier, unique within a well-formed set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// RSA modulus, base64url big-endian.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent, base64url big-endian.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// SHA-1 thumbprint of the X.509 certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,

    /// X.509 certificate chain, leaf certificate first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x5c: Vec<String>,
}

impl JsonWebKey {
    /// Key type used for RSA keys.
    pub const KTY_RSA: &'static str = "RSA";

    /// Whether this record describes an RSA key.
    pub fn is_rsa(&self) -> bool {
        self.kty.as_deref() == Some(Self::KTY_RSA)
    }
}
