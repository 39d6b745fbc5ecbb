//! # jwks-retriever
//!
//! This crate fetches, caches and materializes the public keys published at a
//! JSON Web Key Set (JWKS) endpoint, and verifies JWTs against them.
//!
//! The pipeline has three stages, each behind a small trait or type:
//!
//! - a [`JwksUrlResolver`](jwk::JwksUrlResolver) finds the JWKS endpoint,
//!   either a fixed [`StaticUrl`](jwk::StaticUrl) or an OpenID Connect
//!   provider's discovery document ([`OidcDiscovery`](jwk::OidcDiscovery));
//! - a [`JwkRetriever`](jwk::JwkRetriever) fetches the key set:
//!   [`WebRetriever`](jwk::WebRetriever) over HTTP,
//!   [`CachingRetriever`](jwk::CachingRetriever) in front of another retriever,
//!   or [`StaticRetriever`](jwk::StaticRetriever) for provisioned keys;
//! - [`VerificationKeySet`](jwk::VerificationKeySet) turns RSA JWKs into keys
//!   usable by `jsonwebtoken`. Keys of other types are skipped, not rejected.
//!
//! [`JwksAuth`] ties the stages together.
//!
//! ## Example
//!
//! ```no_run
//! use jwks_retriever::jwk::{RetrieverConfig, VerifyOptions};
//! use jwks_retriever::JwksAuth;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Claims {
//!     sub: String,
//! }
//!
//! async fn check(token: &str) -> jwks_retriever::Result<String> {
//!     let auth = JwksAuth::from_oidc_provider(
//!         "https://accounts.google.com",
//!         VerifyOptions {
//!             allowed_algorithms: vec!["RS256".into()],
//!             audience: "my-client-id".into(),
//!             issuer: "https://accounts.google.com".into(),
//!             subject: "1234567890".into(),
//!         },
//!         &RetrieverConfig::default(),
//!     )?;
//!
//!     let claims: Claims = auth.verify(token).await?;
//!     Ok(claims.sub)
//! }
//! ```

mod client;
mod error;
/// Key set resolution, retrieval, caching, materialization and verification.
pub mod jwk;

pub use client::*;
pub use error::*;
