use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::config::RetrieverConfig;
use super::error::{KeySetError, KeySetResult};
use super::http::get_json;

/// Determines the URL of a JWKS endpoint.
#[async_trait]
pub trait JwksUrlResolver: Send + Sync {
    /// Returns the JWKS endpoint URL.
    async fn resolve(&self) -> KeySetResult<String>;
}

/// A JWKS URL known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticUrl(String);

impl StaticUrl {
    /// Wraps `url`.
    pub fn new(url: impl Into<String>) -> StaticUrl {
        StaticUrl(url.into())
    }
}

impl From<String> for StaticUrl {
    fn from(url: String) -> Self {
        StaticUrl(url)
    }
}

impl From<&str> for StaticUrl {
    fn from(url: &str) -> Self {
        StaticUrl(url.to_owned())
    }
}

#[async_trait]
impl JwksUrlResolver for StaticUrl {
    async fn resolve(&self) -> KeySetResult<String> {
        Ok(self.0.clone())
    }
}

/// Looks up the JWKS URL in an OpenID Connect provider's discovery document.
#[derive(Debug, Clone)]
pub struct OidcDiscovery {
    provider_url: String,
    client: reqwest::Client,
}

impl OidcDiscovery {
    const WELL_KNOWN_PATH: &'static str = "/.well-known/openid-configuration";

    /// Creates a resolver for `provider_url` with a default-configured client.
    pub fn new(provider_url: impl Into<String>) -> KeySetResult<OidcDiscovery> {
        let client = RetrieverConfig::default().http_client()?;
        Ok(Self::with_client(provider_url, client))
    }

    /// Creates a resolver that issues its requests through `client`.
    pub fn with_client(
        provider_url: impl Into<String>,
        client: reqwest::Client,
    ) -> OidcDiscovery {
        OidcDiscovery {
            provider_url: provider_url.into(),
            client,
        }
    }

    /// Base URL of the provider.
    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    /// URL of the provider's discovery document.
    pub fn discovery_url(&self) -> String {
        format!(
            "{}{}",
            self.provider_url.trim_end_matches('/'),
            Self::WELL_KNOWN_PATH
        )
    }
}

#[async_trait]
impl JwksUrlResolver for OidcDiscovery {
    async fn resolve(&self) -> KeySetResult<String> {
        let document: Map<String, Value> =
            get_json(&self.client, &self.discovery_url()).await?;

        let jwks_uri = document
            .get("jwks_uri")
            .and_then(Value::as_str)
            .ok_or_else(|| KeySetError::Resolution {
                provider: self.provider_url.clone(),
            })?;

        debug!(
            provider = %self.provider_url,
            jwks_uri = %jwks_uri,
            "Resolved JWKS URL"
        );
        Ok(jwks_uri.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::DecodeError;
    use actix_rt::test;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;

    fn discovery_mock(server: &MockServer, body: &str) {
        let body = body.to_owned();
        server.mock(|when, then| {
            when.method(GET).path("/.well-known/openid-configuration");
            then.status(200)
                .header("Content-Type", "application/json")
                .body(body);
        });
    }

    #[test]
    async fn static_url_is_returned_verbatim() {
        let url = "https://example.com/keys?tenant=a b";
        assert_eq!(StaticUrl::from(url).resolve().await.unwrap(), url);
    }

    #[test]
    async fn discovery_returns_jwks_uri() {
        let server = MockServer::start();
        let jwks_uri = "https://login.example.com/common/discovery/v2.0/keys";
        discovery_mock(
            &server,
            &json!({
                "issuer": "https://login.example.com/{tenantid}/v2.0",
                "jwks_uri": jwks_uri,
                "id_token_signing_alg_values_supported": ["RS256"],
                "tenant_region_scope": null
            })
            .to_string(),
        );

        let resolver = OidcDiscovery::new(server.base_url()).unwrap();
        assert_eq!(resolver.resolve().await.unwrap(), jwks_uri);
    }

    #[test]
    async fn discovery_trims_trailing_slash() {
        let server = MockServer::start();
        discovery_mock(&server, r#"{"jwks_uri":"https://example.com/certs"}"#);

        let provider = format!("{}/", server.base_url());
        let resolver = OidcDiscovery::new(provider).unwrap();
        assert_eq!(
            resolver.discovery_url(),
            format!("{}/.well-known/openid-configuration", server.base_url())
        );
        let jwks_url = resolver.resolve().await.unwrap();
        assert_eq!(jwks_url, "https://example.com/certs");
    }

    #[test]
    async fn missing_jwks_uri_is_resolution_error() {
        let server = MockServer::start();
        discovery_mock(&server, r#"{"issuer":"https://example.com"}"#);

        let err = OidcDiscovery::new(server.base_url())
            .unwrap()
            .resolve()
            .await
            .unwrap_err();
        assert!(
            matches!(err, KeySetError::Resolution { .. }),
            "Expected Resolution error, got {err:?}"
        );
    }

    #[test]
    async fn non_string_jwks_uri_is_resolution_error() {
        let server = MockServer::start();
        discovery_mock(&server, r#"{"jwks_uri":42}"#);

        let err = OidcDiscovery::new(server.base_url())
            .unwrap()
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Resolution { .. }));
    }

    #[test]
    async fn invalid_json_is_decode_error() {
        let server = MockServer::start();
        discovery_mock(&server, "<html>not json</html>");

        let err = OidcDiscovery::new(server.base_url())
            .unwrap()
            .resolve()
            .await
            .unwrap_err();
        assert!(
            matches!(err, KeySetError::Decode(DecodeError::Json(_))),
            "Expected Decode error, got {err:?}"
        );
    }

    #[test]
    async fn non_object_document_is_decode_error() {
        let server = MockServer::start();
        discovery_mock(&server, r#"["jwks_uri"]"#);

        let err = OidcDiscovery::new(server.base_url())
            .unwrap()
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Decode(_)));
    }

    #[test]
    async fn http_error_status_is_transport_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/.well-known/openid-configuration");
            then.status(503);
        });

        let err = OidcDiscovery::new(server.base_url())
            .unwrap()
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Transport { .. }));
    }

    #[test]
    async fn unreachable_provider_is_transport_error() {
        let err = OidcDiscovery::new("http://127.0.0.1:1")
            .unwrap()
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Transport { .. }));
    }
}
