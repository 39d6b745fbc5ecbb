use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::config::RetrieverConfig;
use super::error::{KeySetError, KeySetResult};
use super::http::get_json;
use super::key::JsonWebKeySet;
use super::material::VerificationKeySet;
use super::resolver::JwksUrlResolver;

/// Conversion from a decoded key set into a retriever's output.
pub trait FromKeySet: Sized + Send + Sync + 'static {
    /// Converts a freshly decoded key set.
    fn from_key_set(set: JsonWebKeySet) -> KeySetResult<Self>;
}

impl FromKeySet for JsonWebKeySet {
    fn from_key_set(set: JsonWebKeySet) -> KeySetResult<Self> {
        Ok(set)
    }
}

impl FromKeySet for VerificationKeySet {
    fn from_key_set(set: JsonWebKeySet) -> KeySetResult<Self> {
        VerificationKeySet::materialize(&set)
    }
}

/// Obtains a key set from wherever a resolver points.
#[async_trait]
pub trait JwkRetriever: Send + Sync {
    /// What a retrieval yields: a raw [`JsonWebKeySet`] or materialized keys.
    type Output: Send + Sync + 'static;

    /// Retrieves the key set, performing at most one fetch.
    async fn retrieve(
        &self,
        resolver: &dyn JwksUrlResolver,
    ) -> KeySetResult<Arc<Self::Output>>;
}

/// Fetches the key set over HTTP on every call.
pub struct WebRetriever<T = VerificationKeySet> {
    client: reqwest::Client,
    _output: PhantomData<fn() -> T>,
}

impl<T> WebRetriever<T> {
    /// Creates a retriever with a client built from `config`.
    pub fn new(config: &RetrieverConfig) -> KeySetResult<WebRetriever<T>> {
        Ok(Self::with_client(config.http_client()?))
    }

    /// Creates a retriever that issues its requests through `client`.
    pub fn with_client(client: reqwest::Client) -> WebRetriever<T> {
        WebRetriever {
            client,
            _output: PhantomData,
        }
    }
}

impl<T> Clone for WebRetriever<T> {
    fn clone(&self) -> Self {
        Self::with_client(self.client.clone())
    }
}

impl<T> std::fmt::Debug for WebRetriever<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRetriever").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: FromKeySet> JwkRetriever for WebRetriever<T> {
    type Output = T;

    async fn retrieve(
        &self,
        resolver: &dyn JwksUrlResolver,
    ) -> KeySetResult<Arc<T>> {
        let url = resolver.resolve().await?;
        let set: JsonWebKeySet = get_json(&self.client, &url).await?;
        debug!(url = %url, keys = set.keys.len(), "Fetched JWKS");

        T::from_key_set(set).map(Arc::new)
    }
}

/// Serves a key set supplied up front, ignoring the resolver.
///
/// Useful in tests and where keys are provisioned out-of-band.
#[derive(Debug)]
pub struct StaticRetriever<T = VerificationKeySet> {
    set: Arc<T>,
}

impl<T> StaticRetriever<T> {
    /// Wraps `set`.
    pub fn new(set: T) -> StaticRetriever<T> {
        Self::from_arc(Arc::new(set))
    }

    /// Wraps an already shared `set`.
    pub fn from_arc(set: Arc<T>) -> StaticRetriever<T> {
        StaticRetriever { set }
    }
}

impl<T> Clone for StaticRetriever<T> {
    fn clone(&self) -> Self {
        StaticRetriever {
            set: Arc::clone(&self.set),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> JwkRetriever for StaticRetriever<T> {
    type Output = T;

    async fn retrieve(
        &self,
        _resolver: &dyn JwksUrlResolver,
    ) -> KeySetResult<Arc<T>> {
        Ok(Arc::clone(&self.set))
    }
}

/// Runs a retrieval that gives up with [`KeySetError::Cancelled`] once
/// `cancel` fires.
///
/// The in-flight request is dropped on cancellation; a caching retriever
/// keeps whatever it held before the call.
pub async fn retrieve_cancellable<R>(
    retriever: &R,
    resolver: &dyn JwksUrlResolver,
    cancel: &CancellationToken,
) -> KeySetResult<Arc<R::Output>>
where
    R: JwkRetriever + ?Sized,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("Key set retrieval cancelled");
            Err(KeySetError::Cancelled)
        }
        result = retriever.retrieve(resolver) => result,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::jwk::{DecodeError, StaticUrl};
    use actix_rt::test;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;
    use std::time::Duration;

    /// A resolver that always fails, for retrievers that must not call it.
    pub(crate) struct FailingResolver;

    #[async_trait]
    impl JwksUrlResolver for FailingResolver {
        async fn resolve(&self) -> KeySetResult<String> {
            Err(KeySetError::Resolution {
                provider: "failing".into(),
            })
        }
    }

    fn raw_retriever() -> WebRetriever<JsonWebKeySet> {
        WebRetriever::new(&RetrieverConfig::default()).unwrap()
    }

    fn verification_retriever() -> WebRetriever<VerificationKeySet> {
        WebRetriever::new(&RetrieverConfig::default()).unwrap()
    }

    pub(crate) fn jwks_body() -> serde_json::Value {
        json!({
            "keys": [
                {
                    "kty": "RSA",
                    "alg": "RS256",
                    "use": "sig",
                    "kid": "1234",
                    "n": "AQAB",
                    "e": "AQAB"
                },
                {"kty": "EC", "kid": "ec", "crv": "P-256", "x": "AA", "y": "AA"}
            ]
        })
    }

    #[test]
    async fn web_retriever_returns_raw_key_set() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).json_body(jwks_body());
        });

        let retriever = raw_retriever();
        let set = retriever
            .retrieve(&StaticUrl::new(server.url("/keys")))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(set.keys.len(), 2);
        assert_eq!(set.keys[1].kty.as_deref(), Some("EC"));
    }

    #[test]
    async fn web_retriever_materializes_keys() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).json_body(jwks_body());
        });

        let retriever = verification_retriever();
        let keys = retriever
            .retrieve(&StaticUrl::new(server.url("/keys")))
            .await
            .unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys.keys()[0].kid(), Some("1234"));
    }

    #[test]
    async fn web_retriever_propagates_resolver_error() {
        let retriever = raw_retriever();
        let err = retriever.retrieve(&FailingResolver).await.unwrap_err();
        assert!(matches!(err, KeySetError::Resolution { .. }));
    }

    #[test]
    async fn web_retriever_propagates_decode_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/garbage");
            then.status(200).body("{\"keys\": 5}");
        });
        server.mock(|when, then| {
            when.method(GET).path("/bad-modulus");
            then.status(200).json_body(json!({
                "keys": [{"kty": "RSA", "n": "!!", "e": "AQAB"}]
            }));
        });

        let retriever = verification_retriever();

        let err = retriever
            .retrieve(&StaticUrl::new(server.url("/garbage")))
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Decode(DecodeError::Json(_))));

        let err = retriever
            .retrieve(&StaticUrl::new(server.url("/bad-modulus")))
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Decode(DecodeError::Base64 { .. })));
    }

    #[test]
    async fn web_retriever_reports_status_as_transport_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(500);
        });

        let retriever = raw_retriever();
        let url = server.url("/keys");
        let err = retriever
            .retrieve(&StaticUrl::new(url.clone()))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                KeySetError::Transport { url: ref failed, .. } if *failed == url
            ),
            "Expected Transport error, got {err:?}"
        );
    }

    #[test]
    async fn web_retriever_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(jwks_body());
        });

        let config =
            RetrieverConfig::new().with_timeout(Duration::from_millis(100));
        let retriever = WebRetriever::<JsonWebKeySet>::new(&config).unwrap();
        let err = retriever
            .retrieve(&StaticUrl::new(server.url("/slow")))
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                KeySetError::Transport { ref source, .. } if source.is_timeout()
            ),
            "Expected timeout, got {err:?}"
        );
    }

    #[test]
    async fn static_retriever_ignores_resolver() {
        let set = JsonWebKeySet::default();
        let retriever = StaticRetriever::new(set.clone());

        let first = retriever.retrieve(&FailingResolver).await.unwrap();
        let second = retriever.retrieve(&FailingResolver).await.unwrap();
        assert_eq!(*first, set);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    async fn cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let retriever = StaticRetriever::new(JsonWebKeySet::default());
        let err = retrieve_cancellable(&retriever, &FailingResolver, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Cancelled));
    }

    #[test]
    async fn cancellation_interrupts_slow_fetch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_secs(5))
                .json_body(jwks_body());
        });

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        actix_rt::spawn(async move {
            actix_rt::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let retriever = raw_retriever();
        let resolver = StaticUrl::new(server.url("/slow"));
        let err = retrieve_cancellable(&retriever, &resolver, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Cancelled));
    }
}
