use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::jwk::{
    retrieve_cancellable, verify, CachingRetriever, JwkRetriever,
    JwksUrlResolver, OidcDiscovery, RetrieverConfig, StaticUrl,
    VerificationKeySet, VerifyOptions, WebRetriever,
};

/// Default retriever of [`JwksAuth`]: a TTL cache in front of an HTTP fetch.
pub type CachingWebRetriever =
    CachingRetriever<WebRetriever<VerificationKeySet>>;

/// JwksAuth verifies JWTs against the keys published at a JWKS endpoint.
///
/// Keys are fetched lazily on the first verification and cached for the
/// configured TTL; see [`CachingRetriever`] for the refresh and stale-key
/// policy. Cloning is cheap and clones share one cache.
pub struct JwksAuth<R = CachingWebRetriever> {
    inner: Arc<Inner<R>>,
}

struct Inner<R> {
    resolver: Box<dyn JwksUrlResolver>,
    retriever: R,
    options: VerifyOptions,
}

impl<R> Clone for JwksAuth<R> {
    fn clone(&self) -> Self {
        JwksAuth {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl JwksAuth {
    /// Create a JwksAuth that locates its keys through `resolver`.
    pub fn new(
        resolver: impl JwksUrlResolver + 'static,
        options: VerifyOptions,
        config: &RetrieverConfig,
    ) -> crate::Result<Self> {
        let retriever = CachingRetriever::new(config)?;
        Ok(Self::with_retriever(resolver, retriever, options))
    }

    /// Create a JwksAuth for a known JWKS URL.
    pub fn from_jwks_url(
        jwks_url: impl Into<String>,
        options: VerifyOptions,
        config: &RetrieverConfig,
    ) -> crate::Result<Self> {
        Self::new(StaticUrl::new(jwks_url), options, config)
    }

    /// Create a JwksAuth that discovers the JWKS URL of an OpenID Connect
    /// provider.
    ///
    /// Discovery runs on every key fetch, so a provider moving its JWKS is
    /// picked up on the next refresh.
    pub fn from_oidc_provider(
        provider_url: impl Into<String>,
        options: VerifyOptions,
        config: &RetrieverConfig,
    ) -> crate::Result<Self> {
        let client = config.http_client()?;
        let resolver = OidcDiscovery::with_client(provider_url, client.clone());
        let retriever =
            CachingRetriever::wrap(WebRetriever::with_client(client), config);
        Ok(Self::with_retriever(resolver, retriever, options))
    }
}

impl<R> JwksAuth<R>
where
    R: JwkRetriever<Output = VerificationKeySet>,
{
    /// Create a JwksAuth backed by an arbitrary retriever, e.g. a
    /// [`StaticRetriever`](crate::jwk::StaticRetriever) with provisioned keys.
    pub fn with_retriever(
        resolver: impl JwksUrlResolver + 'static,
        retriever: R,
        options: VerifyOptions,
    ) -> Self {
        JwksAuth {
            inner: Arc::new(Inner {
                resolver: Box::new(resolver),
                retriever,
                options,
            }),
        }
    }

    /// The expectations tokens are verified against.
    pub fn options(&self) -> &VerifyOptions {
        &self.inner.options
    }

    /// The retriever supplying verification keys.
    pub fn retriever(&self) -> &R {
        &self.inner.retriever
    }

    /// Returns the current verification keys, fetching them if needed.
    pub async fn keys(&self) -> crate::Result<Arc<VerificationKeySet>> {
        Ok(self.inner.retriever.retrieve(self.inner.resolver.as_ref()).await?)
    }

    /// Like [`keys`](Self::keys), but gives up once `cancel` fires.
    pub async fn keys_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> crate::Result<Arc<VerificationKeySet>> {
        let resolver = self.inner.resolver.as_ref();
        Ok(retrieve_cancellable(&self.inner.retriever, resolver, cancel).await?)
    }

    /// Verifies a JWT and deserializes the payload into type `T`.
    pub async fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
    ) -> crate::Result<T> {
        let keys = self.keys().await?;
        self.verify_with_keys(token, &keys)
    }

    /// Verifies a JWT against an already retrieved key set.
    pub fn verify_with_keys<T: DeserializeOwned>(
        &self,
        token: &str,
        keys: &VerificationKeySet,
    ) -> crate::Result<T> {
        let data = verify::<T, _>(
            token,
            |kid, alg| keys.decoding_key(kid, alg),
            &self.inner.options,
        )
        .inspect_err(|err| debug!(error = %err, "Token verification failed"))?;

        Ok(data.claims)
    }
}
