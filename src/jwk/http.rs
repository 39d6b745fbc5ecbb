use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{KeySetError, KeySetResult};

/// Issues `GET url` and decodes the body as JSON.
///
/// Connection failures, timeouts and non-2xx statuses are transport errors;
/// a body that does not decode into `T` is a decode error.
pub(super) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> KeySetResult<T> {
    debug!(url = %url, "Fetching JSON document");

    let transport = |source| KeySetError::transport(url, source);

    let body = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(transport)?
        .bytes()
        .await
        .map_err(transport)?;

    Ok(serde_json::from_slice(&body)?)
}
