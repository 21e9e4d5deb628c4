use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, info, warn};
use url::Url;

use super::Transport;
use crate::cache::{Scheduler, TtlCache};
use crate::clock::Clock;
use crate::error::{FederationError, FederationResult};
use crate::signature::HttpSigner;
use crate::vocab::{ACTIVITY_JSON, LD_JSON_PROFILE, Object};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Transport`] over reqwest, signing requests when a key is configured.
///
/// Dereferenced values are memoised for the cache's time to live.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    signer: Option<Arc<HttpSigner>>,
    clock: Arc<dyn Clock>,
    cache: TtlCache<Url, Object>,
}

impl HttpTransport {
    /// Build the client. `cache_ttl` bounds how long dereferenced values are reused.
    pub fn new(
        user_agent: &str,
        signer: Option<HttpSigner>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
        scheduler: &Scheduler,
    ) -> FederationResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FederationError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            client,
            signer: signer.map(Arc::new),
            clock,
            cache: TtlCache::new("dereference", cache_ttl, scheduler),
        })
    }

    /// The dereference cache.
    #[must_use]
    pub const fn cache(&self) -> &TtlCache<Url, Object> {
        &self.cache
    }

    fn signed(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
    ) -> FederationResult<reqwest::RequestBuilder> {
        match &self.signer {
            Some(signer) => {
                let headers = signer.sign_request(method, url, body, self.clock.now())?;
                Ok(request.headers(headers))
            }
            None => Ok(request),
        }
    }
}

fn transport_error(url: &Url, err: &reqwest::Error) -> FederationError {
    FederationError::Transport(format!("{url}: {err}"))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dereference(&self, iri: &Url) -> FederationResult<Object> {
        if let Some(cached) = self.cache.get(iri) {
            debug!(%iri, "dereference cache hit");
            return Ok(cached);
        }

        let request = self
            .client
            .get(iri.clone())
            .header(header::ACCEPT, format!("{ACTIVITY_JSON}, {LD_JSON_PROFILE}"));
        let response = self
            .signed(request, "GET", iri, None)?
            .send()
            .await
            .map_err(|e| transport_error(iri, &e))?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                let value: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| transport_error(iri, &e))?;
                let object = Object::from_value(value)?;
                self.cache.insert(iri.clone(), object.clone());
                Ok(object)
            }
            StatusCode::GONE => Err(FederationError::Gone(iri.to_string())),
            StatusCode::NOT_FOUND => Err(FederationError::not_found(iri)),
            _ => Err(FederationError::Transport(format!("{iri}: GET returned {status}"))),
        }
    }

    async fn deliver(&self, payload: Bytes, inbox: &Url) -> FederationResult<()> {
        let request = self
            .client
            .post(inbox.clone())
            .header(header::CONTENT_TYPE, ACTIVITY_JSON)
            .header(header::ACCEPT, ACTIVITY_JSON);
        let response = self
            .signed(request, "POST", inbox, Some(&payload))?
            .body(payload)
            .send()
            .await
            .map_err(|e| transport_error(inbox, &e))?;

        let status = response.status();
        if status.is_success() {
            info!(%inbox, %status, "activity delivered");
            Ok(())
        } else if status == StatusCode::GONE {
            warn!(%inbox, "recipient gone, not retrying");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FederationError::Transport(format!(
                "{inbox}: POST returned {status}: {body}"
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use serde_json::json;

    #[tokio::test]
    async fn test_dereference_served_from_cache() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        let transport = HttpTransport::new(
            "hearth-test",
            None,
            Arc::new(SystemClock),
            Duration::from_secs(60),
            &scheduler,
        )
        .unwrap();

        let iri = Url::parse("https://unreachable.invalid/users/a").unwrap();
        let actor = Object::from_value(json!({ "id": iri, "type": "Person" })).unwrap();
        transport.cache().insert(iri.clone(), actor.clone());

        assert_eq!(transport.dereference(&iri).await.unwrap(), actor);
        assert_eq!(transport.cache().stats().hits, 1);
    }
}
