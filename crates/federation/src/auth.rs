//! Inbound request authentication.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use tracing::{debug, warn};
use url::Url;

use crate::clock::Clock;
use crate::error::{FederationError, FederationResult};
use crate::signature::{SignatureComponents, check_date, verify_digest, verify_request};
use crate::transport::Transport;
use crate::vocab::{Object, Reference};

/// The parts of an inbound request an [`Authenticator`] may inspect.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    pub method: &'a Method,
    pub path_and_query: &'a str,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

/// Outcome of successful authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authenticated {
    /// The actor the request was made on behalf of. `None` when the
    /// authenticator vouches for the request without naming anyone.
    pub actor: Option<Url>,
}

/// Decides whether an inbound request may proceed.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Unauthorized` when the request cannot be authenticated.
    async fn authenticate(&self, request: InboundRequest<'_>) -> FederationResult<Authenticated>;
}

/// Accepts every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authenticator for AllowAll {
    async fn authenticate(&self, _request: InboundRequest<'_>) -> FederationResult<Authenticated> {
        Ok(Authenticated::default())
    }
}

/// Verifies HTTP signatures, fetching the signer's key through the transport.
#[derive(Clone)]
pub struct HttpSignatureAuthenticator {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl HttpSignatureAuthenticator {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self { transport, clock }
    }

    async fn public_key(&self, components: &SignatureComponents) -> FederationResult<(Url, String)> {
        let owner = components.key_owner()?;
        let document = self.transport.dereference(&owner).await.map_err(|e| {
            warn!(key_id = %components.key_id, error = %e, "could not fetch signing key");
            FederationError::Unauthorized(format!("key {} unavailable", components.key_id))
        })?;

        // Either the actor embedding its key, or the key document itself.
        if let Some(pem) = document.get_str("publicKeyPem") {
            let actor = document.iri("owner").unwrap_or(owner);
            return Ok((actor, pem.to_string()));
        }
        let keys = document.references("publicKey");
        let embedded: Vec<&Object> = keys.iter().filter_map(Reference::as_object).collect();
        let pem = embedded
            .iter()
            .find(|key| key.get_str("id") == Some(components.key_id.as_str()))
            .or_else(|| embedded.first())
            .and_then(|key| key.get_str("publicKeyPem"))
            .map(String::from)
            .ok_or_else(|| {
                FederationError::Unauthorized(format!("{owner} publishes no public key"))
            })?;
        Ok((document.id().unwrap_or(owner), pem))
    }
}

#[async_trait]
impl Authenticator for HttpSignatureAuthenticator {
    async fn authenticate(&self, request: InboundRequest<'_>) -> FederationResult<Authenticated> {
        let header = request
            .headers
            .get("signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| FederationError::Unauthorized("missing signature".to_string()))?;
        let components = SignatureComponents::parse(header)?;

        check_date(request.headers, self.clock.now())?;
        if !request.body.is_empty() {
            let digest = request
                .headers
                .get("digest")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| FederationError::Unauthorized("missing digest".to_string()))?;
            verify_digest(request.body, digest)?;
        }

        let (actor, pem) = self.public_key(&components).await?;
        verify_request(
            &pem,
            &components,
            request.method.as_str(),
            request.path_and_query,
            request.headers,
        )?;

        debug!(%actor, "request signature verified");
        Ok(Authenticated { actor: Some(actor) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::signature::{HttpSigner, tests::generate_keypair};
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct KeyServer {
        actor: Object,
    }

    #[async_trait]
    impl Transport for KeyServer {
        async fn dereference(&self, iri: &Url) -> FederationResult<Object> {
            if self.actor.id().as_ref() == Some(iri) {
                Ok(self.actor.clone())
            } else {
                Err(FederationError::not_found(iri))
            }
        }

        async fn deliver(&self, _payload: Bytes, _inbox: &Url) -> FederationResult<()> {
            Ok(())
        }
    }

    fn setup() -> (HttpSigner, HttpSignatureAuthenticator, FixedClock) {
        let (private_pem, public_pem) = generate_keypair();
        let actor = Object::from_value(json!({
            "id": "https://remote.example/users/bob",
            "type": "Person",
            "inbox": "https://remote.example/users/bob/inbox",
            "publicKey": {
                "id": "https://remote.example/users/bob#main-key",
                "owner": "https://remote.example/users/bob",
                "publicKeyPem": public_pem,
            }
        }))
        .unwrap();
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let signer = HttpSigner::new(&private_pem, "https://remote.example/users/bob#main-key").unwrap();
        let auth = HttpSignatureAuthenticator::new(Arc::new(KeyServer { actor }), Arc::new(clock));
        (signer, auth, clock)
    }

    #[tokio::test]
    async fn test_valid_signature_names_actor() {
        let (signer, auth, clock) = setup();
        let url = Url::parse("https://hearth.example/users/alice/inbox").unwrap();
        let body = br#"{"type":"Follow"}"#;
        let headers = signer.sign_request("POST", &url, Some(body), clock.now()).unwrap();

        let result = auth
            .authenticate(InboundRequest {
                method: &Method::POST,
                path_and_query: "/users/alice/inbox",
                headers: &headers,
                body,
            })
            .await
            .unwrap();
        assert_eq!(
            result.actor.unwrap().as_str(),
            "https://remote.example/users/bob"
        );
    }

    #[tokio::test]
    async fn test_altered_body_is_rejected() {
        let (signer, auth, clock) = setup();
        let url = Url::parse("https://hearth.example/users/alice/inbox").unwrap();
        let headers = signer
            .sign_request("POST", &url, Some(b"{}"), clock.now())
            .unwrap();

        let err = auth
            .authenticate(InboundRequest {
                method: &Method::POST,
                path_and_query: "/users/alice/inbox",
                headers: &headers,
                body: br#"{"type":"Delete"}"#,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_signature_is_unauthorized() {
        let (_, auth, _) = setup();
        let err = auth
            .authenticate(InboundRequest {
                method: &Method::POST,
                path_and_query: "/inbox",
                headers: &HeaderMap::new(),
                body: b"{}",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::Unauthorized(_)));
    }
}
