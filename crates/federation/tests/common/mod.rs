//! Shared fixtures for the HTTP-level tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use hearth_federation::{
    AllowAll, Authenticated, Authenticator, Database, FederationError, FederationResult,
    FederationState, Federator, FixedClock, InboundRequest, MemoryStore, Object, Settings,
    StoreDatabase, Transport, router,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

pub const BASE: &str = "https://hearth.example/";
pub const ALICE: &str = "https://hearth.example/users/alice";
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// Remote servers as seen through the transport.
#[derive(Default)]
pub struct FakeRemote {
    values: Mutex<Vec<Object>>,
    delivered: Mutex<Vec<(Url, Value)>>,
}

impl FakeRemote {
    pub fn serve(&self, value: Value) {
        self.values
            .lock()
            .unwrap()
            .push(Object::from_value(value).unwrap());
    }

    /// A remote actor with an inbox.
    pub fn serve_actor(&self, id: &str) {
        self.serve(json!({ "id": id, "type": "Person", "inbox": format!("{id}/inbox") }));
    }

    pub fn delivered_to(&self) -> Vec<Url> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(inbox, _)| inbox.clone())
            .collect()
    }

    pub fn delivered(&self) -> Vec<Value> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeRemote {
    async fn dereference(&self, iri: &Url) -> FederationResult<Object> {
        self.values
            .lock()
            .unwrap()
            .iter()
            .find(|value| value.id().as_ref() == Some(iri))
            .cloned()
            .ok_or_else(|| FederationError::NotFound(iri.to_string()))
    }

    async fn deliver(&self, payload: Bytes, inbox: &Url) -> FederationResult<()> {
        let body = serde_json::from_slice(&payload).unwrap();
        self.delivered.lock().unwrap().push((inbox.clone(), body));
        Ok(())
    }
}

/// Authenticates every request as one fixed actor.
pub struct SignedBy(pub Url);

#[async_trait]
impl Authenticator for SignedBy {
    async fn authenticate(&self, _request: InboundRequest<'_>) -> FederationResult<Authenticated> {
        Ok(Authenticated {
            actor: Some(self.0.clone()),
        })
    }
}

pub struct TestServer {
    pub app: Router,
    pub federator: Federator,
    pub db: Arc<StoreDatabase<MemoryStore>>,
    pub remote: Arc<FakeRemote>,
}

impl TestServer {
    pub async fn new(settings: Settings) -> Self {
        Self::with_authenticator(settings, Arc::new(AllowAll)).await
    }

    pub async fn with_authenticator(
        settings: Settings,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let base = Url::parse(BASE).unwrap();
        let db = Arc::new(StoreDatabase::new(MemoryStore::new(), base.clone()));
        let remote = Arc::new(FakeRemote::default());
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let federator = Federator::new(db.clone(), remote.clone())
            .with_settings(settings)
            .with_clock(Arc::new(clock))
            .with_authenticator(authenticator);
        let app = router(FederationState::new(federator.clone(), base));

        let server = Self {
            app,
            federator,
            db,
            remote,
        };
        server.store(json!({
            "id": ALICE,
            "type": "Person",
            "url": "https://hearth.example/@alice",
            "inbox": format!("{ALICE}/inbox"),
            "outbox": format!("{ALICE}/outbox"),
            "followers": format!("{ALICE}/followers"),
            "following": format!("{ALICE}/following"),
            "liked": format!("{ALICE}/liked"),
        }))
        .await;
        server
    }

    pub async fn store(&self, value: Value) {
        self.db
            .create(&Object::from_value(value).unwrap())
            .await
            .unwrap();
    }

    pub async fn stored(&self, iri: &str) -> Object {
        self.db.get(&Url::parse(iri).unwrap()).await.unwrap()
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response<Body> {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, ACTIVITY_JSON)
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str) -> Response<Body> {
        let request = Request::get(path)
            .header(header::ACCEPT, ACTIVITY_JSON)
            .body(Body::empty())
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get_html(&self, path: &str) -> Response<Body> {
        let request = Request::get(path)
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
