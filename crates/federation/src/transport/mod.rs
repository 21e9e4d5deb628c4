//! Outbound HTTP collaborator.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::FederationResult;
use crate::vocab::Object;

/// Fetches remote values and posts payloads to remote inboxes.
///
/// Retry policy, if any, belongs to implementations. The engine calls each
/// method once per recipient and treats an error as final.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a remote value.
    async fn dereference(&self, iri: &Url) -> FederationResult<Object>;

    /// POST a serialized activity to one inbox.
    async fn deliver(&self, payload: Bytes, inbox: &Url) -> FederationResult<()>;
}
