//! HTTP surface of the federation engine.

mod inbox;
mod negotiate;
mod object;
mod outbox;

use axum::{
    Router,
    http::Uri,
    routing::get,
};
use hearth_common::AppError;
use url::Url;

use crate::federator::Federator;

pub use inbox::{get_inbox_handler, post_inbox_handler};
pub use negotiate::{accepts_protocol, human_page, protocol_response, sends_protocol};
pub use object::{RepliesQuery, get_object_handler, replies_handler};
pub use outbox::{get_outbox_handler, post_outbox_handler};

/// State shared by the federation handlers.
#[derive(Clone)]
pub struct FederationState {
    pub federator: Federator,
    /// Public base URL; request paths resolve against it into resource IRIs.
    pub base: Url,
}

impl FederationState {
    #[must_use]
    pub const fn new(federator: Federator, base: Url) -> Self {
        Self { federator, base }
    }

    /// IRI of the resource a request path names.
    pub(crate) fn resource_iri(&self, uri: &Uri) -> Result<Url, AppError> {
        self.base
            .join(uri.path())
            .map_err(|e| AppError::BadRequest(format!("invalid path: {e}")))
    }

    /// IRI of the resource a request path names, with its last segment dropped.
    pub(crate) fn parent_iri(&self, uri: &Uri) -> Result<Url, AppError> {
        let path = uri.path().trim_end_matches('/');
        let parent = path.rsplit_once('/').map_or("/", |(parent, _)| parent);
        self.base
            .join(parent)
            .map_err(|e| AppError::BadRequest(format!("invalid path: {e}")))
    }
}

/// Federation routes: actor inboxes and outboxes, reply threads, and every
/// other stored value by its path.
pub fn router(state: FederationState) -> Router {
    Router::new()
        .route(
            "/users/{name}/inbox",
            get(get_inbox_handler).post(post_inbox_handler),
        )
        .route(
            "/users/{name}/outbox",
            get(get_outbox_handler).post(post_outbox_handler),
        )
        .route("/objects/{id}/replies", get(replies_handler))
        .fallback(get(get_object_handler))
        .with_state(state)
}
