//! Stored values and reply threads.

use axum::{
    extract::{OriginalUri, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use hearth_common::AppResult;
use serde::Deserialize;

use super::FederationState;
use super::negotiate::{accepts_protocol, human_page, protocol_response};
use crate::paging::PageQuery;
use crate::replies::parse_only_other_accounts;
use crate::vocab::strip_hidden_recipients;

/// `GET` of any stored value: actors, objects, activities and collections.
///
/// Tombstones are served with 410. Hidden recipients never leave the server.
pub async fn get_object_handler(
    State(state): State<FederationState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> AppResult<Response> {
    let iri = state.resource_iri(&uri)?;
    let mut value = state.federator.get_object(&iri).await?;
    let clock = state.federator.clock.as_ref();

    if value.is_tombstone() {
        return Ok(protocol_response(StatusCode::GONE, value.as_map(), clock));
    }
    if !accepts_protocol(&headers) {
        return Ok(human_page(Some(&value)));
    }
    strip_hidden_recipients(&mut value);
    Ok(protocol_response(StatusCode::OK, value.as_map(), clock))
}

/// Query of `GET {object}/replies`.
#[derive(Debug, Default, Deserialize)]
pub struct RepliesQuery {
    /// Leave out the author's own replies; defaults to `true`.
    pub only_other_accounts: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

/// `GET {object}/replies`: the reply thread as a paged collection.
pub async fn replies_handler(
    State(state): State<FederationState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(query): Query<RepliesQuery>,
) -> AppResult<Response> {
    let object = state.parent_iri(&uri)?;
    let federator = &state.federator;
    if !accepts_protocol(&headers) {
        let value = federator.get_object(&object).await?;
        return Ok(human_page(Some(&value)));
    }

    let only_other_accounts = parse_only_other_accounts(query.only_other_accounts.as_deref())?;
    let collection = federator
        .get_replies(&object, only_other_accounts, &query.page)
        .await?;
    Ok(protocol_response(StatusCode::OK, &collection, federator.clock.as_ref()))
}
