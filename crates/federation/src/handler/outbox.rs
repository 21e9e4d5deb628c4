//! Outbox endpoints.

use axum::{
    body::Bytes,
    extract::{OriginalUri, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::Response,
};
use hearth_common::{AppError, AppResult};

use super::FederationState;
use super::negotiate::{accepts_protocol, human_page, protocol_response, sends_protocol};
use crate::auth::InboundRequest;
use crate::paging::PageQuery;

/// `POST {outbox}`: publish a local activity. Answers 201 with `Location`.
pub async fn post_outbox_handler(
    State(state): State<FederationState>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    if !sends_protocol(&headers) {
        return Err(AppError::NotAcceptable);
    }
    let outbox = state.resource_iri(&uri)?;
    let path_and_query = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    let request = InboundRequest {
        method: &method,
        path_and_query,
        headers: &headers,
        body: &body,
    };

    let activity = state.federator.post_outbox(&outbox, request).await?;
    let location = activity
        .id()
        .and_then(|id| HeaderValue::from_str(id.as_str()).ok())
        .ok_or_else(|| AppError::Internal("published activity has no id".to_string()))?;

    let mut response = protocol_response(
        StatusCode::CREATED,
        activity.as_map(),
        state.federator.clock.as_ref(),
    );
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}

/// `GET {outbox}`: the outbox as a paged collection.
pub async fn get_outbox_handler(
    State(state): State<FederationState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let outbox = state.resource_iri(&uri)?;
    let federator = &state.federator;
    if !accepts_protocol(&headers) {
        let actor = federator.actor_for_outbox(&outbox).await?;
        return Ok(human_page(federator.get_object(&actor).await.ok().as_ref()));
    }

    let collection = federator.get_outbox(&outbox, &query).await?;
    Ok(protocol_response(StatusCode::OK, &collection, federator.clock.as_ref()))
}
