//! Inbox endpoints.

use axum::{
    body::Bytes,
    extract::{OriginalUri, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use hearth_common::{AppError, AppResult};
use tracing::{error, info};

use super::FederationState;
use super::negotiate::{accepts_protocol, human_page, protocol_response, sends_protocol};
use crate::auth::InboundRequest;
use crate::paging::PageQuery;

/// `POST {inbox}`: federated delivery.
///
/// Answers 202 once the activity is recorded. Unexpected failures are logged
/// and answered with a bare 400.
pub async fn post_inbox_handler(
    State(state): State<FederationState>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !sends_protocol(&headers) {
        return AppError::NotAcceptable.into_response();
    }
    let inbox = match state.resource_iri(&uri) {
        Ok(inbox) => inbox,
        Err(e) => return e.into_response(),
    };
    let path_and_query = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    let request = InboundRequest {
        method: &method,
        path_and_query,
        headers: &headers,
        body: &body,
    };

    match state.federator.post_inbox(&inbox, request).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) if e.status_code().is_server_error() => {
            error!(%inbox, error = %e, "Inbox processing failed");
            AppError::BadRequest("activity could not be processed".to_string()).into_response()
        }
        Err(e) => {
            info!(%inbox, error = %e, "Inbox delivery refused");
            AppError::from(e).into_response()
        }
    }
}

/// `GET {inbox}`: the inbox as a paged collection.
pub async fn get_inbox_handler(
    State(state): State<FederationState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let inbox = state.resource_iri(&uri)?;
    let federator = &state.federator;
    if !accepts_protocol(&headers) {
        let actor = federator.actor_for_inbox(&inbox).await?;
        return Ok(human_page(federator.get_object(&actor).await.ok().as_ref()));
    }

    let collection = federator.get_inbox(&inbox, &query).await?;
    Ok(protocol_response(StatusCode::OK, &collection, federator.clock.as_ref()))
}
