//! Inbox pipeline: authenticate, parse, authorize, record, dispatch, forward.

use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::InboundRequest;
use crate::collection::{CollectionRequest, CollectionStyle, PagedCollection};
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::paging::PageQuery;
use crate::vocab::Object;

impl Federator {
    /// Receive one activity into `inbox`.
    ///
    /// A replay of an activity already in the inbox succeeds without running
    /// side effects again. Forwarding failures are logged, never returned.
    pub async fn post_inbox(&self, inbox: &Url, request: InboundRequest<'_>) -> FederationResult<()> {
        let authenticated = self.authenticator.authenticate(request).await?;
        self.actor_for_inbox(inbox).await?;

        let activity = parse_document(request.body)?;
        let id = activity
            .id()
            .ok_or_else(|| FederationError::BadRequest("activity has no id".to_string()))?;

        let mut actors = activity.iris("actor");
        if let Some(signer) = authenticated.actor {
            if !actors.contains(&signer) {
                actors.push(signer);
            }
        }
        info!(
            activity_type = activity.kind().unwrap_or_default(),
            actor = ?actors.first().map(Url::as_str),
            %id,
            "Received activity"
        );

        if self.hooks.blocked(&actors).await? {
            return Err(FederationError::Forbidden(format!("{id} comes from a blocked actor")));
        }

        if !self.record_in_inbox(inbox, &id).await? {
            debug!(%id, %inbox, "Activity already received, skipping side effects");
            return Ok(());
        }

        self.dispatch_federated(inbox, &activity).await?;

        if let Err(e) = self.forward(inbox, &activity).await {
            warn!(%id, error = %e, "Inbox forwarding failed");
        }
        Ok(())
    }

    /// Prepend `id` to the inbox unless it is already there. Returns whether it was new.
    async fn record_in_inbox(&self, inbox: &Url, id: &Url) -> FederationResult<bool> {
        let _lock = self.lock(inbox).await?;
        if self.db.inbox_contains(inbox, id).await? {
            return Ok(false);
        }
        let mut collection = self.db.get_inbox(inbox).await?;
        collection.prepend_iri("orderedItems", id);
        self.db.set_inbox(&collection).await?;
        Ok(true)
    }

    /// The inbox as a root or page, with repeated ids removed from pages.
    pub async fn get_inbox(&self, inbox: &Url, query: &PageQuery) -> FederationResult<PagedCollection> {
        self.actor_for_inbox(inbox).await?;
        let page = query.to_page(self.pager.limits())?;
        let items = {
            let _lock = self.lock(inbox).await?;
            self.db.get_inbox(inbox).await?.items()
        };
        let request = CollectionRequest {
            id: inbox.clone(),
            extra_params: Vec::new(),
            style: CollectionStyle::Ordered,
            page,
            dedupe: true,
        };
        Ok(self.pager.render(&request, &items))
    }
}

/// Parse exactly one JSON object from a request body.
pub(crate) fn parse_document(body: &[u8]) -> FederationResult<Object> {
    let mut values = serde_json::Deserializer::from_slice(body).into_iter::<Value>();
    let value = values
        .next()
        .ok_or_else(|| FederationError::BadRequest("empty body".to_string()))??;
    if values.next().is_some() {
        return Err(FederationError::BadRequest(
            "trailing data after JSON document".to_string(),
        ));
    }
    Object::from_value(value)
}
