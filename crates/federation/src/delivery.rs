//! Recipient resolution and fan-out delivery.
//!
//! Addressing is flattened, inboxes are found locally where possible and by
//! dereferencing otherwise, and the activity is serialized once and posted to
//! every inbox concurrently. One failing inbox never stops the others; the
//! failures come back together as [`FederationError::Delivery`].

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{DeliveryFailure, FederationError, FederationResult};
use crate::federator::{Federator, within_depth};
use crate::transport::Transport;
use crate::vocab::{Object, Reference, recipients, strip_hidden_recipients};

impl Federator {
    /// Deliver `activity` on behalf of the owner of `outbox` to everyone it addresses.
    pub async fn deliver(&self, outbox: &Url, activity: &Object) -> FederationResult<()> {
        let actor = self.actor_for_outbox(outbox).await?;
        let own_inbox = match self.db.get(&actor).await {
            Ok(actor) => actor.inbox(),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let inboxes = self
            .resolve_inboxes(
                recipients(activity),
                own_inbox.as_ref(),
                self.settings.max_delivery_depth,
            )
            .await?;
        self.deliver_to(activity, inboxes).await
    }

    /// Turn candidate recipient IRIs into a deduplicated list of inboxes.
    ///
    /// Addressed IRIs sit at depth 0 and the members of a collection one level
    /// below it. Members are only resolved when their depth is within
    /// `max_depth`. Values that cannot be fetched are skipped. `own_inbox` is
    /// never part of the result.
    pub(crate) async fn resolve_inboxes(
        &self,
        candidates: Vec<Url>,
        own_inbox: Option<&Url>,
        max_depth: i32,
    ) -> FederationResult<Vec<Url>> {
        let candidates = self.hooks.delivery_recipient_pre_sort(candidates);

        let mut inboxes: Vec<Url> = Vec::new();
        let mut visited: HashSet<Url> = HashSet::new();
        let mut queue: VecDeque<(Url, i32)> = VecDeque::new();
        for candidate in candidates {
            if visited.insert(candidate.clone()) {
                queue.push_back((candidate, 0));
            }
        }

        while let Some((iri, depth)) = queue.pop_front() {
            let known = {
                let _lock = self.lock(&iri).await?;
                self.db.inboxes_for_iri(&iri).await?
            };
            if !known.is_empty() {
                inboxes.extend(known);
                continue;
            }

            let value = match self.transport.dereference(&iri).await {
                Ok(value) => value,
                Err(e) => {
                    debug!(%iri, error = %e, "skipping unresolvable recipient");
                    continue;
                }
            };
            if let Some(inbox) = value.inbox() {
                inboxes.push(inbox);
                continue;
            }
            if !value.is_collection() {
                continue;
            }
            if !within_depth(max_depth, depth + 1) {
                debug!(collection = %iri, depth, "recipient collection members beyond depth bound");
                continue;
            }

            let mut members: Vec<Reference> = value
                .items()
                .iter()
                .filter_map(Reference::from_value)
                .collect();
            // A paged collection lists its members on `first`; that page
            // sits at the same depth as its collection.
            if members.is_empty() {
                match value.references("first").into_iter().next() {
                    Some(Reference::Embedded(page)) => {
                        members = page.items().iter().filter_map(Reference::from_value).collect();
                    }
                    Some(Reference::Iri(page)) => {
                        if visited.insert(page.clone()) {
                            queue.push_front((page, depth));
                        }
                    }
                    None => {}
                }
            }

            for member in members {
                if let Some(inbox) = member.as_object().and_then(Object::inbox) {
                    inboxes.push(inbox);
                } else if let Some(id) = member.id() {
                    if visited.insert(id.clone()) {
                        queue.push_back((id, depth + 1));
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        inboxes.retain(|inbox| Some(inbox) != own_inbox && seen.insert(inbox.clone()));
        Ok(inboxes)
    }

    /// Serialize `activity` without hidden recipients and post it to every inbox.
    pub(crate) async fn deliver_to(&self, activity: &Object, inboxes: Vec<Url>) -> FederationResult<()> {
        if inboxes.is_empty() {
            debug!(id = activity.get_str("id").unwrap_or_default(), "no recipients to deliver to");
            return Ok(());
        }

        let mut body = activity.clone();
        strip_hidden_recipients(&mut body);
        let payload = serde_json::to_vec(&body)
            .map_err(|e| FederationError::Internal(format!("serialize activity: {e}")))?;

        info!(
            activity_type = body.kind().unwrap_or_default(),
            id = body.get_str("id").unwrap_or_default(),
            recipients = inboxes.len(),
            "Delivering activity"
        );
        batch_deliver(&self.transport, Bytes::from(payload), inboxes).await
    }
}

/// POST one payload to many inboxes concurrently.
///
/// Every request runs to completion; the batch fails if any of them failed.
pub async fn batch_deliver(
    transport: &Arc<dyn Transport>,
    payload: Bytes,
    inboxes: Vec<Url>,
) -> FederationResult<()> {
    let mut pending: HashSet<Url> = inboxes.iter().cloned().collect();
    let mut tasks = JoinSet::new();
    for inbox in inboxes {
        let transport = Arc::clone(transport);
        let payload = payload.clone();
        tasks.spawn(async move {
            let result = transport.deliver(payload, &inbox).await;
            (inbox, result)
        });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((inbox, Ok(()))) => {
                pending.remove(&inbox);
            }
            Ok((inbox, Err(e))) => {
                warn!(%inbox, error = %e, "Delivery failed");
                pending.remove(&inbox);
                failures.push(DeliveryFailure {
                    inbox,
                    reason: e.to_string(),
                });
            }
            Err(e) => warn!(error = %e, "Delivery task did not complete"),
        }
    }
    failures.extend(pending.into_iter().map(|inbox| DeliveryFailure {
        inbox,
        reason: "delivery task did not complete".to_string(),
    }));

    if failures.is_empty() {
        Ok(())
    } else {
        Err(FederationError::Delivery(failures))
    }
}
