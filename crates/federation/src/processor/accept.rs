use tracing::debug;
use url::Url;

use super::collection::{ActorCollection, prepend_if_absent};
use super::{reference_id, require_objects};
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::vocab::{ActivityKind, Object, Reference};

impl Federator {
    /// Record the accepting actors as followed once an Accept of our Follow arrives.
    pub(crate) async fn federated_accept(&self, inbox: &Url, accept: &Object) -> FederationResult<()> {
        let objects = require_objects(accept)?;
        let accepting = accept.iris("actor");
        let owner = self.actor_for_inbox(inbox).await?;

        for reference in objects {
            let follow = match reference {
                Reference::Embedded(follow) => follow,
                Reference::Iri(iri) => self.lookup(&iri).await?,
            };
            if follow.activity_kind() != ActivityKind::Follow {
                continue;
            }
            if !follow.iris("actor").contains(&owner) {
                debug!(%owner, "Accept of a Follow not sent by the inbox owner");
                continue;
            }

            // Only the actors that were followed may accept.
            let followed: Vec<Url> = follow
                .references("object")
                .iter()
                .map(reference_id)
                .collect::<FederationResult<_>>()?;
            if accepting.is_empty() || !accepting.iter().all(|actor| followed.contains(actor)) {
                return Err(FederationError::Forbidden(
                    "Accept actor is not the followed actor".to_string(),
                ));
            }

            self.edit_actor_collection(&owner, ActorCollection::Following, |collection| {
                for actor in &accepting {
                    prepend_if_absent(collection, actor);
                }
            })
            .await?;
        }
        Ok(())
    }

    /// A value by IRI: the stored copy when there is one, otherwise fetched.
    pub(crate) async fn lookup(&self, iri: &Url) -> FederationResult<Object> {
        let stored = {
            let _lock = self.lock(iri).await?;
            self.db.get(iri).await
        };
        match stored {
            Ok(value) => Ok(value),
            Err(e) if e.is_not_found() => self.transport.dereference(iri).await,
            Err(e) => Err(e),
        }
    }
}
