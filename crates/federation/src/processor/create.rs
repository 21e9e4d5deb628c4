use tracing::debug;

use super::require_objects;
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::vocab::{Object, Reference, normalize_recipients};

impl Federator {
    /// Store every object a remote Create carries, fetching those given by IRI.
    ///
    /// Values already stored under the same id are left untouched; changing
    /// them takes an Update from their origin.
    pub(crate) async fn federated_create(&self, activity: &Object) -> FederationResult<()> {
        for reference in require_objects(activity)? {
            let value = match reference {
                Reference::Embedded(value) => value,
                Reference::Iri(iri) => self.transport.dereference(&iri).await?,
            };
            let id = value.require_id()?;
            if self.owns(&id).await? {
                return Err(FederationError::Forbidden(format!(
                    "remote Create may not overwrite local {id}"
                )));
            }

            {
                let _lock = self.lock(&id).await?;
                if self.db.exists(&id).await? {
                    debug!(%id, "created object already stored, keeping it");
                    continue;
                }
                self.db.create(&value).await?;
            }
            debug!(%id, "stored created object");
            self.record_replies(&value).await?;
        }
        Ok(())
    }

    /// Attribute, address and store the objects of a local Create.
    pub(crate) async fn social_create(&self, mut create: Object) -> FederationResult<Object> {
        require_objects(&create)?;
        backfill_attribution(&mut create);
        normalize_recipients(&mut create);

        // Stored with hidden recipients intact; delivery strips them later.
        for reference in create.references("object") {
            let Reference::Embedded(value) = reference else {
                return Err(FederationError::BadRequest(
                    "objects of a local Create must be embedded".to_string(),
                ));
            };
            let id = value.require_id()?;
            {
                let _lock = self.lock(&id).await?;
                self.db.create(&value).await?;
            }
            self.record_replies(&value).await?;
        }
        Ok(create)
    }

    /// List a stored object in the `replies` of each local object it answers.
    async fn record_replies(&self, value: &Object) -> FederationResult<()> {
        let id = value.require_id()?;
        for parent in value.iris("inReplyTo") {
            if self.owns(&parent).await? {
                self.prepend_to_value_collection(&parent, "replies", &id, "Collection")
                    .await?;
            }
        }
        Ok(())
    }
}

/// Give each embedded object every Create actor as `attributedTo`, and the
/// Create every object's `attributedTo` as `actor` when it names actors at all.
fn backfill_attribution(create: &mut Object) {
    let mut actors = create.iris("actor");
    let has_actor = create.has("actor");

    let mut objects = create.references("object");
    for reference in &mut objects {
        let Reference::Embedded(value) = reference else {
            continue;
        };
        let attributed = value.iris("attributedTo");
        for actor in &actors {
            if !attributed.contains(actor) {
                value.append_iri("attributedTo", actor);
            }
        }
        for author in attributed {
            if has_actor && !actors.contains(&author) {
                actors.push(author);
            }
        }
    }
    create.set_references("object", objects);

    if has_actor {
        let actors: Vec<Reference> = actors.into_iter().map(Reference::Iri).collect();
        create.set_references("actor", actors);
    }
}
