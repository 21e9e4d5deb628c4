use serde_json::json;
use tracing::debug;
use url::Url;

use super::{reference_id, require_objects, require_targets};
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::vocab::{Object, Reference};

impl Federator {
    /// Append the activity's objects to every locally owned target collection.
    pub(crate) async fn add_to_targets(&self, activity: &Object) -> FederationResult<()> {
        let members = member_ids(activity)?;
        self.edit_owned_targets(activity, |collection| {
            for id in &members {
                append_if_absent(collection, id);
            }
        })
        .await
    }

    /// Drop the activity's objects from every locally owned target collection.
    pub(crate) async fn remove_from_targets(&self, activity: &Object) -> FederationResult<()> {
        let members = member_ids(activity)?;
        self.edit_owned_targets(activity, |collection| {
            for id in &members {
                remove_member(collection, id);
            }
        })
        .await
    }

    /// Read-modify-write one of `actor`'s own collections under its lock.
    pub(crate) async fn edit_actor_collection<F>(
        &self,
        actor: &Url,
        which: ActorCollection,
        edit: F,
    ) -> FederationResult<()>
    where
        F: FnOnce(&mut Object),
    {
        let property = which.property();
        let owner = {
            let _actor_lock = self.lock(actor).await?;
            self.db.get(actor).await?
        };
        let collection_id = owner.iri(property).ok_or_else(|| {
            FederationError::NotFound(format!("{actor} has no {property} collection"))
        })?;

        let _lock = self.lock(&collection_id).await?;
        let mut collection = match which {
            ActorCollection::Followers => self.db.followers(actor).await?,
            ActorCollection::Following => self.db.following(actor).await?,
            ActorCollection::Liked => self.db.liked(actor).await?,
        };
        edit(&mut collection);
        self.db.update(&collection).await
    }

    /// Prepend `id` to the collection in `property` of the stored local value `target`.
    ///
    /// The collection may be embedded or stored apart under its own IRI. A
    /// missing one is created embedded with type `kind`.
    pub(crate) async fn prepend_to_value_collection(
        &self,
        target: &Url,
        property: &str,
        id: &Url,
        kind: &str,
    ) -> FederationResult<()> {
        let _lock = self.lock(target).await?;
        let mut value = match self.db.get(target).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => {
                debug!(%target, property, "no stored value to record on");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match value.references(property).into_iter().next() {
            Some(Reference::Iri(collection_id)) => {
                let _collection_lock = self.lock(&collection_id).await?;
                let mut collection = self.db.get(&collection_id).await?;
                prepend_if_absent(&mut collection, id);
                self.db.update(&collection).await
            }
            Some(Reference::Embedded(mut collection)) => {
                prepend_if_absent(&mut collection, id);
                value.set(property, collection.into_value());
                self.db.update(&value).await
            }
            None => {
                let mut collection = Object::new();
                collection.set_kind(kind);
                prepend_if_absent(&mut collection, id);
                value.set(property, collection.into_value());
                self.db.update(&value).await
            }
        }
    }

    async fn edit_owned_targets<F>(&self, activity: &Object, mut edit: F) -> FederationResult<()>
    where
        F: FnMut(&mut Object),
    {
        for target in require_targets(activity)? {
            let target = reference_id(&target)?;
            if !self.owns(&target).await? {
                debug!(%target, "skipping target owned elsewhere");
                continue;
            }

            let _lock = self.lock(&target).await?;
            let mut collection = self.db.get(&target).await?;
            if !collection.is_collection() {
                return Err(FederationError::BadRequest(format!(
                    "target {target} is not a collection"
                )));
            }
            edit(&mut collection);
            self.db.update(&collection).await?;
        }
        Ok(())
    }
}

/// Collections every local actor carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActorCollection {
    Followers,
    Following,
    Liked,
}

impl ActorCollection {
    const fn property(self) -> &'static str {
        match self {
            Self::Followers => "followers",
            Self::Following => "following",
            Self::Liked => "liked",
        }
    }
}

fn member_ids(activity: &Object) -> FederationResult<Vec<Url>> {
    require_objects(activity)?.iter().map(reference_id).collect()
}

/// Whether the collection already lists `id`.
pub(crate) fn contains_member(collection: &Object, id: &Url) -> bool {
    collection
        .iris(collection.items_property())
        .iter()
        .any(|member| member == id)
}

/// Put `id` first in the collection and refresh `totalItems`.
pub(crate) fn prepend_member(collection: &mut Object, id: &Url) {
    let property = collection.items_property();
    collection.prepend_iri(property, id);
    refresh_total(collection);
}

/// Put `id` last in the collection unless it is already listed.
pub(crate) fn append_if_absent(collection: &mut Object, id: &Url) {
    if !contains_member(collection, id) {
        let property = collection.items_property();
        collection.append_iri(property, id);
        refresh_total(collection);
    }
}

/// Remove `id` from the collection and refresh `totalItems`.
pub(crate) fn remove_member(collection: &mut Object, id: &Url) -> usize {
    let property = collection.items_property();
    let removed = collection.remove_iri(property, id);
    refresh_total(collection);
    removed
}

/// Prepend `id` unless the collection already lists it.
pub(crate) fn prepend_if_absent(collection: &mut Object, id: &Url) {
    if !contains_member(collection, id) {
        prepend_member(collection, id);
    }
}

fn refresh_total(collection: &mut Object) {
    let total = collection.items().len();
    collection.set("totalItems", json!(total));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::Database;
    use crate::federator::Settings;
    use crate::processor::tests::{fixture, iri, object};

    const FEATURED: &str = "https://hearth.example/users/alice/featured";

    async fn seed_featured(fx: &crate::processor::tests::Fixture, items: serde_json::Value) {
        fx.db
            .create(&object(json!({
                "id": FEATURED,
                "type": "OrderedCollection",
                "orderedItems": items
            })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_appends_to_owned_target() {
        let fx = fixture(Settings::default());
        seed_featured(&fx, json!(["https://hearth.example/objects/old"])).await;

        let add = object(json!({
            "id": "https://remote.example/activities/a1",
            "type": "Add",
            "object": "https://hearth.example/objects/new",
            "target": FEATURED
        }));
        fx.federator.add_to_targets(&add).await.unwrap();

        let featured = fx.db.get(&iri(FEATURED)).await.unwrap();
        assert_eq!(
            featured.iris("orderedItems"),
            vec![
                iri("https://hearth.example/objects/old"),
                iri("https://hearth.example/objects/new")
            ]
        );
        assert_eq!(featured.get("totalItems"), Some(&json!(2)));

        // A second Add of the same member changes nothing.
        fx.federator.add_to_targets(&add).await.unwrap();
        let featured = fx.db.get(&iri(FEATURED)).await.unwrap();
        assert_eq!(featured.get("totalItems"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_add_ignores_foreign_targets() {
        let fx = fixture(Settings::default());
        let add = object(json!({
            "id": "https://remote.example/activities/a1",
            "type": "Add",
            "object": "https://remote.example/notes/1",
            "target": "https://remote.example/users/bob/featured"
        }));
        fx.federator.add_to_targets(&add).await.unwrap();
        assert!(
            !fx.db
                .exists(&iri("https://remote.example/users/bob/featured"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_add_requires_target() {
        let fx = fixture(Settings::default());
        let add = object(json!({
            "id": "https://remote.example/activities/a1",
            "type": "Add",
            "object": "https://remote.example/notes/1"
        }));
        let err = fx.federator.add_to_targets(&add).await.unwrap_err();
        assert!(matches!(err, FederationError::TargetRequired));
    }

    #[tokio::test]
    async fn test_remove_drops_member() {
        let fx = fixture(Settings::default());
        seed_featured(
            &fx,
            json!(["https://hearth.example/objects/a", "https://hearth.example/objects/b"]),
        )
        .await;

        let remove = object(json!({
            "id": "https://remote.example/activities/r1",
            "type": "Remove",
            "object": "https://hearth.example/objects/a",
            "target": FEATURED
        }));
        fx.federator.remove_from_targets(&remove).await.unwrap();

        let featured = fx.db.get(&iri(FEATURED)).await.unwrap();
        assert_eq!(
            featured.iris("orderedItems"),
            vec![iri("https://hearth.example/objects/b")]
        );
        assert_eq!(featured.get("totalItems"), Some(&json!(1)));
    }
}
