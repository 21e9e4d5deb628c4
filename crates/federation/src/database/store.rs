use async_trait::async_trait;
use hearth_common::IdGenerator;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{Database, LockHandle, LockTable};
use crate::error::{FederationError, FederationResult};
use crate::vocab::{AS_CONTEXT, Object, Reference};

/// Raw persistence of JSON values keyed by IRI.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// The stored value, if any.
    async fn load(&self, id: &Url) -> FederationResult<Option<Object>>;

    /// Insert or replace a value. `local` marks IRIs minted by this server.
    async fn save(&self, value: &Object, local: bool) -> FederationResult<()>;

    /// Remove a value. Removing a missing value is not an error.
    async fn remove(&self, id: &Url) -> FederationResult<()>;

    /// The actor whose `inbox` is `inbox`.
    async fn find_actor_by_inbox(&self, inbox: &Url) -> FederationResult<Option<Object>>;

    /// The actor whose `outbox` is `outbox`.
    async fn find_actor_by_outbox(&self, outbox: &Url) -> FederationResult<Option<Object>>;
}

/// [`Database`] over any [`ObjectStore`].
///
/// Everything under the configured base URL's origin is locally owned, and
/// fresh ids are minted below `{base}/objects/`.
pub struct StoreDatabase<S> {
    store: S,
    locks: LockTable,
    base: Url,
    ids: IdGenerator,
}

impl<S: ObjectStore> StoreDatabase<S> {
    /// Wrap a store for the instance at `base`.
    pub fn new(store: S, base: Url) -> Self {
        Self {
            store,
            locks: LockTable::new(),
            base,
            ids: IdGenerator::new(),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    fn is_local(&self, id: &Url) -> bool {
        id.origin() == self.base.origin()
    }

    async fn load_or_empty(&self, id: &Url, kind: &str) -> FederationResult<Object> {
        Ok(self.store.load(id).await?.unwrap_or_else(|| {
            let mut collection = Object::with_id(id, kind);
            collection.set("@context", json!(AS_CONTEXT));
            collection.set("totalItems", json!(0));
            collection
        }))
    }

    async fn actor_collection(&self, actor: &Url, property: &str) -> FederationResult<Object> {
        let actor_value = self.get(actor).await?;
        let collection = actor_value.iri(property).ok_or_else(|| {
            FederationError::NotFound(format!("{actor} has no {property} collection"))
        })?;
        self.load_or_empty(&collection, "OrderedCollection").await
    }

    async fn save_collection(&self, collection: &Object) -> FederationResult<()> {
        let mut collection = collection.clone();
        let total = collection.items().len();
        collection.set("totalItems", json!(total));
        let id = collection.require_id()?;
        self.store.save(&collection, self.is_local(&id)).await
    }
}

#[async_trait]
impl<S: ObjectStore> Database for StoreDatabase<S> {
    async fn lock(&self, id: &Url) -> FederationResult<LockHandle> {
        Ok(self.locks.acquire(id).await)
    }

    async fn inbox_contains(&self, inbox: &Url, id: &Url) -> FederationResult<bool> {
        let Some(inbox) = self.store.load(inbox).await? else {
            return Ok(false);
        };
        Ok(inbox
            .items()
            .iter()
            .filter_map(Reference::from_value)
            .any(|item| item.id().as_ref() == Some(id)))
    }

    async fn get_inbox(&self, inbox: &Url) -> FederationResult<Object> {
        self.load_or_empty(inbox, "OrderedCollection").await
    }

    async fn set_inbox(&self, inbox: &Object) -> FederationResult<()> {
        self.save_collection(inbox).await
    }

    async fn get_outbox(&self, outbox: &Url) -> FederationResult<Object> {
        self.load_or_empty(outbox, "OrderedCollection").await
    }

    async fn set_outbox(&self, outbox: &Object) -> FederationResult<()> {
        self.save_collection(outbox).await
    }

    async fn owns(&self, id: &Url) -> FederationResult<bool> {
        Ok(self.is_local(id))
    }

    async fn actor_for_outbox(&self, outbox: &Url) -> FederationResult<Url> {
        self.store
            .find_actor_by_outbox(outbox)
            .await?
            .and_then(|actor| actor.id())
            .ok_or_else(|| FederationError::NotFound(format!("no actor for outbox {outbox}")))
    }

    async fn actor_for_inbox(&self, inbox: &Url) -> FederationResult<Url> {
        self.store
            .find_actor_by_inbox(inbox)
            .await?
            .and_then(|actor| actor.id())
            .ok_or_else(|| FederationError::NotFound(format!("no actor for inbox {inbox}")))
    }

    async fn outbox_for_inbox(&self, inbox: &Url) -> FederationResult<Url> {
        self.store
            .find_actor_by_inbox(inbox)
            .await?
            .and_then(|actor| actor.iri("outbox"))
            .ok_or_else(|| FederationError::NotFound(format!("no outbox for inbox {inbox}")))
    }

    async fn inboxes_for_iri(&self, iri: &Url) -> FederationResult<Vec<Url>> {
        let Some(value) = self.store.load(iri).await? else {
            return Ok(Vec::new());
        };
        if let Some(inbox) = value.inbox() {
            return Ok(vec![inbox]);
        }
        if !value.is_collection() || !self.is_local(iri) {
            return Ok(Vec::new());
        }

        let mut inboxes = Vec::new();
        for item in value.items().iter().filter_map(Reference::from_value) {
            let inbox = match &item {
                Reference::Embedded(actor) => actor.inbox(),
                Reference::Iri(member) => self
                    .store
                    .load(member)
                    .await?
                    .and_then(|actor| actor.inbox()),
            };
            match inbox {
                Some(inbox) if !inboxes.contains(&inbox) => inboxes.push(inbox),
                Some(_) => {}
                // A member we know nothing about: let the caller resolve the
                // whole collection remotely instead of returning a partial list.
                None => {
                    debug!(collection = %iri, member = ?item.id(), "unknown collection member");
                    return Ok(Vec::new());
                }
            }
        }
        Ok(inboxes)
    }

    async fn exists(&self, id: &Url) -> FederationResult<bool> {
        Ok(self.store.load(id).await?.is_some())
    }

    async fn get(&self, id: &Url) -> FederationResult<Object> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| FederationError::not_found(id))
    }

    async fn create(&self, value: &Object) -> FederationResult<()> {
        let id = value.require_id()?;
        self.store.save(value, self.is_local(&id)).await
    }

    async fn update(&self, value: &Object) -> FederationResult<()> {
        let id = value.require_id()?;
        self.store.save(value, self.is_local(&id)).await
    }

    async fn delete(&self, id: &Url) -> FederationResult<()> {
        self.store.remove(id).await
    }

    async fn new_id(&self, _value: &Object) -> FederationResult<Url> {
        let path = format!("objects/{}", self.ids.generate());
        Ok(self.base.join(&path)?)
    }

    async fn followers(&self, actor: &Url) -> FederationResult<Object> {
        self.actor_collection(actor, "followers").await
    }

    async fn following(&self, actor: &Url) -> FederationResult<Object> {
        self.actor_collection(actor, "following").await
    }

    async fn liked(&self, actor: &Url) -> FederationResult<Object> {
        self.actor_collection(actor, "liked").await
    }
}
