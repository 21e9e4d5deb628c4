//! The storage capability the engine runs against.
//!
//! Every read-modify-write the engine performs happens while it holds the
//! [`LockHandle`] for the id being modified. Handles release on drop, so an
//! early return or a cancelled request frees the lock too.

mod lock;
mod memory;
mod sql;
mod store;

pub use lock::{LockHandle, LockTable};
pub use memory::MemoryStore;
pub use sql::SqlStore;
pub use store::{ObjectStore, StoreDatabase};

use async_trait::async_trait;
use url::Url;

use crate::error::FederationResult;
use crate::vocab::Object;

/// Object store with advisory per-id locking.
#[async_trait]
pub trait Database: Send + Sync {
    /// Acquire the exclusive lock for `id`. The id need not exist.
    async fn lock(&self, id: &Url) -> FederationResult<LockHandle>;

    /// Whether `id` is among the inbox's items.
    async fn inbox_contains(&self, inbox: &Url, id: &Url) -> FederationResult<bool>;

    /// The inbox collection.
    async fn get_inbox(&self, inbox: &Url) -> FederationResult<Object>;

    /// Replace the inbox collection.
    async fn set_inbox(&self, inbox: &Object) -> FederationResult<()>;

    /// The outbox collection.
    async fn get_outbox(&self, outbox: &Url) -> FederationResult<Object>;

    /// Replace the outbox collection.
    async fn set_outbox(&self, outbox: &Object) -> FederationResult<()>;

    /// Whether the IRI is minted by this server.
    async fn owns(&self, id: &Url) -> FederationResult<bool>;

    /// Actor owning the outbox.
    async fn actor_for_outbox(&self, outbox: &Url) -> FederationResult<Url>;

    /// Actor owning the inbox.
    async fn actor_for_inbox(&self, inbox: &Url) -> FederationResult<Url>;

    /// Outbox of the actor owning the inbox.
    async fn outbox_for_inbox(&self, inbox: &Url) -> FederationResult<Url>;

    /// Inboxes known locally for an actor or collection IRI. Empty when unknown.
    async fn inboxes_for_iri(&self, iri: &Url) -> FederationResult<Vec<Url>>;

    /// Whether a value with this id is stored.
    async fn exists(&self, id: &Url) -> FederationResult<bool>;

    /// The stored value, or `NotFound`.
    async fn get(&self, id: &Url) -> FederationResult<Object>;

    /// Store a new value.
    async fn create(&self, value: &Object) -> FederationResult<()>;

    /// Replace a stored value.
    async fn update(&self, value: &Object) -> FederationResult<()>;

    /// Remove a stored value.
    async fn delete(&self, id: &Url) -> FederationResult<()>;

    /// Mint a fresh IRI for a value about to be stored.
    async fn new_id(&self, value: &Object) -> FederationResult<Url>;

    /// The actor's `followers` collection.
    async fn followers(&self, actor: &Url) -> FederationResult<Object>;

    /// The actor's `following` collection.
    async fn following(&self, actor: &Url) -> FederationResult<Object>;

    /// The actor's `liked` collection.
    async fn liked(&self, actor: &Url) -> FederationResult<Object>;
}
