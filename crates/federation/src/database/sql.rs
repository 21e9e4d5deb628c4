use async_trait::async_trait;
use hearth_db::{ObjectRecord, ObjectRepository, entities::ap_object};
use url::Url;

use super::ObjectStore;
use crate::error::{FederationError, FederationResult};
use crate::vocab::Object;

/// [`ObjectStore`] backed by the `ap_object` table.
#[derive(Clone)]
pub struct SqlStore {
    repo: ObjectRepository,
}

impl SqlStore {
    /// Store over an object repository.
    #[must_use]
    pub const fn new(repo: ObjectRepository) -> Self {
        Self { repo }
    }
}

fn decode(model: ap_object::Model) -> FederationResult<Object> {
    Object::from_value(model.body)
        .map_err(|e| FederationError::Database(format!("corrupt row {}: {e}", model.iri)))
}

#[async_trait]
impl ObjectStore for SqlStore {
    async fn load(&self, id: &Url) -> FederationResult<Option<Object>> {
        self.repo.find_by_iri(id.as_str()).await?.map(decode).transpose()
    }

    async fn save(&self, value: &Object, local: bool) -> FederationResult<()> {
        let id = value.require_id()?;
        let record = ObjectRecord {
            iri: id.to_string(),
            kind: value.kind().unwrap_or("Object").to_string(),
            inbox: value.inbox().map(String::from),
            outbox: value.iri("outbox").map(String::from),
            local,
            body: value.clone().into_value(),
        };
        Ok(self.repo.upsert(record).await?)
    }

    async fn remove(&self, id: &Url) -> FederationResult<()> {
        Ok(self.repo.delete(id.as_str()).await?)
    }

    async fn find_actor_by_inbox(&self, inbox: &Url) -> FederationResult<Option<Object>> {
        self.repo
            .find_by_inbox(inbox.as_str())
            .await?
            .map(decode)
            .transpose()
    }

    async fn find_actor_by_outbox(&self, outbox: &Url) -> FederationResult<Option<Object>> {
        self.repo
            .find_by_outbox(outbox.as_str())
            .await?
            .map(decode)
            .transpose()
    }
}
