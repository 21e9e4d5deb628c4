use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use url::Url;

use super::ObjectStore;
use crate::error::FederationResult;
use crate::vocab::Object;

#[derive(Debug, Clone)]
struct Entry {
    value: Object,
    local: bool,
}

/// Process-local [`ObjectStore`], used when no database is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of stored values minted by this server.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.objects.iter().filter(|entry| entry.local).count()
    }

    fn find_by(&self, property: &str, iri: &Url) -> Option<Object> {
        self.objects
            .iter()
            .find(|entry| entry.value.iri(property).as_ref() == Some(iri))
            .map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn load(&self, id: &Url) -> FederationResult<Option<Object>> {
        Ok(self.objects.get(id.as_str()).map(|entry| entry.value.clone()))
    }

    async fn save(&self, value: &Object, local: bool) -> FederationResult<()> {
        let id = value.require_id()?;
        self.objects.insert(
            id.to_string(),
            Entry {
                value: value.clone(),
                local,
            },
        );
        Ok(())
    }

    async fn remove(&self, id: &Url) -> FederationResult<()> {
        self.objects.remove(id.as_str());
        Ok(())
    }

    async fn find_actor_by_inbox(&self, inbox: &Url) -> FederationResult<Option<Object>> {
        Ok(self.find_by("inbox", inbox))
    }

    async fn find_actor_by_outbox(&self, outbox: &Url) -> FederationResult<Option<Object>> {
        Ok(self.find_by("outbox", outbox))
    }
}
