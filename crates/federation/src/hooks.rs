//! Application policy plugged into the engine.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::FederationResult;
use crate::vocab::{ActivityKind, Object};

/// Which dispatch table an activity went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Received in an inbox from another server.
    Federating,
    /// Posted to a local outbox.
    Social,
}

/// Extension points the host application implements.
///
/// Every method has a default, so an application overrides only what it needs.
#[async_trait]
pub trait FederationHooks: Send + Sync {
    /// Whether any of the actors is blocked. Blocked activities are refused with `Forbidden`.
    async fn blocked(&self, _actors: &[Url]) -> FederationResult<bool> {
        Ok(false)
    }

    /// Collections an inbox-forwarded activity should reach.
    async fn filter_forwarding(
        &self,
        collections: Vec<Url>,
        _activity: &Object,
    ) -> FederationResult<Vec<Url>> {
        Ok(collections)
    }

    /// Reorder candidate recipients before inbox resolution.
    fn delivery_recipient_pre_sort(&self, recipients: Vec<Url>) -> Vec<Url> {
        recipients
    }

    /// Runs after the built-in side effects of a recognised activity type.
    async fn on_activity(
        &self,
        _side: Side,
        _kind: &ActivityKind,
        _activity: &Object,
    ) -> FederationResult<()> {
        Ok(())
    }

    /// Runs for activity types without built-in side effects.
    async fn default_callback(&self, side: Side, activity: &Object) -> FederationResult<()> {
        debug!(
            ?side,
            activity_type = activity.kind().unwrap_or_default(),
            "no handler for activity type"
        );
        Ok(())
    }
}

/// Hooks with every default in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl FederationHooks for DefaultHooks {}

/// Refuses activities from actors on blocked domains.
#[derive(Debug, Clone, Default)]
pub struct BlocklistHooks {
    domains: HashSet<String>,
}

impl BlocklistHooks {
    /// Hooks blocking the given hosts. Entries are matched case-insensitively,
    /// and a blocked domain also blocks its subdomains.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Whether the host of `iri` is blocked.
    #[must_use]
    pub fn is_blocked(&self, iri: &Url) -> bool {
        let Some(host) = iri.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        self.domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[async_trait]
impl FederationHooks for BlocklistHooks {
    async fn blocked(&self, actors: &[Url]) -> FederationResult<bool> {
        Ok(actors.iter().any(|actor| self.is_blocked(actor)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_blocklist_matches_domain_and_subdomains() {
        let hooks = BlocklistHooks::new(["Spam.example", " .bad.example "]);
        assert!(hooks.blocked(&[iri("https://spam.example/u/1")]).await.unwrap());
        assert!(hooks.blocked(&[iri("https://a.bad.example/u/1")]).await.unwrap());
        assert!(!hooks.blocked(&[iri("https://notspam.example/u/1")]).await.unwrap());
        assert!(
            hooks
                .blocked(&[iri("https://ok.example/u"), iri("https://spam.example/u")])
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_defaults_pass_through() {
        let hooks = DefaultHooks;
        let collections = vec![iri("https://hearth.example/users/a/followers")];
        assert!(!hooks.blocked(&collections).await.unwrap());
        assert_eq!(
            hooks
                .filter_forwarding(collections.clone(), &Object::new())
                .await
                .unwrap(),
            collections
        );
        assert_eq!(hooks.delivery_recipient_pre_sort(collections.clone()), collections);
    }
}
