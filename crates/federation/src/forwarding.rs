//! Inbox forwarding.
//!
//! A received activity addressed to one of our collections and touching
//! something we own (a reply to a local note, say) is passed on to that
//! collection's members, who could not have been addressed by the sender
//! directly.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info};
use url::Url;

use crate::error::FederationResult;
use crate::federator::{Federator, within_depth};
use crate::vocab::{Object, Reference, forwarding_recipients};

/// Properties searched for locally owned values.
const LINKING_PROPERTIES: [&str; 4] = ["inReplyTo", "object", "target", "tag"];

impl Federator {
    /// Forward a newly received activity from `inbox` when forwarding applies.
    pub(crate) async fn forward(&self, inbox: &Url, activity: &Object) -> FederationResult<()> {
        let id = activity.require_id()?;
        {
            let _lock = self.lock(&id).await?;
            if self.db.exists(&id).await? {
                debug!(%id, "activity already stored, not forwarding");
                return Ok(());
            }
            self.db.create(activity).await?;
        }

        let mut collections = Vec::new();
        for iri in forwarding_recipients(activity) {
            if !self.owns(&iri).await? {
                continue;
            }
            let value = {
                let _lock = self.lock(&iri).await?;
                match self.db.get(&iri).await {
                    Ok(value) => value,
                    Err(e) if e.is_not_found() => continue,
                    Err(e) => return Err(e),
                }
            };
            if value.is_collection() {
                collections.push(iri);
            }
        }
        if collections.is_empty() {
            return Ok(());
        }

        if !self
            .links_to_owned_value(activity, self.settings.max_forwarding_depth)
            .await?
        {
            debug!(%id, "activity touches nothing local, not forwarding");
            return Ok(());
        }

        let collections = self.hooks.filter_forwarding(collections, activity).await?;
        let inboxes = self
            .resolve_inboxes(collections, Some(inbox), self.settings.max_delivery_depth)
            .await?;
        info!(%id, recipients = inboxes.len(), "Forwarding activity");
        self.deliver_to(activity, inboxes).await
    }

    /// Whether `inReplyTo`, `object`, `target` or `tag`, followed transitively,
    /// reach a locally owned value within `max_depth` levels.
    async fn links_to_owned_value(&self, activity: &Object, max_depth: i32) -> FederationResult<bool> {
        let mut visited: HashSet<Url> = HashSet::new();
        let mut queue: VecDeque<(Object, i32)> = VecDeque::from([(activity.clone(), 0)]);

        while let Some((value, depth)) = queue.pop_front() {
            let linked: Vec<Reference> = LINKING_PROPERTIES
                .iter()
                .flat_map(|property| value.references(property))
                .collect();
            for reference in &linked {
                if let Some(id) = reference.id() {
                    if self.owns(&id).await? {
                        return Ok(true);
                    }
                }
            }

            if !within_depth(max_depth, depth + 1) {
                continue;
            }
            for reference in linked {
                match reference {
                    Reference::Embedded(inner) => queue.push_back((inner, depth + 1)),
                    Reference::Iri(iri) => {
                        if !visited.insert(iri.clone()) {
                            continue;
                        }
                        match self.transport.dereference(&iri).await {
                            Ok(inner) => queue.push_back((inner, depth + 1)),
                            Err(e) => debug!(%iri, error = %e, "cannot follow link"),
                        }
                    }
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::Database;
    use crate::federator::Settings;
    use crate::processor::tests::{Fixture, fixture, iri, object, seed_actor};

    const ALICE: &str = "https://hearth.example/users/alice";
    const BOB: &str = "https://remote.example/users/bob";

    async fn alice_followed_by_bob(fx: &Fixture) {
        let alice = seed_actor(&fx.db, ALICE).await;
        seed_actor(&fx.db, BOB).await;
        let mut followers = fx.db.followers(&alice).await.unwrap();
        followers.prepend_iri("orderedItems", &iri(BOB));
        fx.db.update(&followers).await.unwrap();
        fx.db
            .create(&object(json!({
                "id": "https://hearth.example/objects/n1",
                "type": "Note",
                "attributedTo": ALICE
            })))
            .await
            .unwrap();
    }

    fn reply(in_reply_to: &str) -> Object {
        object(json!({
            "id": "https://third.example/activities/c1",
            "type": "Create",
            "actor": "https://third.example/users/carol",
            "cc": format!("{ALICE}/followers"),
            "object": {
                "id": "https://third.example/notes/1",
                "type": "Note",
                "inReplyTo": in_reply_to
            }
        }))
    }

    #[tokio::test]
    async fn test_reply_to_local_note_reaches_followers() {
        let fx = fixture(Settings::default());
        alice_followed_by_bob(&fx).await;

        fx.federator
            .forward(&iri(&format!("{ALICE}/inbox")), &reply("https://hearth.example/objects/n1"))
            .await
            .unwrap();

        assert_eq!(fx.transport.delivered_to(), vec![iri(&format!("{BOB}/inbox"))]);
        assert!(
            fx.db
                .exists(&iri("https://third.example/activities/c1"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_unrelated_activity_is_not_forwarded() {
        let fx = fixture(Settings::default());
        alice_followed_by_bob(&fx).await;

        fx.federator
            .forward(&iri(&format!("{ALICE}/inbox")), &reply("https://fourth.example/notes/9"))
            .await
            .unwrap();

        assert!(fx.transport.delivered_to().is_empty());
    }

    #[tokio::test]
    async fn test_forwarding_happens_once() {
        let fx = fixture(Settings::default());
        alice_followed_by_bob(&fx).await;
        let activity = reply("https://hearth.example/objects/n1");
        let inbox = iri(&format!("{ALICE}/inbox"));

        fx.federator.forward(&inbox, &activity).await.unwrap();
        fx.federator.forward(&inbox, &activity).await.unwrap();

        assert_eq!(fx.transport.delivered_to().len(), 1);
    }

    #[tokio::test]
    async fn test_depth_bound_limits_link_search() {
        let fx = fixture(Settings {
            max_forwarding_depth: 1,
            ..Settings::default()
        });
        alice_followed_by_bob(&fx).await;
        // The local note is two links away: activity -> object -> inReplyTo.
        fx.transport.serve(json!({
            "id": "https://third.example/notes/1",
            "type": "Note",
            "inReplyTo": "https://hearth.example/objects/n1"
        }));
        let activity = object(json!({
            "id": "https://third.example/activities/c1",
            "type": "Create",
            "cc": format!("{ALICE}/followers"),
            "object": "https://third.example/notes/1"
        }));

        fx.federator
            .forward(&iri(&format!("{ALICE}/inbox")), &activity)
            .await
            .unwrap();

        assert!(fx.transport.delivered_to().is_empty());
    }
}
