use hearth_common::OnFollow;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::collection::{ActorCollection, prepend_if_absent};
use super::require_objects;
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::vocab::{AS_CONTEXT, Object, Reference};

impl Federator {
    /// Answer a Follow of the inbox owner according to [`OnFollow`].
    pub(crate) async fn federated_follow(&self, inbox: &Url, follow: &Object) -> FederationResult<()> {
        let objects = require_objects(follow)?;
        let response_kind = match self.settings.on_follow {
            OnFollow::DoNothing => return Ok(()),
            OnFollow::AutomaticallyAccept => "Accept",
            OnFollow::AutomaticallyReject => "Reject",
        };

        let owner = self.actor_for_inbox(inbox).await?;
        if !objects.iter().any(|object| object.id().as_ref() == Some(&owner)) {
            debug!(%owner, "Follow does not target the inbox owner");
            return Ok(());
        }
        let followers = follow.iris("actor");
        if followers.is_empty() {
            return Err(FederationError::BadRequest("Follow has no actor".to_string()));
        }

        if response_kind == "Accept" {
            self.edit_actor_collection(&owner, ActorCollection::Followers, |collection| {
                for follower in &followers {
                    prepend_if_absent(collection, follower);
                }
            })
            .await?;
        }

        let mut response = Object::new();
        response.set("@context", json!(AS_CONTEXT));
        response.set_kind(response_kind);
        response.set_references("actor", vec![Reference::Iri(owner.clone())]);
        response.set_references("object", vec![Reference::Embedded(follow.clone())]);
        response.set_references("to", followers.into_iter().map(Reference::Iri).collect());
        let id = self.db.new_id(&response).await?;
        response.set_id(&id);

        let outbox = {
            let _lock = self.lock(inbox).await?;
            self.db.outbox_for_inbox(inbox).await?
        };
        self.add_to_outbox(&outbox, &response).await?;
        info!(%id, %owner, response = response_kind, "Answered Follow");

        if self.settings.enabled {
            if let Err(e) = self.deliver(&outbox, &response).await {
                warn!(%id, error = %e, "Follow response delivery failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::Database;
    use crate::federator::Settings;
    use crate::processor::tests::{fixture, iri, object, seed_actor};

    const ALICE: &str = "https://hearth.example/users/alice";
    const BOB: &str = "https://remote.example/users/bob";

    fn follow() -> Object {
        object(json!({
            "id": "https://remote.example/activities/f1",
            "type": "Follow",
            "actor": BOB,
            "object": ALICE
        }))
    }

    fn settings(on_follow: OnFollow) -> Settings {
        Settings {
            on_follow,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_follow_does_nothing_by_default() {
        let fx = fixture(Settings::default());
        let alice = seed_actor(&fx.db, ALICE).await;
        let inbox = iri(&format!("{ALICE}/inbox"));

        fx.federator.federated_follow(&inbox, &follow()).await.unwrap();

        assert!(fx.db.followers(&alice).await.unwrap().items().is_empty());
        assert!(fx.transport.delivered_to().is_empty());
    }

    #[tokio::test]
    async fn test_follow_auto_accept_records_follower_and_delivers() {
        let fx = fixture(settings(OnFollow::AutomaticallyAccept));
        let alice = seed_actor(&fx.db, ALICE).await;
        seed_actor(&fx.db, BOB).await;
        let inbox = iri(&format!("{ALICE}/inbox"));

        fx.federator.federated_follow(&inbox, &follow()).await.unwrap();

        let followers = fx.db.followers(&alice).await.unwrap();
        assert_eq!(followers.iris("orderedItems"), vec![iri(BOB)]);

        let outbox = fx.db.get_outbox(&iri(&format!("{ALICE}/outbox"))).await.unwrap();
        let accept_id = outbox.iris("orderedItems")[0].clone();
        let accept = fx.db.get(&accept_id).await.unwrap();
        assert_eq!(accept.get_str("type"), Some("Accept"));
        assert_eq!(accept.iris("actor"), vec![alice]);
        assert_eq!(accept.iris("to"), vec![iri(BOB)]);

        assert_eq!(fx.transport.delivered_to(), vec![iri(&format!("{BOB}/inbox"))]);
    }

    #[tokio::test]
    async fn test_follow_auto_reject_leaves_followers_alone() {
        let fx = fixture(settings(OnFollow::AutomaticallyReject));
        let alice = seed_actor(&fx.db, ALICE).await;
        seed_actor(&fx.db, BOB).await;
        let inbox = iri(&format!("{ALICE}/inbox"));

        fx.federator.federated_follow(&inbox, &follow()).await.unwrap();

        assert!(fx.db.followers(&alice).await.unwrap().items().is_empty());
        let (_, delivered) = fx.transport.delivered.lock().unwrap()[0].clone();
        assert_eq!(delivered["type"], "Reject");
        assert_eq!(delivered["object"][0]["id"], "https://remote.example/activities/f1");
    }

    #[tokio::test]
    async fn test_follow_of_someone_else_is_ignored() {
        let fx = fixture(settings(OnFollow::AutomaticallyAccept));
        let alice = seed_actor(&fx.db, ALICE).await;
        let inbox = iri(&format!("{ALICE}/inbox"));
        let mut other = follow();
        other.set("object", json!("https://hearth.example/users/carol"));

        fx.federator.federated_follow(&inbox, &other).await.unwrap();

        assert!(fx.db.followers(&alice).await.unwrap().items().is_empty());
    }
}
