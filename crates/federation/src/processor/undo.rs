use super::require_objects;
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::vocab::{Object, Reference};

impl Federator {
    /// Refuse an Undo unless its actors include every actor of each undone activity.
    ///
    /// Reversing the undone activity is left to the application hook.
    pub(crate) async fn check_undo(&self, undo: &Object) -> FederationResult<()> {
        let objects = require_objects(undo)?;
        let undoing = undo.iris("actor");

        for reference in objects {
            let undone = match reference {
                Reference::Embedded(undone) => undone,
                Reference::Iri(iri) => self.lookup(&iri).await?,
            };
            if let Some(actor) = undone
                .iris("actor")
                .into_iter()
                .find(|actor| !undoing.contains(actor))
            {
                return Err(FederationError::Forbidden(format!(
                    "{actor} did not take part in the Undo"
                )));
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
    use crate::federator::Settings;
    use crate::processor::tests::{fixture, object};

    fn undo(actor: &str, undone: serde_json::Value) -> Object {
        object(json!({
            "id": "https://remote.example/activities/u1",
            "type": "Undo",
            "actor": actor,
            "object": undone
        }))
    }

    #[tokio::test]
    async fn test_undo_by_original_actor_passes() {
        let fx = fixture(Settings::default());
        let activity = undo(
            "https://remote.example/users/bob",
            json!({
                "id": "https://remote.example/activities/b1",
                "type": "Block",
                "actor": "https://remote.example/users/bob",
                "object": "https://hearth.example/users/alice"
            }),
        );
        fx.federator.check_undo(&activity).await.unwrap();
    }

    #[tokio::test]
    async fn test_undo_by_other_actor_is_forbidden() {
        let fx = fixture(Settings::default());
        fx.transport.serve(json!({
            "id": "https://remote.example/activities/b1",
            "type": "Block",
            "actor": "https://remote.example/users/bob",
            "object": "https://hearth.example/users/alice"
        }));
        let activity = undo(
            "https://remote.example/users/mallory",
            json!("https://remote.example/activities/b1"),
        );
        let err = fx.federator.check_undo(&activity).await.unwrap_err();
        assert!(matches!(err, FederationError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_undo_requires_object() {
        let fx = fixture(Settings::default());
        let activity = object(json!({
            "id": "https://remote.example/activities/u1",
            "type": "Undo",
            "actor": "https://remote.example/users/bob"
        }));
        assert!(fx.federator.check_undo(&activity).await.unwrap_err().is_validation());
    }
}
