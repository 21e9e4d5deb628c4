use url::Url;

use super::collection::{ActorCollection, prepend_if_absent};
use super::{reference_id, require_objects};
use crate::error::FederationResult;
use crate::federator::Federator;
use crate::vocab::Object;

/// Reactions recorded on the reacted-to object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reaction {
    Like,
    Announce,
}

impl Reaction {
    const fn property(self) -> &'static str {
        match self {
            Self::Like => "likes",
            Self::Announce => "shares",
        }
    }
}

impl Federator {
    /// Prepend the activity id to `likes` or `shares` of each locally owned object.
    pub(crate) async fn record_reaction(
        &self,
        activity: &Object,
        reaction: Reaction,
    ) -> FederationResult<()> {
        let objects = require_objects(activity)?;
        let id = activity.require_id()?;
        let property = reaction.property();

        for reference in &objects {
            let target = reference_id(reference)?;
            if self.owns(&target).await? {
                self.prepend_to_value_collection(&target, property, &id, "OrderedCollection")
                    .await?;
            }
        }
        Ok(())
    }

    /// Prepend every liked object to the liking actor's `liked` collection.
    pub(crate) async fn social_like(&self, outbox: &Url, like: &Object) -> FederationResult<()> {
        let liked: Vec<Url> = require_objects(like)?
            .iter()
            .map(reference_id)
            .collect::<FederationResult<_>>()?;
        let actor = self.actor_for_outbox(outbox).await?;

        self.edit_actor_collection(&actor, ActorCollection::Liked, |collection| {
            for object in liked.iter().rev() {
                prepend_if_absent(collection, object);
            }
        })
        .await
    }
}
