use tracing::debug;

use super::{check_origin, reference_id, require_objects};
use crate::error::FederationResult;
use crate::federator::Federator;
use crate::vocab::{Object, Reference, Tombstone};

impl Federator {
    /// Replace every deleted object with a Tombstone. Returns the tombstones.
    pub(crate) async fn apply_delete(&self, activity: &Object) -> FederationResult<Vec<Object>> {
        let objects = require_objects(activity)?;
        check_origin(activity, &objects)?;

        let mut tombstones = Vec::with_capacity(objects.len());
        for reference in &objects {
            let id = reference_id(reference)?;

            let _lock = self.lock(&id).await?;
            let original = match self.db.get(&id).await {
                Ok(original) => Some(original),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            let tombstone =
                Tombstone::replacing(id.clone(), original.as_ref(), self.clock.now()).into_object()?;
            self.db.update(&tombstone).await?;
            debug!(%id, "object tombstoned");
            tombstones.push(tombstone);
        }
        Ok(tombstones)
    }

    /// Apply a local Delete; the activity then carries the tombstones.
    pub(crate) async fn social_delete(&self, mut activity: Object) -> FederationResult<Object> {
        let tombstones = self.apply_delete(&activity).await?;
        activity.set_references(
            "object",
            tombstones.into_iter().map(Reference::Embedded).collect(),
        );
        Ok(activity)
    }
}
