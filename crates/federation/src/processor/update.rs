use tracing::debug;

use super::{check_origin, require_objects};
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::vocab::{Object, Reference};

impl Federator {
    /// Merge each embedded object over its stored form. Returns the stored results.
    ///
    /// Top-level fields of the new form replace stored ones; fields set to
    /// JSON null are removed.
    pub(crate) async fn apply_update(&self, activity: &Object) -> FederationResult<Vec<Object>> {
        let objects = require_objects(activity)?;
        check_origin(activity, &objects)?;

        let mut merged = Vec::with_capacity(objects.len());
        for reference in objects {
            let Reference::Embedded(patch) = reference else {
                return Err(FederationError::BadRequest(
                    "Update must carry the whole object".to_string(),
                ));
            };
            let id = patch.require_id()?;

            let _lock = self.lock(&id).await?;
            let current = match self.db.get(&id).await {
                Ok(current) => current,
                Err(e) if e.is_not_found() => Object::new(),
                Err(e) => return Err(e),
            };
            if current.is_tombstone() {
                return Err(FederationError::Gone(id.to_string()));
            }

            let updated = overlay(current, &patch);
            self.db.update(&updated).await?;
            debug!(%id, "object updated");
            merged.push(updated);
        }
        Ok(merged)
    }

    /// Apply a local Update; the activity then carries the merged objects.
    pub(crate) async fn social_update(&self, mut activity: Object) -> FederationResult<Object> {
        let merged = self.apply_update(&activity).await?;
        activity.set_references("object", merged.into_iter().map(Reference::Embedded).collect());
        Ok(activity)
    }
}

fn overlay(mut current: Object, patch: &Object) -> Object {
    for (key, value) in patch.as_map() {
        if value.is_null() {
            current.remove(key);
        } else {
            current.set(key, value.clone());
        }
    }
    current
}
