//! Side effects per activity type.
//!
//! Two closed dispatch tables: the federating one for activities received in
//! an inbox, and the social one for activities posted to a local outbox.
//! Each built-in handler validates its required properties first, mutates
//! only while holding the lock of the value it mutates, and then hands the
//! activity to [`FederationHooks::on_activity`](crate::hooks::FederationHooks::on_activity).
//! Unrecognised types go straight to the default callback.

mod accept;
mod collection;
mod create;
mod delete;
mod follow;
mod reaction;
mod undo;
mod update;

use tracing::info;
use url::Url;

use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::hooks::Side;
use crate::vocab::{ActivityKind, Object, Reference};

pub(crate) use reaction::Reaction;

/// Result of the social dispatch table.
#[derive(Debug)]
pub(crate) struct Dispatched {
    /// The activity as it should be stored and delivered.
    pub activity: Object,
    /// Whether the activity may leave this server.
    pub deliverable: bool,
}

impl Federator {
    /// Apply the side effects of an activity received in `inbox`.
    pub(crate) async fn dispatch_federated(
        &self,
        inbox: &Url,
        activity: &Object,
    ) -> FederationResult<()> {
        let kind = activity.activity_kind();
        info!(
            activity_type = %kind,
            id = activity.get_str("id").unwrap_or_default(),
            %inbox,
            "Processing federated activity"
        );

        match &kind {
            ActivityKind::Create => self.federated_create(activity).await?,
            ActivityKind::Update => {
                self.apply_update(activity).await?;
            }
            ActivityKind::Delete => {
                self.apply_delete(activity).await?;
            }
            ActivityKind::Follow => self.federated_follow(inbox, activity).await?,
            ActivityKind::Accept => self.federated_accept(inbox, activity).await?,
            ActivityKind::Reject => {}
            ActivityKind::Add => self.add_to_targets(activity).await?,
            ActivityKind::Remove => self.remove_from_targets(activity).await?,
            ActivityKind::Like => self.record_reaction(activity, Reaction::Like).await?,
            ActivityKind::Announce => self.record_reaction(activity, Reaction::Announce).await?,
            ActivityKind::Undo => self.check_undo(activity).await?,
            ActivityKind::Block => {
                require_objects(activity)?;
            }
            ActivityKind::Other(_) => {
                return self.hooks.default_callback(Side::Federating, activity).await;
            }
        }

        self.hooks.on_activity(Side::Federating, &kind, activity).await
    }

    /// Apply the side effects of an activity posted to `outbox`.
    ///
    /// Ids must already be assigned. The returned activity may differ from the
    /// input: Update and Delete carry the stored result of their mutation.
    pub(crate) async fn dispatch_social(
        &self,
        outbox: &Url,
        activity: Object,
    ) -> FederationResult<Dispatched> {
        let kind = activity.activity_kind();
        info!(
            activity_type = %kind,
            id = activity.get_str("id").unwrap_or_default(),
            %outbox,
            "Processing outbox activity"
        );

        let mut deliverable = true;
        let activity = match &kind {
            ActivityKind::Create => self.social_create(activity).await?,
            ActivityKind::Update => self.social_update(activity).await?,
            ActivityKind::Delete => self.social_delete(activity).await?,
            ActivityKind::Follow => {
                require_objects(&activity)?;
                activity
            }
            ActivityKind::Add => {
                self.add_to_targets(&activity).await?;
                activity
            }
            ActivityKind::Remove => {
                self.remove_from_targets(&activity).await?;
                activity
            }
            ActivityKind::Like => {
                self.social_like(outbox, &activity).await?;
                activity
            }
            ActivityKind::Undo => {
                self.check_undo(&activity).await?;
                activity
            }
            ActivityKind::Block => {
                require_objects(&activity)?;
                deliverable = false;
                activity
            }
            ActivityKind::Accept
            | ActivityKind::Reject
            | ActivityKind::Announce
            | ActivityKind::Other(_) => {
                self.hooks.default_callback(Side::Social, &activity).await?;
                return Ok(Dispatched {
                    activity,
                    deliverable,
                });
            }
        };

        self.hooks.on_activity(Side::Social, &kind, &activity).await?;
        Ok(Dispatched {
            activity,
            deliverable,
        })
    }
}

/// The activity's `object` values, or `ObjectRequired`.
pub(crate) fn require_objects(activity: &Object) -> FederationResult<Vec<Reference>> {
    let objects = activity.references("object");
    if objects.is_empty() {
        return Err(FederationError::ObjectRequired);
    }
    Ok(objects)
}

/// The activity's `target` values, or `TargetRequired`.
pub(crate) fn require_targets(activity: &Object) -> FederationResult<Vec<Reference>> {
    let targets = activity.references("target");
    if targets.is_empty() {
        return Err(FederationError::TargetRequired);
    }
    Ok(targets)
}

/// Id of an object value, or `BadRequest`.
pub(crate) fn reference_id(reference: &Reference) -> FederationResult<Url> {
    reference
        .id()
        .ok_or_else(|| FederationError::BadRequest("object value has no id".to_string()))
}

/// Refuse activities whose id host differs from any object's id host.
pub(crate) fn check_origin(activity: &Object, objects: &[Reference]) -> FederationResult<()> {
    let id = activity.require_id()?;
    for object in objects {
        let object_id = reference_id(object)?;
        if object_id.host() != id.host() {
            return Err(FederationError::Forbidden(format!(
                "{id} may not act on {object_id}: origins differ"
            )));
        }
    }
    Ok(())
}
