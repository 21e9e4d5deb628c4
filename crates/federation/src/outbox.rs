//! Outbox pipeline: wrap, assign ids, dispatch, persist, deliver.

use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::auth::InboundRequest;
use crate::collection::{CollectionRequest, CollectionStyle, PagedCollection};
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::inbox::parse_document;
use crate::paging::PageQuery;
use crate::processor::Dispatched;
use crate::vocab::{ADDRESSING_PROPERTIES, AS_CONTEXT, ActivityKind, Object, Reference};

impl Federator {
    /// Publish the value in a client's POST to `outbox`. Returns the stored activity.
    ///
    /// A request authenticated as anyone but the outbox owner is `Forbidden`.
    pub async fn post_outbox(
        &self,
        outbox: &Url,
        request: InboundRequest<'_>,
    ) -> FederationResult<Object> {
        let authenticated = self.authenticator.authenticate(request).await?;
        if let Some(actor) = authenticated.actor {
            let owner = self.actor_for_outbox(outbox).await?;
            if actor != owner {
                info!(%actor, %owner, "refusing outbox POST from another actor");
                return Err(FederationError::Forbidden(format!(
                    "{actor} may not post to the outbox of {owner}"
                )));
            }
        }
        let value = parse_document(request.body)?;
        self.send(outbox, value).await
    }

    /// Publish `value` from `outbox` as its owner would through a POST.
    ///
    /// Values that are not activities are wrapped in a Create. Delivery
    /// failures are logged; the activity stays published.
    pub async fn send(&self, outbox: &Url, value: Object) -> FederationResult<Object> {
        let owner = self.actor_for_outbox(outbox).await?;
        let activity = if value.is_activity() {
            value
        } else {
            wrap_in_create(&owner, value)
        };
        let activity = self.add_new_ids(activity).await?;

        let Dispatched {
            activity,
            deliverable,
        } = self.dispatch_social(outbox, activity).await?;
        self.add_to_outbox(outbox, &activity).await?;

        let id = activity.require_id()?;
        info!(
            activity_type = activity.kind().unwrap_or_default(),
            actor = %owner,
            %id,
            "Published activity"
        );

        if self.settings.enabled && deliverable {
            if let Err(e) = self.deliver(outbox, &activity).await {
                warn!(%id, error = %e, "Delivery of published activity failed");
            }
        }
        Ok(activity)
    }

    /// Store `activity` and prepend it to `outbox`.
    pub(crate) async fn add_to_outbox(&self, outbox: &Url, activity: &Object) -> FederationResult<()> {
        let id = activity.require_id()?;
        {
            let _lock = self.lock(&id).await?;
            self.db.create(activity).await?;
        }

        let _lock = self.lock(outbox).await?;
        let mut collection = self.db.get_outbox(outbox).await?;
        collection.prepend_iri("orderedItems", &id);
        self.db.set_outbox(&collection).await
    }

    /// Fresh ids for the activity and, for a Create, its embedded objects.
    async fn add_new_ids(&self, mut activity: Object) -> FederationResult<Object> {
        let id = self.db.new_id(&activity).await?;
        activity.set_id(&id);

        if activity.activity_kind() == ActivityKind::Create {
            let mut objects = activity.references("object");
            for object in &mut objects {
                if let Reference::Embedded(inner) = object {
                    let id = self.db.new_id(inner).await?;
                    inner.set_id(&id);
                }
            }
            activity.set_references("object", objects);
        }
        Ok(activity)
    }

    /// The outbox as a root or page.
    pub async fn get_outbox(&self, outbox: &Url, query: &PageQuery) -> FederationResult<PagedCollection> {
        self.actor_for_outbox(outbox).await?;
        let page = query.to_page(self.pager.limits())?;
        let items = {
            let _lock = self.lock(outbox).await?;
            self.db.get_outbox(outbox).await?.items()
        };
        let request = CollectionRequest {
            id: outbox.clone(),
            extra_params: Vec::new(),
            style: CollectionStyle::Ordered,
            page,
            dedupe: false,
        };
        Ok(self.pager.render(&request, &items))
    }
}

/// A Create by `actor` carrying `object` and copying its addressing and `published`.
pub fn wrap_in_create(actor: &Url, object: Object) -> Object {
    let mut create = Object::new();
    create.set("@context", json!(AS_CONTEXT));
    create.set_kind("Create");
    create.set_references("actor", vec![Reference::Iri(actor.clone())]);
    for property in ADDRESSING_PROPERTIES.iter().chain(&["published"]) {
        if let Some(value) = object.get(property) {
            create.set(property, value.clone());
        }
    }
    create.set_references("object", vec![Reference::Embedded(object)]);
    create
}
