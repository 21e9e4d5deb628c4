//! The engine value shared by handlers and the host application.

use std::sync::Arc;

use hearth_common::{FederationConfig, OnFollow};
use url::Url;

use crate::auth::{AllowAll, Authenticator};
use crate::clock::{Clock, SystemClock};
use crate::collection::CollectionPager;
use crate::database::{Database, LockHandle};
use crate::error::FederationResult;
use crate::hooks::{DefaultHooks, FederationHooks};
use crate::paging::PageLimits;
use crate::transport::Transport;
use crate::vocab::Object;

/// Engine behaviour switches.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Whether outgoing activities are delivered at all.
    pub enabled: bool,
    /// Collection nesting followed while resolving inboxes. `<= 0` is unbounded.
    pub max_delivery_depth: i32,
    /// Nesting followed while looking for locally owned values to forward on. `<= 0` is unbounded.
    pub max_forwarding_depth: i32,
    /// Automatic reply to Follows of local actors.
    pub on_follow: OnFollow,
    /// Page size bounds for served collections.
    pub limits: PageLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&FederationConfig::default())
    }
}

impl From<&FederationConfig> for Settings {
    fn from(config: &FederationConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_delivery_depth: config.max_delivery_depth,
            max_forwarding_depth: config.max_forwarding_depth,
            on_follow: config.on_follow,
            limits: PageLimits {
                default: config.default_page_limit,
                min: config.min_page_limit,
                max: config.max_page_limit,
            },
        }
    }
}

/// Whether recursion may continue at `depth` under `max` (`<= 0` means no bound).
pub(crate) const fn within_depth(max: i32, depth: i32) -> bool {
    max <= 0 || depth < max
}

/// Inbox and outbox pipelines, side-effect dispatch and delivery over the
/// collaborators of one server.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct Federator {
    pub(crate) db: Arc<dyn Database>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) hooks: Arc<dyn FederationHooks>,
    pub(crate) authenticator: Arc<dyn Authenticator>,
    pub(crate) settings: Settings,
    pub(crate) pager: CollectionPager,
}

impl Federator {
    /// Engine with default settings, wall clock, default hooks and no request authentication.
    pub fn new(db: Arc<dyn Database>, transport: Arc<dyn Transport>) -> Self {
        let settings = Settings::default();
        Self {
            db,
            transport,
            clock: Arc::new(SystemClock),
            hooks: Arc::new(DefaultHooks),
            authenticator: Arc::new(AllowAll),
            pager: CollectionPager::new(settings.limits),
            settings,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.pager = CollectionPager::new(settings.limits);
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn FederationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// The storage collaborator.
    #[must_use]
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A stored value as served to remote parties, tombstones included.
    pub async fn get_object(&self, iri: &Url) -> FederationResult<Object> {
        let _lock = self.lock(iri).await?;
        self.db.get(iri).await
    }

    pub(crate) async fn lock(&self, id: &Url) -> FederationResult<LockHandle> {
        self.db.lock(id).await
    }

    pub(crate) async fn actor_for_inbox(&self, inbox: &Url) -> FederationResult<Url> {
        let _lock = self.lock(inbox).await?;
        self.db.actor_for_inbox(inbox).await
    }

    pub(crate) async fn actor_for_outbox(&self, outbox: &Url) -> FederationResult<Url> {
        let _lock = self.lock(outbox).await?;
        self.db.actor_for_outbox(outbox).await
    }

    pub(crate) async fn owns(&self, id: &Url) -> FederationResult<bool> {
        let _lock = self.lock(id).await?;
        self.db.owns(id).await
    }
}
