//! Federation engine for hearth.
//!
//! Implements the server-to-server half of `ActivityPub`:
//!
//! - **Inbox**: authenticate, authorize, deduplicate and dispatch remote
//!   activities, then forward them on when a local collection is addressed
//! - **Outbox**: assign ids, apply local side effects and deliver
//! - **Dispatch**: closed per-type side-effect tables for both directions
//! - **Delivery**: recipient resolution through nested collections with a
//!   depth bound, and concurrent fan-out with aggregated failures
//! - **Collections**: cursor paging of inboxes, outboxes and reply threads
//!
//! Storage, outbound HTTP and the clock are collaborators behind the
//! [`Database`], [`Transport`] and [`Clock`] traits. Application policy plugs
//! in through [`FederationHooks`] and [`Authenticator`].

pub mod auth;
pub mod cache;
pub mod clock;
pub mod collection;
pub mod database;
pub mod delivery;
pub mod error;
pub mod federator;
mod forwarding;
pub mod handler;
pub mod hooks;
mod inbox;
mod outbox;
pub mod paging;
mod processor;
pub mod replies;
pub mod signature;
pub mod transport;
pub mod vocab;

pub use auth::{AllowAll, Authenticated, Authenticator, HttpSignatureAuthenticator, InboundRequest};
pub use cache::{CacheStats, Scheduler, Sweep, TtlCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use collection::{CollectionPage, CollectionPager, CollectionRoot, CollectionStyle, PagedCollection};
pub use database::{Database, LockHandle, MemoryStore, SqlStore, StoreDatabase};
pub use delivery::batch_deliver;
pub use error::{DeliveryFailure, FederationError, FederationResult};
pub use federator::{Federator, Settings};
pub use handler::{FederationState, router};
pub use hooks::{BlocklistHooks, DefaultHooks, FederationHooks, Side};
pub use outbox::wrap_in_create;
pub use paging::{Page, PageLimits, PageQuery};
pub use signature::{HttpSigner, SignatureComponents, SignatureError};
pub use transport::{HttpTransport, Transport};
pub use vocab::{ActivityKind, Object, Reference, Tombstone};
