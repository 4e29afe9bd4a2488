//! Livetable view cache.
//!
//! Keeps every open list view of a back-office collection consistent with
//! push events, without refetching:
//!
//! - **Page store**: cached paged results keyed by [`ViewKey`]
//! - **Reconciler**: folds each Upsert/Remove into every cached view
//! - **Debouncer**: coalesces bursts of changes into one version bump
//! - **Subscription adapter**: decodes push frames into typed events
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `livetable.toml`:
//!
//! ```toml
//! [cache]
//! debounce_ms = 100
//! max_views = 256
//! ```

mod config;
mod debounce;
mod events;
mod keys;
pub(crate) mod lock;
mod predicate;
mod reconciler;
mod store;
mod subscription;
mod view_cache;

pub use config::CacheConfig;
pub use debounce::ChangeDebouncer;
pub use events::{CacheEvent, Epoch, EventType, ViewEvent};
pub use keys::{ViewKey, hash_value};
pub use predicate::{FilterKind, MembershipPredicate, ResourceSchema};
pub use reconciler::{
    ReconcileError, ReconcileReport, Reconciler, ViewChange, ViewFailure, check_invariants,
    remove_from,
};
pub use store::PageStore;
pub use subscription::{DecodeError, Delivery, SubscriptionAdapter};
pub use view_cache::{FollowStats, LiveViewCache, ResyncReport, TransportFrame};
