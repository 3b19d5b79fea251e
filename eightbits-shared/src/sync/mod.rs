pub mod backfill;
pub mod bus;
pub mod index;
pub mod scroll;
pub mod session;
pub mod simulated;
pub mod timeline;

pub use backfill::{BackfillGate, BackfillState};
pub use bus::{ShardBus, SubscriptionId};
pub use index::{PostIndex, Reconciliation};
pub use scroll::{PostSurface, ScrollGeometry, follow_bottom, preserve_position, should_backfill};
pub use session::PostSync;
pub use simulated::SimulatedSurface;
pub use timeline::{MergeOutcome, PageOutcome, Timeline};
