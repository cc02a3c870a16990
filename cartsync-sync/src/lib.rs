//! # cartsync-sync
//!
//! Sync orchestration: list → fetch each record → filter → import.
//!
//! [`SyncOrchestrator`] owns the single-flight state machine,
//! [`StatusAggregator`] composes the readiness view, and [`Coordinator`]
//! bundles both behind the control surface used by the daemon.

pub mod control;
pub mod orchestrator;
pub mod progress;
pub mod retailer;
pub mod status;

pub use control::Coordinator;
pub use orchestrator::{SyncOrchestrator, SyncState, IMPORT_PATH};
pub use progress::{ObserverMessage, ProgressPublisher};
pub use retailer::{ChannelRetailer, RetailerApi};
pub use status::StatusAggregator;
