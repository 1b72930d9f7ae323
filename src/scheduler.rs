//! Scan Scheduler
//!
//! Decouples a fast background device-query loop from a wall-clock aligned
//! output loop.
//!
//! # Architecture
//!
//! ```text
//! DeviceClient ─▶ FetchLoop ─▶ ScanStore ─▶ AlignedLoop ─▶ Reporter
//!                (internal      (one slot,   (sample
//!                 interval)      take once)   interval)
//! ```
//!
//! - [`ScanStore`]: mutex-guarded single slot; newest scan wins
//! - [`FetchLoop`]: drift-free periodic queries, failures logged and absorbed
//! - [`Aligner`]: classifies each scan against its target time
//! - [`AlignedLoop`]: sleeps to each target, emits at most one record per interval
//! - [`Lifecycle`]: shared cancellation token and completion barrier
//! - [`Poller`]: builds and starts all of the above for one device

mod aligned;
mod aligner;
mod error;
mod fetch;
mod lifecycle;
mod params;
mod poller;
mod store;

pub use aligned::AlignedLoop;
pub use aligner::{Action, Aligner, Classification, Emission, Gap, Tick, classify, round_to};
pub use error::SchedulerError;
pub use fetch::FetchLoop;
pub use lifecycle::{DEFAULT_SHUTDOWN_TIMEOUT, Lifecycle};
pub use params::PollingParams;
pub use poller::Poller;
pub use store::{Scan, ScanStore};
