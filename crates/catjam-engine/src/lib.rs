//! Overlay synchronization engine.
//!
//! Everything here is synchronous and host-agnostic: the page is reached
//! through the capability traits in [`host`], and the caller owns a
//! [`context::SyncContext`] that it threads through the [`scheduler`] ticks.

pub mod context;
pub mod host;
pub mod locator;
pub mod memory;
pub mod overlay;
pub mod playback;
pub mod pulse;
pub mod scheduler;
pub mod track;

pub use context::{EngineOptions, EngineStatus, SyncContext};
pub use host::{Host, HostError, HostEvent, NodeId};
