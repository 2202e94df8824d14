//! Settings objects built on preference documents.
//!
//! Both keep their state in memory and persist it through a
//! `WriteCoalescer`, so bursts of changes cost one queued write.

pub mod coalesce;
pub mod global;
pub mod window;

pub use coalesce::WriteCoalescer;
pub use global::GlobalSettings;
pub use window::{WindowGeometry, WindowStateStore};
