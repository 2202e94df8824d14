//! Proxy side of the preference channel: correlation of requests with
//! replies and the `StorageBackend` that forwards over the channel.

pub mod backend;
pub mod correlation;

pub use backend::ProxyStorageBackend;
pub use correlation::CorrelationTable;
