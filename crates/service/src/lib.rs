//! Preference persistence shared by the privileged host process and
//! unprivileged client processes.
//! - `storage`: the read/write contract and the direct filesystem backend.
//! - `proxy` / `dispatcher`: both ends of the request/response channel.
//! - `document`, `queue`, `settings`: what application code builds on.

pub mod errors;
pub mod observability;
pub mod storage;
pub mod proxy;
pub mod dispatcher;
pub mod transport;
pub mod document;
pub mod queue;
pub mod settings;
#[cfg(test)]
pub mod test_support;
