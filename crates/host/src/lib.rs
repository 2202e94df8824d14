//! Privileged side of the preference channel: owns the storage root and
//! answers proxy requests arriving on a local socket.

pub mod bootstrap;
pub mod observability;

#[cfg(unix)]
pub use bootstrap::{run, HostServer};
