//! Shared types of the preference channel.
//! - `name`: validated, root-relative document addresses.
//! - `message`: request/response payloads and the envelope carried on the wire.

pub mod errors;
pub mod message;
pub mod name;

#[cfg(test)]
mod tests;
