//! Storage abstractions for the preference documents
//!
//! `StorageBackend` is the read/write contract shared by the direct
//! filesystem backend and the proxy backend.

pub mod bootstrap;
pub mod local;

use async_trait::async_trait;
use models::name::PreferenceName;

use crate::errors::StorageError;

/// Read/write of opaque document text addressed by name.
/// Implementations are the local filesystem backend and the channel proxy.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn read(&self, name: &PreferenceName) -> Result<String, StorageError>;
    async fn write(&self, name: &PreferenceName, content: &str) -> Result<(), StorageError>;
}
