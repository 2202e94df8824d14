#![cfg(test)]
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use models::name::PreferenceName;
use tokio::sync::Mutex;

use crate::errors::StorageError;
use crate::storage::StorageBackend;

/// In-memory backend that records how often each operation ran.
#[derive(Default)]
pub struct MemoryBackend {
    docs: Mutex<HashMap<String, String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    write_delay: Option<Duration>,
}

impl MemoryBackend {
    pub fn with_write_delay(delay: Duration) -> Self {
        Self { write_delay: Some(delay), ..Self::default() }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.docs.lock().await.get(name).cloned()
    }

    pub async fn put(&self, name: &str, content: &str) {
        self.docs.lock().await.insert(name.to_string(), content.to_string());
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, name: &PreferenceName) -> Result<String, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.docs
            .lock()
            .await
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn write(&self, name: &PreferenceName, content: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.docs.lock().await.insert(name.to_string(), content.to_string());
        Ok(())
    }
}
