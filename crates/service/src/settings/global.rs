use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::document::PreferenceDocument;
use crate::errors::StorageError;
use crate::settings::coalesce::WriteCoalescer;
use crate::storage::StorageBackend;

/// Application-wide settings kept as one JSON object in memory and
/// persisted to `settings.json` through a coalescing writer.
pub struct GlobalSettings {
    values: Arc<RwLock<Map<String, Value>>>,
    writer: WriteCoalescer<Map<String, Value>>,
}

impl GlobalSettings {
    pub const DOCUMENT: &'static str = "settings.json";

    /// Load the stored settings. A missing or unparsable document starts
    /// from an empty object.
    pub async fn load(backend: Arc<dyn StorageBackend>) -> Result<Self, StorageError> {
        let document = PreferenceDocument::new(backend, [Self::DOCUMENT])?;
        let values = match document.read_json::<Map<String, Value>>().await {
            Ok(values) => values,
            Err(e) if e.is_not_found() => {
                info!(name = %document.name(), "no stored settings; using defaults");
                Map::new()
            }
            Err(StorageError::Serialization(e)) => {
                warn!(name = %document.name(), error = %e, "stored settings are not a JSON object; ignoring");
                Map::new()
            }
            Err(e) => return Err(e),
        };
        let values = Arc::new(RwLock::new(values));
        let writer = WriteCoalescer::new(Arc::clone(&values), document);
        Ok(Self { values, writer })
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value).ok()
    }

    /// Update one setting and queue a save. Returns whether a new write was
    /// queued (`false` when an already queued write will pick this up).
    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<bool, StorageError> {
        let value = serde_json::to_value(value)?;
        self.values.write().await.insert(key.into(), value);
        Ok(self.writer.schedule())
    }

    pub async fn remove(&self, key: &str) -> bool {
        let existed = self.values.write().await.remove(key).is_some();
        if existed {
            self.writer.schedule();
        }
        existed
    }

    pub async fn snapshot(&self) -> Map<String, Value> {
        self.values.read().await.clone()
    }

    pub async fn flush(&self) {
        self.writer.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryBackend;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn rapid_sets_collapse_into_one_write_with_latest_state() -> Result<(), anyhow::Error> {
        let backend = Arc::new(MemoryBackend::default());
        let settings = GlobalSettings::load(backend.clone()).await?;

        assert!(settings.set("zoom", 1).await?);
        assert!(!settings.set("zoom", 2).await?);
        assert!(!settings.set("theme", "dark").await?);

        settings.flush().await;
        assert_eq!(backend.writes(), 1);
        let stored: Value = serde_json::from_str(&backend.get(GlobalSettings::DOCUMENT).await.unwrap())?;
        assert_eq!(stored, json!({"zoom": 2, "theme": "dark"}));
        Ok(())
    }

    #[tokio::test]
    async fn change_during_write_queues_a_follow_up() -> Result<(), anyhow::Error> {
        let backend = Arc::new(MemoryBackend::with_write_delay(Duration::from_millis(40)));
        let settings = GlobalSettings::load(backend.clone()).await?;

        settings.set("a", 1).await?;
        // Let the first write start; its flag is cleared before it serializes.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(settings.set("b", 2).await?, "a second write must be queued once the first is running");

        settings.flush().await;
        assert_eq!(backend.writes(), 2);
        let stored: Value = serde_json::from_str(&backend.get(GlobalSettings::DOCUMENT).await.unwrap())?;
        assert_eq!(stored, json!({"a": 1, "b": 2}));
        Ok(())
    }

    #[tokio::test]
    async fn load_reads_existing_document() -> Result<(), anyhow::Error> {
        let backend = Arc::new(MemoryBackend::default());
        backend.put(GlobalSettings::DOCUMENT, r#"{"spellcheck":false}"#).await;

        let settings = GlobalSettings::load(backend.clone()).await?;
        assert_eq!(settings.get_as::<bool>("spellcheck").await, Some(false));
        assert_eq!(settings.get("missing").await, None);
        assert_eq!(backend.reads(), 1, "load reads the document once; lookups stay in memory");
        assert_eq!(backend.writes(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn garbage_document_starts_empty() -> Result<(), anyhow::Error> {
        let backend = Arc::new(MemoryBackend::default());
        backend.put(GlobalSettings::DOCUMENT, "[1, 2").await;

        let settings = GlobalSettings::load(backend).await?;
        assert!(settings.snapshot().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn remove_persists_only_when_something_changed() -> Result<(), anyhow::Error> {
        let backend = Arc::new(MemoryBackend::default());
        backend.put(GlobalSettings::DOCUMENT, r#"{"k":1}"#).await;
        let settings = GlobalSettings::load(backend.clone()).await?;

        assert!(!settings.remove("other").await);
        settings.flush().await;
        assert_eq!(backend.writes(), 0);

        assert!(settings.remove("k").await);
        settings.flush().await;
        assert_eq!(backend.writes(), 1);
        assert_eq!(backend.get(GlobalSettings::DOCUMENT).await.as_deref(), Some("{}"));
        Ok(())
    }
}
