use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::document::PreferenceDocument;
use crate::errors::StorageError;
use crate::settings::coalesce::WriteCoalescer;
use crate::storage::StorageBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub maximized: bool,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self { x: 0, y: 0, width: 1024, height: 768, maximized: false }
    }
}

/// Window geometry read once at startup and saved on resize. A burst of
/// resize events results in a single queued write of the final geometry.
pub struct WindowStateStore {
    geometry: Arc<RwLock<WindowGeometry>>,
    writer: WriteCoalescer<WindowGeometry>,
}

impl WindowStateStore {
    pub const DOCUMENT: &'static str = "window-state.json";

    pub async fn load(backend: Arc<dyn StorageBackend>) -> Result<Self, StorageError> {
        let document = PreferenceDocument::new(backend, [Self::DOCUMENT])?;
        let geometry = match document.read_json::<WindowGeometry>().await {
            Ok(geometry) => geometry,
            Err(e) if e.is_not_found() => WindowGeometry::default(),
            Err(StorageError::Serialization(e)) => {
                warn!(error = %e, "stored window state unreadable; using defaults");
                WindowGeometry::default()
            }
            Err(e) => return Err(e),
        };
        let geometry = Arc::new(RwLock::new(geometry));
        let writer = WriteCoalescer::new(Arc::clone(&geometry), document);
        Ok(Self { geometry, writer })
    }

    pub async fn current(&self) -> WindowGeometry {
        *self.geometry.read().await
    }

    pub async fn record_resize(&self, geometry: WindowGeometry) -> bool {
        *self.geometry.write().await = geometry;
        self.writer.schedule()
    }

    pub async fn flush(&self) {
        self.writer.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryBackend;

    #[tokio::test]
    async fn missing_state_uses_defaults() -> Result<(), anyhow::Error> {
        let store = WindowStateStore::load(Arc::new(MemoryBackend::default())).await?;
        assert_eq!(store.current().await, WindowGeometry::default());
        Ok(())
    }

    #[tokio::test]
    async fn resize_burst_writes_final_geometry_once() -> Result<(), anyhow::Error> {
        let backend = Arc::new(MemoryBackend::default());
        let store = WindowStateStore::load(backend.clone()).await?;

        for width in [800u32, 900, 1000, 1280] {
            store.record_resize(WindowGeometry { width, ..WindowGeometry::default() }).await;
        }
        store.flush().await;

        assert_eq!(backend.writes(), 1);
        let saved: WindowGeometry =
            serde_json::from_str(&backend.get(WindowStateStore::DOCUMENT).await.unwrap())?;
        assert_eq!(saved.width, 1280);

        let reloaded = WindowStateStore::load(backend).await?;
        assert_eq!(reloaded.current().await.width, 1280);
        Ok(())
    }
}
