use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{DocumentContent, PreferenceDocument};
use crate::queue::SerializedWorkQueue;

/// Persists live state through a work queue, keeping at most one write
/// queued at a time.
///
/// The queued task serializes the state when it runs, not when it is
/// scheduled, so the latest state wins. The scheduled flag is cleared just
/// before the task serializes, letting a change made during the write queue
/// a follow-up.
pub struct WriteCoalescer<S> {
    state: Arc<RwLock<S>>,
    document: PreferenceDocument,
    queue: SerializedWorkQueue,
    scheduled: Arc<AtomicBool>,
}

impl<S> WriteCoalescer<S>
where
    S: Serialize + Send + Sync + 'static,
{
    pub fn new(state: Arc<RwLock<S>>, document: PreferenceDocument) -> Self {
        let queue = SerializedWorkQueue::new(document.name().to_string());
        Self { state, document, queue, scheduled: Arc::new(AtomicBool::new(false)) }
    }

    /// Queue a write of the current state. Returns `false` when a queued
    /// write already covers it.
    pub fn schedule(&self) -> bool {
        if self.scheduled.swap(true, Ordering::SeqCst) {
            debug!(name = %self.document.name(), "write already queued");
            return false;
        }
        let state = Arc::clone(&self.state);
        let document = self.document.clone();
        let scheduled = Arc::clone(&self.scheduled);
        self.queue.push(move || persist(state, document, scheduled));
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Wait until every queued write has run.
    pub async fn flush(&self) {
        self.queue.wait_idle().await;
    }
}

async fn persist<S: Serialize>(
    state: Arc<RwLock<S>>,
    document: PreferenceDocument,
    scheduled: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    scheduled.store(false, Ordering::SeqCst);
    let text = {
        let guard = state.read().await;
        serde_json::to_string(&*guard)?
    };
    document.write(DocumentContent::Text(text)).await?;
    debug!(name = %document.name(), "persisted state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryBackend;
    use std::time::Duration;

    #[tokio::test]
    async fn flag_is_held_until_the_write_starts() -> Result<(), anyhow::Error> {
        let backend = Arc::new(MemoryBackend::with_write_delay(Duration::from_millis(30)));
        let document = PreferenceDocument::new(backend.clone(), ["motd.json"])?;
        let state = Arc::new(RwLock::new(String::from("first")));
        let writer = WriteCoalescer::new(Arc::clone(&state), document.clone());

        assert!(!writer.is_scheduled());
        assert!(writer.schedule());
        assert!(writer.is_scheduled());
        assert!(!writer.schedule());
        *state.write().await = "second".to_string();

        writer.flush().await;
        assert!(!writer.is_scheduled());
        assert_eq!(backend.writes(), 1);

        // A string state is stored as JSON, so it reads back typed.
        let back: String = document.read_json().await?;
        assert_eq!(back, "second");
        Ok(())
    }
}
