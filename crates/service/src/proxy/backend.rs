use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use models::message::{Operation, ProxyRequest, ProxyResponse};
use models::name::PreferenceName;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::StorageError;
use crate::observability::{DROPPED_RESPONSES_TOTAL, PROXIED_TOTAL};
use crate::proxy::correlation::{Completion, CorrelationTable};
use crate::storage::StorageBackend;

/// Storage backend for processes without filesystem access.
///
/// Each call becomes a `ProxyRequest` on the outbound channel; a listener
/// task routes replies from the inbound channel to the waiting caller by
/// correlation id. Replies may arrive in any order.
pub struct ProxyStorageBackend {
    table: Arc<CorrelationTable>,
    outbound: mpsc::Sender<ProxyRequest>,
    timeout: Option<Duration>,
    listener: JoinHandle<()>,
}

impl ProxyStorageBackend {
    /// Start the reply listener and return the backend.
    ///
    /// With `timeout = None` a request whose reply never arrives stays
    /// pending forever.
    pub fn spawn(
        identity: impl Into<String>,
        outbound: mpsc::Sender<ProxyRequest>,
        inbound: mpsc::Receiver<ProxyResponse>,
        timeout: Option<Duration>,
    ) -> Self {
        let table = Arc::new(CorrelationTable::new(identity));
        let listener = tokio::spawn(listen(Arc::clone(&table), inbound));
        info!(identity = %table.identity(), ?timeout, "proxy storage backend started");
        Self { table, outbound, timeout, listener }
    }

    /// Number of requests still waiting for a reply.
    pub fn pending(&self) -> usize {
        self.table.len()
    }

    pub fn identity(&self) -> &str {
        self.table.identity()
    }

    /// Route one reply; replies for unknown or consumed ids are dropped.
    pub fn handle_response(&self, response: ProxyResponse) {
        route_response(&self.table, response);
    }

    async fn round_trip(&self, build: impl FnOnce(String) -> ProxyRequest) -> Completion {
        let (id, rx) = self.table.register()?;
        let request = build(id.clone());
        debug!(id = %id, op = %request.operation, name = %request.name, "sending request");

        if self.outbound.send(request).await.is_err() {
            self.table.cancel(&id);
            return Err(StorageError::ChannelClosed);
        }
        PROXIED_TOTAL.inc();

        let reply = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.table.cancel(&id);
                    warn!(id = %id, ?limit, "request timed out");
                    return Err(StorageError::Timeout(id));
                }
            },
            None => rx.await,
        };
        reply.map_err(|_| StorageError::ChannelClosed)?
    }
}

#[async_trait]
impl StorageBackend for ProxyStorageBackend {
    async fn read(&self, name: &PreferenceName) -> Result<String, StorageError> {
        let name = name.as_str().to_string();
        match self.round_trip(|id| ProxyRequest::read(id, name)).await? {
            Some(content) => Ok(content),
            None => Err(StorageError::Protocol("read answered without content".into())),
        }
    }

    async fn write(&self, name: &PreferenceName, content: &str) -> Result<(), StorageError> {
        let name = name.as_str().to_string();
        let content = content.to_string();
        self.round_trip(|id| ProxyRequest::write(id, name, content)).await?;
        Ok(())
    }
}

impl Drop for ProxyStorageBackend {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

fn route_response(table: &CorrelationTable, response: ProxyResponse) {
    let ProxyResponse { id, operation, content } = response;
    let outcome: Completion = match operation {
        Operation::Read => match content {
            Some(text) => Ok(Some(text)),
            None => Err(StorageError::Protocol("read reply without content".into())),
        },
        Operation::Write => Ok(None),
        Operation::Error => Err(StorageError::from_reason(
            content.unwrap_or_else(|| "unknown error".to_string()),
        )),
        Operation::Other(tag) => Err(StorageError::Protocol(format!("unexpected reply operation: {tag}"))),
    };

    if table.complete(&id, outcome) {
        debug!(id = %id, "reply delivered");
    } else {
        DROPPED_RESPONSES_TOTAL.inc();
        warn!(id = %id, "no pending request for reply; dropped");
    }
}

async fn listen(table: Arc<CorrelationTable>, mut inbound: mpsc::Receiver<ProxyResponse>) {
    while let Some(response) = inbound.recv().await {
        route_response(&table, response);
    }
    let rejected = table.close();
    info!(identity = %table.identity(), rejected, "reply channel closed");
}
