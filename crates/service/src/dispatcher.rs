//! Host side of the preference channel.
//!
//! Answers every proxied request with exactly one reply tagged with the
//! request id. Unknown operations and invalid names are refused before any
//! filesystem access.

use std::sync::Arc;

use models::message::{Operation, ProxyRequest, ProxyResponse};
use models::name::PreferenceName;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::StorageError;
use crate::observability::{DISPATCHED_TOTAL, DISPATCH_ERRORS_TOTAL};
use crate::storage::StorageBackend;

#[derive(Clone)]
pub struct RequestDispatcher {
    storage: Arc<dyn StorageBackend>,
}

impl RequestDispatcher {
    /// `storage` is normally a `LocalStorageBackend`.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        let ProxyRequest { id, operation, name, content } = request;
        DISPATCHED_TOTAL.with_label_values(&[label(&operation)]).inc();
        debug!(id = %id, op = %operation, name = %name, "dispatching request");

        let response = match operation {
            Operation::Read => match self.read(&name).await {
                Ok(text) => ProxyResponse::read(id, text),
                Err(e) => ProxyResponse::error(id, e.reason()),
            },
            Operation::Write => match self.write(&name, content).await {
                Ok(()) => ProxyResponse::written(id),
                Err(e) => ProxyResponse::error(id, e.reason()),
            },
            other => ProxyResponse::invalid_request(id, &other),
        };

        if response.operation == Operation::Error {
            DISPATCH_ERRORS_TOTAL.inc();
            debug!(id = %response.id, reason = ?response.content, "request failed");
        }
        response
    }

    async fn read(&self, name: &str) -> Result<String, StorageError> {
        let name = PreferenceName::parse(name)?;
        self.storage.read(&name).await
    }

    async fn write(&self, name: &str, content: Option<String>) -> Result<(), StorageError> {
        let name = PreferenceName::parse(name)?;
        let content = content.ok_or_else(|| StorageError::Protocol("write request without content".into()))?;
        self.storage.write(&name, &content).await
    }

    /// Answer requests from `inbound` until it closes. Requests run
    /// concurrently, so replies may leave in a different order.
    pub async fn serve(self, mut inbound: mpsc::Receiver<ProxyRequest>, outbound: mpsc::Sender<ProxyResponse>) {
        while let Some(request) = inbound.recv().await {
            let dispatcher = self.clone();
            let outbound = outbound.clone();
            tokio::spawn(async move {
                let response = dispatcher.handle(request).await;
                if outbound.send(response).await.is_err() {
                    warn!("reply channel closed; reply discarded");
                }
            });
        }
        info!("request channel closed; dispatcher stopped");
    }
}

fn label(op: &Operation) -> &'static str {
    match op {
        Operation::Read => "read",
        Operation::Write => "write",
        Operation::Error => "error",
        Operation::Other(_) => "other",
    }
}
