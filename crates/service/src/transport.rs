//! Message channel plumbing
//!
//! Requests and replies travel as `mpsc` channels inside a process. Across
//! a process boundary the same channels are bridged onto a byte stream as
//! newline-delimited JSON envelopes tagged with the request or response
//! topic; frames on any other topic are skipped.

use std::time::Duration;

use models::message::{Envelope, ProxyRequest, ProxyResponse, REQUEST_TOPIC, RESPONSE_TOPIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::dispatcher::RequestDispatcher;
use crate::proxy::ProxyStorageBackend;

/// Ends held by the unprivileged process.
pub struct ClientChannel {
    pub requests: mpsc::Sender<ProxyRequest>,
    pub responses: mpsc::Receiver<ProxyResponse>,
}

/// Ends held by the privileged process.
pub struct HostChannel {
    pub requests: mpsc::Receiver<ProxyRequest>,
    pub responses: mpsc::Sender<ProxyResponse>,
}

/// Connected pair for wiring both sides inside one process.
pub fn in_memory(buffer: usize) -> (ClientChannel, HostChannel) {
    let (req_tx, req_rx) = mpsc::channel(buffer);
    let (resp_tx, resp_rx) = mpsc::channel(buffer);
    (
        ClientChannel { requests: req_tx, responses: resp_rx },
        HostChannel { requests: req_rx, responses: resp_tx },
    )
}

/// Bridge the client ends onto `stream`: requests out, replies in.
pub fn attach_client<S>(stream: S, buffer: usize) -> ClientChannel
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (req_tx, req_rx) = mpsc::channel(buffer);
    let (resp_tx, resp_rx) = mpsc::channel(buffer);
    tokio::spawn(pump_out(writer, req_rx, REQUEST_TOPIC));
    tokio::spawn(pump_in(reader, resp_tx, RESPONSE_TOPIC, None));
    ClientChannel { requests: req_tx, responses: resp_rx }
}

/// Bridge the host ends onto `stream`: requests in, replies out.
pub fn attach_host<S>(stream: S, buffer: usize) -> HostChannel
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (req_tx, req_rx) = mpsc::channel(buffer);
    let (resp_tx, resp_rx) = mpsc::channel(buffer);
    tokio::spawn(pump_in(reader, req_tx, REQUEST_TOPIC, Some(resp_tx.clone())));
    tokio::spawn(pump_out(writer, resp_rx, RESPONSE_TOPIC));
    HostChannel { requests: req_rx, responses: resp_tx }
}

/// Proxy backend speaking over `stream`.
pub fn connect_proxy<S>(
    stream: S,
    identity: impl Into<String>,
    buffer: usize,
    timeout: Option<Duration>,
) -> ProxyStorageBackend
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let channel = attach_client(stream, buffer);
    ProxyStorageBackend::spawn(identity, channel.requests, channel.responses, timeout)
}

/// Serve one connection until the peer goes away.
pub async fn serve_connection<S>(stream: S, dispatcher: RequestDispatcher, buffer: usize)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let channel = attach_host(stream, buffer);
    dispatcher.serve(channel.requests, channel.responses).await;
}

async fn pump_out<W, T>(mut writer: W, mut rx: mpsc::Receiver<T>, topic: &'static str)
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    while let Some(message) = rx.recv().await {
        let line = match Envelope::wrap(topic, &message).and_then(|env| env.encode_line()) {
            Ok(line) => line,
            Err(e) => {
                error!(topic, error = %e, "cannot encode frame");
                continue;
            }
        };
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!(topic, error = %e, "write to channel failed");
            return;
        }
        if let Err(e) = writer.flush().await {
            error!(topic, error = %e, "flush of channel failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
    debug!(topic, "outbound pump finished");
}

/// `reject` answers requests whose payload does not parse, as long as they
/// carry a string id; only the host side passes it.
async fn pump_in<R, T>(
    reader: R,
    tx: mpsc::Sender<T>,
    topic: &'static str,
    reject: Option<mpsc::Sender<ProxyResponse>>,
) where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(topic, error = %e, "read from channel failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let envelope = match Envelope::decode_line(&line) {
            Ok(env) => env,
            Err(e) => {
                warn!(topic, error = %e, "skipping malformed frame");
                continue;
            }
        };
        if envelope.topic != topic {
            debug!(expected = topic, got = %envelope.topic, "skipping frame on other topic");
            continue;
        }
        let id = envelope.correlation_id().map(str::to_string);
        match envelope.unwrap_as::<T>() {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            Err(e) => match (&reject, id) {
                (Some(reject), Some(id)) => {
                    warn!(topic, id = %id, error = %e, "refusing request with bad payload");
                    if reject.send(ProxyResponse::error(id, format!("Invalid request: {e}"))).await.is_err() {
                        break;
                    }
                }
                _ => warn!(topic, error = %e, "skipping frame with bad payload"),
            },
        }
    }
    debug!(topic, "inbound pump finished");
}
