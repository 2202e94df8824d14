#![cfg(unix)]

use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use configs::AppConfig;
use service::dispatcher::RequestDispatcher;
use service::storage::bootstrap::ensure_dir;
use service::storage::local::LocalStorageBackend;
use service::transport;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::observability::{metrics_response, CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL};

/// Listening host: one dispatcher over the local storage root, shared by
/// every client connection. The socket file is removed on drop.
pub struct HostServer {
    listener: UnixListener,
    socket_path: PathBuf,
    dispatcher: RequestDispatcher,
    buffer: usize,
}

impl HostServer {
    /// Prepare the storage root and bind the socket. `cfg` must already be
    /// normalized so the root and socket path are resolved.
    pub async fn bind(cfg: &AppConfig) -> anyhow::Result<Self> {
        let root = cfg.storage.root()?;
        ensure_dir(&root).await?;

        let socket_path = cfg.socket_path();
        if let Some(parent) = socket_path.parent() {
            ensure_dir(parent).await?;
        }
        clear_stale_socket(&socket_path).await?;

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("cannot bind {}", socket_path.display()))?;
        tokio::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600)).await?;

        let dispatcher = RequestDispatcher::new(Arc::new(LocalStorageBackend::new(&root)));
        info!(root = %root.display(), socket = %socket_path.display(), "preference host bound");
        Ok(Self { listener, socket_path, dispatcher, buffer: cfg.channel.buffer })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept clients until the task is dropped. Each connection gets its
    /// own task; requests within a connection are handled concurrently.
    pub async fn serve(&self) -> anyhow::Result<()> {
        loop {
            let (stream, _) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    continue;
                }
            };
            CONNECTIONS_TOTAL.inc();
            CONNECTIONS_ACTIVE.inc();
            let dispatcher = self.dispatcher.clone();
            let buffer = self.buffer;
            tokio::spawn(async move {
                debug!("client connected");
                transport::serve_connection(stream, dispatcher, buffer).await;
                CONNECTIONS_ACTIVE.dec();
                debug!("client disconnected");
            });
        }
    }
}

impl Drop for HostServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!(socket = %self.socket_path.display(), error = %e, "socket file not removed");
        }
    }
}

/// A leftover socket from a crashed host is removed; a live one is an error.
async fn clear_stale_socket(path: &Path) -> anyhow::Result<()> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if !meta.file_type().is_socket() {
        return Err(anyhow!("{} exists and is not a socket", path.display()));
    }
    if UnixStream::connect(path).await.is_ok() {
        return Err(anyhow!("another host is already serving {}", path.display()));
    }
    warn!(socket = %path.display(), "removing stale socket");
    tokio::fs::remove_file(path).await?;
    Ok(())
}

/// Start the optional admin server, bind the socket and serve forever.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let _admin = if cfg.admin.enabled {
        Some(common::admin_http::spawn_admin_server(&cfg.admin.addr, metrics_response).await?)
    } else {
        None
    };
    let server = HostServer::bind(&cfg).await?;
    server.serve().await
}
