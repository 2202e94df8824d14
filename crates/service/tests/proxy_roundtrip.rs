use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use service::dispatcher::RequestDispatcher;
use service::document::PreferenceDocument;
use service::proxy::ProxyStorageBackend;
use service::settings::GlobalSettings;
use service::storage::local::LocalStorageBackend;
use service::storage::StorageBackend;
use service::transport;
use uuid::Uuid;

fn scratch_root() -> PathBuf {
    std::env::temp_dir().join(format!("prefs_e2e_{}", Uuid::new_v4()))
}

/// Host and client joined by an in-process byte stream, framed exactly as on a socket.
fn over_stream(root: &Path) -> Arc<dyn StorageBackend> {
    let (client_io, host_io) = tokio::io::duplex(64 * 1024);
    let dispatcher = RequestDispatcher::new(Arc::new(LocalStorageBackend::new(root)));
    tokio::spawn(transport::serve_connection(host_io, dispatcher, 16));
    Arc::new(transport::connect_proxy(client_io, "renderer", 16, None))
}

#[tokio::test]
async fn document_roundtrip_through_proxy() -> anyhow::Result<()> {
    let root = scratch_root();
    let backend = over_stream(&root);
    let doc = PreferenceDocument::new(backend, ["profiles", "default", "notes.txt"])?;

    let err = doc.read().await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    let content = "line one\nline two\n\u{00e9}t\u{00e9} \u{2603} \u{1f600}";
    doc.write(content).await?;
    assert_eq!(doc.read().await?, content);

    let on_disk = tokio::fs::read_to_string(root.join("profiles/default/notes.txt")).await?;
    assert_eq!(on_disk, content);

    let _ = tokio::fs::remove_dir_all(&root).await;
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_all_complete() -> anyhow::Result<()> {
    let root = scratch_root();
    let backend = over_stream(&root);

    let mut handles = Vec::new();
    for i in 0..16 {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            let doc = PreferenceDocument::new(backend, [format!("doc-{i}.json")])?;
            doc.write(json!({ "n": i })).await?;
            let back: serde_json::Value = doc.read_json().await?;
            anyhow::ensure!(back == json!({ "n": i }), "doc-{i} came back as {back}");
            Ok::<(), anyhow::Error>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let _ = tokio::fs::remove_dir_all(&root).await;
    Ok(())
}

#[tokio::test]
async fn in_memory_channel_carries_settings() -> anyhow::Result<()> {
    let root = scratch_root();
    let (client, host) = transport::in_memory(8);
    let dispatcher = RequestDispatcher::new(Arc::new(LocalStorageBackend::new(root.clone())));
    tokio::spawn(dispatcher.serve(host.requests, host.responses));
    let proxy = Arc::new(ProxyStorageBackend::spawn("ui", client.requests, client.responses, None));

    let settings = GlobalSettings::load(proxy.clone()).await?;
    settings.set("theme", "dark").await?;
    settings.set("zoom", 1.25).await?;
    settings.flush().await;
    assert_eq!(proxy.pending(), 0);

    let reloaded = GlobalSettings::load(proxy).await?;
    assert_eq!(reloaded.get("theme").await, Some(json!("dark")));
    assert_eq!(reloaded.get_as::<f64>("zoom").await, Some(1.25));

    let _ = tokio::fs::remove_dir_all(&root).await;
    Ok(())
}

#[tokio::test]
async fn host_going_away_rejects_waiting_callers() -> anyhow::Result<()> {
    let (client_io, host_io) = tokio::io::duplex(1024);
    let backend = transport::connect_proxy(client_io, "orphan", 4, None);
    let doc = PreferenceDocument::new(Arc::new(backend), ["x.json"])?;

    let pending = tokio::spawn(async move { doc.read().await });
    tokio::task::yield_now().await;
    drop(host_io);

    let result = pending.await?;
    assert!(result.is_err());
    Ok(())
}
