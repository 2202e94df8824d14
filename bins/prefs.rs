use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use service::document::PreferenceDocument;
use service::transport;
use tokio::net::UnixStream;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "prefs", version, about = "Read and write preference documents through a running prefs-host")]
struct Cli {
    /// Host socket; defaults to the configured `channel.socket_path`.
    #[arg(long, env = "PREFS_SOCKET")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a document.
    Read {
        /// Root-relative name, e.g. `settings.json` or `profiles/work/notes.txt`.
        name: String,
        /// Pretty-print the document as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Replace a document.
    Write {
        name: String,
        content: String,
        /// Parse `content` as JSON and store it compactly.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    common::utils::logging::init_logging_stderr();
    let cli = Cli::parse();

    let cfg = configs::AppConfig::load_and_validate()?;
    let socket = cli.socket.clone().unwrap_or_else(|| cfg.socket_path());
    let identity = cfg
        .channel
        .identity
        .clone()
        .unwrap_or_else(|| format!("prefs-{}", std::process::id()));

    debug!(socket = %socket.display(), %identity, "connecting to host");
    let stream = UnixStream::connect(&socket)
        .await
        .with_context(|| format!("cannot reach prefs-host at {}", socket.display()))?;
    let backend = Arc::new(transport::connect_proxy(
        stream,
        identity,
        cfg.channel.buffer,
        cfg.channel.request_timeout(),
    ));

    match cli.command {
        Command::Read { name, json } => {
            let doc = PreferenceDocument::new(backend, [name.as_str()])?;
            if json {
                let value: serde_json::Value = doc.read_json().await?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", doc.read().await?);
            }
        }
        Command::Write { name, content, json } => {
            let doc = PreferenceDocument::new(backend, [name.as_str()])?;
            if json {
                let value: serde_json::Value =
                    serde_json::from_str(&content).context("content is not valid JSON")?;
                doc.write_json(&value).await?;
            } else {
                doc.write(content).await?;
            }
        }
    }
    Ok(())
}
