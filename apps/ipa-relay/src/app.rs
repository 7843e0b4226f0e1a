//! Command dispatch: wires the store, extractor, server and uploader.

use anyhow::{Context, bail};
use tokio::sync::oneshot;
use tracing::info;

use appdb_file_server::{LocalFileServer, ServerConfig};
use appdb_file_store::LocalFileStore;
use appdb_ipa_metadata::{MetadataExtractor, decode_metadata};
use appdb_protocol::ManagedFile;
use appdb_transfer::{TransferOutcome, UploadRequest, upload_file};

use crate::Command;
use crate::config::Config;

/// Builds the store described by `config`.
pub fn open_store(config: &Config) -> LocalFileStore {
    let root = config.store_root_path();
    match config.inbox_path() {
        Some(inbox) => LocalFileStore::new(root, inbox),
        None => LocalFileStore::with_default_inbox(root),
    }
}

/// Runs one command to completion.
pub async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let store = open_store(&config);
    store.ensure_root()?;

    match command {
        Command::List => {
            for line in list_lines(&store)? {
                println!("{line}");
            }
        }
        Command::Info { name, json } => {
            let extractor = MetadataExtractor::new(store);
            let encoded = tokio::task::spawn_blocking(move || extractor.extract_metadata(&name))
                .await??;
            if json {
                println!("{}", serde_json::to_string_pretty(&decode_metadata(&encoded)?)?);
            } else {
                println!("{encoded}");
            }
        }
        Command::Rename { from, to } => {
            store.rename(&ManagedFile::new(from, ""), &to)?;
        }
        Command::Delete { name } => {
            store.delete(&ManagedFile::new(name, ""))?;
        }
        Command::Serve { port } => {
            serve(store, port.unwrap_or(config.port)).await?;
        }
        Command::Upload { name, url } => {
            let url = url.unwrap_or_else(|| config.upload_url.clone());
            if url.is_empty() {
                bail!("no upload URL configured; pass --url or set upload_url");
            }
            upload(&store, &name, url, &config.upload_field).await?;
        }
    }

    Ok(())
}

/// One `name<TAB>size` line per stored package.
fn list_lines(store: &LocalFileStore) -> anyhow::Result<Vec<String>> {
    Ok(store
        .list()?
        .into_iter()
        .map(|file| format!("{}\t{}", file.name, file.size))
        .collect())
}

async fn serve(store: LocalFileStore, port: u16) -> anyhow::Result<()> {
    let server = LocalFileServer::new(store, ServerConfig { port });
    server.start().await?;

    for file in server.store().list()? {
        info!(url = %server.url_for(&file.name), "serving");
    }

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}

async fn upload(store: &LocalFileStore, name: &str, url: String, field: &str) -> anyhow::Result<()> {
    let file = store.get(name)?;
    let request = UploadRequest::new(url, store.resolve_path(&file.name)).with_field(field);
    let client = reqwest::Client::new();
    let session = upload_file(&client, request)
        .await
        .with_context(|| format!("starting upload of {name}"))?;

    session.on_progress(|_, text| info!("{text}"));
    let (done_tx, done_rx) = oneshot::channel();
    session.on_completion(move |outcome| {
        let _ = done_tx.send(outcome.clone());
    });

    let outcome = tokio::select! {
        outcome = done_rx => outcome.ok(),
        _ = tokio::signal::ctrl_c() => {
            session.stop();
            None
        }
    };

    match outcome {
        Some(outcome) => report(&outcome),
        None => bail!("upload of {name} cancelled"),
    }
}

fn report(outcome: &TransferOutcome) -> anyhow::Result<()> {
    match outcome {
        TransferOutcome::Response { status, body } if outcome.is_success() => {
            info!(status, "upload accepted");
            println!("{}", serde_json::to_string_pretty(body)?);
            Ok(())
        }
        TransferOutcome::Response { status, body } => bail!("upload rejected ({status}): {body}"),
        TransferOutcome::Failed(reason) => bail!("upload failed: {reason}"),
    }
}
