//! Multipart HTTP upload handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::watch;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use appdb_protocol::constants::DEFAULT_UPLOAD_FIELD;

use crate::{TransferError, TransferEvent, TransferHandle, TransferOutcome, UploadSession};

/// What to upload and where.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub path: PathBuf,
    /// Multipart field carrying the file.
    pub field: String,
    /// Extra text fields sent before the file.
    pub fields: Vec<(String, String)>,
}

impl UploadRequest {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            field: DEFAULT_UPLOAD_FIELD.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// POSTs one file as `multipart/form-data`, streaming it from disk.
///
/// Pausing holds the body stream between chunks; cancelling drops the
/// request and no further events are sent.
pub struct HttpUploadHandle {
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl HttpUploadHandle {
    /// Opens the file and starts the request on a background task.
    ///
    /// Returns the handle and the receiver its events arrive on.
    pub async fn start(
        client: &reqwest::Client,
        request: UploadRequest,
    ) -> Result<(Arc<Self>, UnboundedReceiver<TransferEvent>), TransferError> {
        let file = tokio::fs::File::open(&request.path).await?;
        let total = file.metadata().await?.len();
        let file_name = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| request.field.clone());

        let (events, rx) = unbounded_channel();
        let (paused, gate) = watch::channel(false);
        let cancel = CancellationToken::new();

        let body = gated_body(file, total, gate, events.clone(), cancel.clone());
        let part = Part::stream_with_length(body, total)
            .file_name(file_name.clone())
            .mime_str("application/octet-stream")?;
        let mut form = Form::new();
        for (name, value) in request.fields {
            form = form.text(name, value);
        }
        let form = form.part(request.field, part);

        info!(url = %request.url, file = %file_name, bytes = total, "starting upload");
        let send = client.post(&request.url).multipart(form).send();
        tokio::spawn(drive(send, events, cancel.clone()));

        Ok((Arc::new(Self { paused, cancel }), rx))
    }
}

impl TransferHandle for HttpUploadHandle {
    fn suspend(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Starts an upload and wraps it in a session fed by the handle's events.
pub async fn upload_file(
    client: &reqwest::Client,
    request: UploadRequest,
) -> Result<Arc<UploadSession>, TransferError> {
    let (handle, events) = HttpUploadHandle::start(client, request).await?;
    let session = UploadSession::new(handle);
    session.attach(events);
    Ok(session)
}

/// File body that waits while paused and reports each chunk it hands over.
fn gated_body(
    file: tokio::fs::File,
    total: u64,
    gate: watch::Receiver<bool>,
    events: UnboundedSender<TransferEvent>,
    cancel: CancellationToken,
) -> reqwest::Body {
    let sent = Arc::new(AtomicU64::new(0));
    let stream = ReaderStream::new(file).then(move |chunk| {
        let mut gate = gate.clone();
        let events = events.clone();
        let cancel = cancel.clone();
        let sent = Arc::clone(&sent);
        async move {
            if gate.wait_for(|paused| !*paused).await.is_err() {
                debug!("upload handle dropped while paused");
            }
            if let Ok(bytes) = &chunk {
                let completed = sent.fetch_add(bytes.len() as u64, Ordering::Relaxed)
                    + bytes.len() as u64;
                if !cancel.is_cancelled() {
                    let _ = events.send(TransferEvent::Progress { completed, total });
                }
            }
            chunk
        }
    });
    reqwest::Body::wrap_stream(stream)
}

async fn drive(
    send: impl Future<Output = reqwest::Result<reqwest::Response>>,
    events: UnboundedSender<TransferEvent>,
    cancel: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("upload cancelled");
            return;
        }
        result = read_response(send) => match result {
            Ok((status, body)) => TransferOutcome::Response { status, body },
            Err(e) => {
                warn!(error = %e, "upload failed");
                TransferOutcome::Failed(e.to_string())
            }
        },
    };

    if cancel.is_cancelled() {
        return;
    }
    debug!(?outcome, "upload finished");
    let _ = events.send(TransferEvent::Finished(outcome));
}

async fn read_response(
    send: impl Future<Output = reqwest::Result<reqwest::Response>>,
) -> reqwest::Result<(u16, serde_json::Value)> {
    let response = send.await?;
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
    Ok((status, body))
}
