use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use appdb_file_store::LocalFileStore;
use appdb_protocol::constants::{DEFAULT_SERVER_PORT, LOOPBACK_HOST};

use crate::lease::{ExecutionLease, LeaseProvider, NoopLeaseProvider};
use crate::{STOP_GRACE, ServerError, routes};

/// Characters left unescaped in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
        }
    }
}

struct Running {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    lease: Box<dyn ExecutionLease>,
}

/// Read-only HTTP view of a [`LocalFileStore`] on the loopback interface.
///
/// `Stopped -> Running -> Stopped`, any number of times.
pub struct LocalFileServer {
    store: LocalFileStore,
    port: u16,
    bound_port: AtomicU16,
    leases: Arc<dyn LeaseProvider>,
    running: Mutex<Option<Running>>,
}

impl LocalFileServer {
    pub fn new(store: LocalFileStore, config: ServerConfig) -> Self {
        Self {
            store,
            port: config.port,
            bound_port: AtomicU16::new(0),
            leases: Arc::new(NoopLeaseProvider),
            running: Mutex::new(None),
        }
    }

    /// Uses `leases` to keep the host alive while the server runs.
    pub fn with_lease_provider(mut self, leases: Arc<dyn LeaseProvider>) -> Self {
        self.leases = leases;
        self
    }

    pub fn store(&self) -> &LocalFileStore {
        &self.store
    }

    /// Binds the loopback listener and starts serving.
    ///
    /// On a bind failure nothing is acquired and the server stays stopped.
    /// If the lease is refused the listener is closed again.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let addr: SocketAddr = (Ipv4Addr::LOCALHOST, self.port).into();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let lease = match self.leases.acquire() {
            Ok(lease) => lease,
            Err(e) => {
                warn!(%local_addr, error = %e, "execution lease refused, closing listener");
                return Err(ServerError::Lease(e));
            }
        };

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let app = routes::router(self.store.clone());
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = served {
                error!("file server error: {e}");
            }
        });

        self.bound_port.store(local_addr.port(), Ordering::Relaxed);
        *running = Some(Running {
            addr: local_addr,
            cancel,
            task,
            lease,
        });

        info!(%local_addr, root = %self.store.root().display(), "file server listening");
        Ok(local_addr)
    }

    /// Closes the listener and releases the lease. No-op when stopped.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.cancel.cancel();
        let mut task = running.task;
        if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
            warn!(addr = %running.addr, "in-flight responses outlived the grace period, aborting");
            task.abort();
        }
        running.lease.release();
        self.bound_port.store(0, Ordering::Relaxed);

        info!(addr = %running.addr, "file server stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Returns the bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }

    /// URL under which `name` is served.
    ///
    /// Uses the bound port while running with an OS-assigned port,
    /// otherwise the configured one.
    pub fn url_for(&self, name: &str) -> String {
        let port = match self.bound_port.load(Ordering::Relaxed) {
            0 => self.port,
            bound => bound,
        };
        format!(
            "http://{LOOPBACK_HOST}:{port}/{}",
            utf8_percent_encode(name, PATH_SEGMENT)
        )
    }
}

impl Drop for LocalFileServer {
    /// Dropping a running server aborts the serve task and releases the
    /// lease without waiting for in-flight responses.
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
            running.task.abort();
            running.lease.release();
            debug!(addr = %running.addr, "file server dropped while running");
        }
    }
}
