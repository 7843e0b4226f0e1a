//! Local package file server.
//!
//! Serves files from a [`LocalFileStore`](appdb_file_store::LocalFileStore)
//! root on `127.0.0.1:<port>` as `GET /{name}`. Anything that does not name
//! a regular file inside the root gets an empty 404. While running, the
//! server holds an execution lease obtained from a [`LeaseProvider`].

mod error;
mod lease;
mod routes;
mod server;

pub use error::ServerError;
pub use lease::{ExecutionLease, LeaseError, LeaseProvider, NoopLeaseProvider};
pub use server::{LocalFileServer, ServerConfig};

use std::time::Duration;

/// How long [`LocalFileServer::stop`] waits for in-flight responses.
pub const STOP_GRACE: Duration = Duration::from_secs(2);
