//! Well-known names shared by the store, extractor, server and CLI.

/// Extension (without the dot) of the package files the store manages.
pub const MANAGED_EXTENSION: &str = "ipa";

/// Directory inside a package archive that holds the application bundle.
pub const PAYLOAD_DIR: &str = "Payload";

/// Extension (without the dot) that marks the application bundle directory.
pub const BUNDLE_EXTENSION: &str = "app";

/// Metadata descriptor file inside the application bundle.
pub const METADATA_FILE: &str = "Info.plist";

/// Name of the staging directory drained into the store on every listing.
pub const INBOX_DIR: &str = "Inbox";

/// Loopback host the local file server binds to.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Default port of the local file server.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Progress text shown by a session before the first progress tick.
pub const IDLE_PROGRESS_TEXT: &str = "Waiting...";

/// Default multipart field name carrying the package in uploads.
pub const DEFAULT_UPLOAD_FIELD: &str = "ipa";
