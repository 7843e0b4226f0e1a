use std::path::{Path, PathBuf};

use appdb_file_store::{LocalFileStore, validate_file_name};
use appdb_protocol::constants::{BUNDLE_EXTENSION, METADATA_FILE, PAYLOAD_DIR};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

use crate::convert::plist_to_json;
use crate::unpack::unpack_archive;
use crate::{MetadataError, SCRATCH_PREFIX};

/// Reads the bundle descriptor out of packages held by a [`LocalFileStore`].
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    store: LocalFileStore,
}

impl MetadataExtractor {
    pub fn new(store: LocalFileStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LocalFileStore {
        &self.store
    }

    /// Returns the `Info.plist` of package `name` as base64-encoded,
    /// pretty-printed JSON with the descriptor's key order.
    ///
    /// The archive is unpacked into a scratch directory under the store
    /// root which is removed before this returns, whatever the outcome.
    pub fn extract_metadata(&self, name: &str) -> Result<String, MetadataError> {
        let json = self.extract_json(name)?;
        let pretty = serde_json::to_string_pretty(&json)?;
        Ok(STANDARD.encode(pretty.as_bytes()))
    }

    /// Same as [`extract_metadata`](Self::extract_metadata) without the
    /// transport encoding.
    pub fn extract_json(&self, name: &str) -> Result<serde_json::Value, MetadataError> {
        if validate_file_name(name).is_err() {
            return Err(MetadataError::NotFound(name.to_string()));
        }
        let archive = self.store.resolve_path(name);
        if !archive.is_file() {
            return Err(MetadataError::NotFound(name.to_string()));
        }

        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(self.store.root())
            .map_err(MetadataError::storage("create scratch directory"))?;
        debug!(package = %name, scratch = %scratch.path().display(), "extracting metadata");

        let result = read_descriptor(&archive, scratch.path());
        let cleanup = scratch.close();

        match (result, cleanup) {
            (Ok(json), Ok(())) => {
                info!(package = %name, "extracted metadata");
                Ok(json)
            }
            (Ok(_), Err(e)) => Err(MetadataError::Storage {
                op: "remove scratch directory",
                source: e,
            }),
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!(package = %name, error = %cleanup_err, "failed to remove scratch directory");
                }
                debug!(package = %name, error = %e, "metadata extraction failed");
                Err(e)
            }
        }
    }
}

/// Decodes the output of [`MetadataExtractor::extract_metadata`].
pub fn decode_metadata(encoded: &str) -> Result<serde_json::Value, MetadataError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_descriptor(archive: &Path, scratch: &Path) -> Result<serde_json::Value, MetadataError> {
    unpack_archive(archive, scratch)?;

    let payload = scratch.join(PAYLOAD_DIR);
    if !payload.is_dir() {
        return Err(MetadataError::MalformedArchive(format!(
            "no {PAYLOAD_DIR} directory"
        )));
    }

    let bundle = find_bundle(&payload)?;
    let descriptor = bundle.join(METADATA_FILE);
    if !descriptor.is_file() {
        let bundle_name = bundle
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Err(MetadataError::MissingMetadata(bundle_name));
    }

    let value = plist::Value::from_file(&descriptor)
        .map_err(|e| MetadataError::UnreadableMetadata(e.to_string()))?;
    if value.as_dictionary().is_none() {
        return Err(MetadataError::UnreadableMetadata(
            "descriptor root is not a dictionary".into(),
        ));
    }

    Ok(plist_to_json(&value))
}

/// Finds the single `*.app` directory inside `Payload/`.
fn find_bundle(payload: &Path) -> Result<PathBuf, MetadataError> {
    let mut bundles: Vec<PathBuf> = std::fs::read_dir(payload)
        .map_err(MetadataError::storage("read payload"))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == BUNDLE_EXTENSION)
        })
        .collect();

    match bundles.len() {
        1 => Ok(bundles.remove(0)),
        0 => Err(MetadataError::MalformedArchive(format!(
            "no .{BUNDLE_EXTENSION} bundle in {PAYLOAD_DIR}"
        ))),
        n => Err(MetadataError::MalformedArchive(format!(
            "{n} .{BUNDLE_EXTENSION} bundles in {PAYLOAD_DIR}"
        ))),
    }
}
