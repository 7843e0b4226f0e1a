//! Zip unpacking into the scratch directory.

use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::MetadataError;

/// Unpacks every entry of `archive` under `dest`.
///
/// Entries whose names would land outside `dest` are skipped. Returns the
/// number of files written.
pub(crate) fn unpack_archive(archive: &Path, dest: &Path) -> Result<usize, MetadataError> {
    let file = File::open(archive).map_err(MetadataError::storage("open archive"))?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .map_err(|e| MetadataError::MalformedArchive(format!("not a zip archive: {e}")))?;

    let mut written = 0usize;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| MetadataError::MalformedArchive(format!("entry {index}: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "skipping archive entry outside extraction root");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(MetadataError::storage("create directory"))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(MetadataError::storage("create directory"))?;
        }

        let mut out = File::create(&out_path).map_err(MetadataError::storage("create file"))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| match e.kind() {
            ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
                MetadataError::MalformedArchive(format!("corrupt entry {}: {e}", entry.name()))
            }
            _ => MetadataError::Storage {
                op: "write file",
                source: e,
            },
        })?;
        written += 1;
    }

    debug!(archive = %archive.display(), files = written, "unpacked archive");
    Ok(written)
}
