//! Moves that never replace an existing destination.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;

use crate::StoreError;

/// Moves `from` to `to`, failing with `AlreadyExists` if `to` is taken.
///
/// The destination is claimed atomically: a hard link where the filesystem
/// supports one, otherwise an exclusive create followed by a copy.
pub(crate) fn move_no_replace(from: &Path, to: &Path) -> Result<(), StoreError> {
    match std::fs::hard_link(from, to) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(StoreError::storage("move", to, e));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::storage("move", from, e));
        }
        Err(_) => copy_no_replace(from, to)?,
    }

    std::fs::remove_file(from).map_err(|e| StoreError::storage("remove", from, e))
}

/// Fallback for cross-device moves and filesystems without hard links.
fn copy_no_replace(from: &Path, to: &Path) -> Result<(), StoreError> {
    let mut source = File::open(from).map_err(|e| StoreError::storage("open", from, e))?;
    let mut dest = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(|e| StoreError::storage("create", to, e))?;

    if let Err(e) = io::copy(&mut source, &mut dest) {
        drop(dest);
        let _ = std::fs::remove_file(to);
        return Err(StoreError::storage("copy", from, e));
    }
    Ok(())
}
