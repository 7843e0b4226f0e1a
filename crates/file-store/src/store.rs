use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use appdb_protocol::constants::{INBOX_DIR, MANAGED_EXTENSION};
use appdb_protocol::{ManagedFile, human_readable_size};
use tracing::{debug, info};

use crate::natural::natural_cmp;
use crate::relocate::move_no_replace;
use crate::validation::validate_file_name;
use crate::StoreError;

/// A directory of package files plus the inbox it drains.
///
/// Cheap to clone; share one instance with the server and the extractor.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    inbox: PathBuf,
    extension: String,
}

impl LocalFileStore {
    /// Creates a store over `root` that adopts files arriving in `inbox`.
    pub fn new(root: impl Into<PathBuf>, inbox: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inbox: inbox.into(),
            extension: MANAGED_EXTENSION.to_string(),
        }
    }

    /// Creates a store whose inbox is the `Inbox` directory inside `root`.
    pub fn with_default_inbox(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let inbox = root.join(INBOX_DIR);
        Self::new(root, inbox)
    }

    /// Overrides the managed file extension (without the dot).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Creates the store root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| StoreError::storage("create store root", &self.root, e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns `true` if `path` carries the managed extension.
    pub fn is_managed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }

    /// Adopts pending inbox files, then lists the managed files.
    ///
    /// Entries are unique by name and sorted in natural order. Calling this
    /// repeatedly without filesystem changes returns the same sequence.
    pub fn list(&self) -> Result<Vec<ManagedFile>, StoreError> {
        self.adopt_inbox(&self.inbox);

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::storage("list", &self.root, e)),
        };

        let mut seen = HashSet::new();
        let mut files: Vec<ManagedFile> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if !path.is_file() || !self.is_managed(&path) {
                    return None;
                }
                let name = entry.file_name().into_string().ok()?;
                let size = self.size(&name);
                Some(ManagedFile::new(name, size))
            })
            .filter(|file| seen.insert(file.name.clone()))
            .collect();

        files.sort_by(|a, b| natural_cmp(&a.name, &b.name));

        debug!(count = files.len(), root = %self.root.display(), "listed store");
        Ok(files)
    }

    /// Looks up a single managed file by name without adopting the inbox.
    pub fn get(&self, name: &str) -> Result<ManagedFile, StoreError> {
        validate_file_name(name)?;
        let path = self.resolve_path(name);
        if !path.is_file() || !self.is_managed(&path) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(ManagedFile::new(name, self.size(name)))
    }

    /// Joins `name` onto the store root. Does not check existence.
    pub fn resolve_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Human-readable size of `name`, or an empty string when unknown.
    pub fn size(&self, name: &str) -> String {
        match std::fs::metadata(self.resolve_path(name)) {
            Ok(meta) if meta.is_file() => human_readable_size(meta.len()),
            _ => String::new(),
        }
    }

    /// Renames `file` to `new_name` inside the store root.
    ///
    /// A missing source is a no-op. The destination must be a plain file
    /// name that is not already taken.
    pub fn rename(&self, file: &ManagedFile, new_name: &str) -> Result<(), StoreError> {
        validate_file_name(&file.name)?;
        validate_file_name(new_name)?;

        let from = self.resolve_path(&file.name);
        if !from.exists() {
            debug!(name = %file.name, "rename source missing, skipping");
            return Ok(());
        }
        if file.name == new_name {
            return Ok(());
        }

        move_no_replace(&from, &self.resolve_path(new_name))?;

        info!(from = %file.name, to = %new_name, "renamed package");
        Ok(())
    }

    /// Deletes `file` from the store.
    ///
    /// Files that are already gone, or that the filesystem refuses to let us
    /// remove, are skipped without error.
    pub fn delete(&self, file: &ManagedFile) -> Result<(), StoreError> {
        validate_file_name(&file.name)?;
        let path = self.resolve_path(&file.name);

        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(name = %file.name, "deleted package");
                Ok(())
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                debug!(name = %file.name, error = %e, "package not deletable, skipping");
                Ok(())
            }
            Err(e) => Err(StoreError::storage("delete", &path, e)),
        }
    }
}
