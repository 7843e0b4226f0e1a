//! Inbox adoption with deterministic collision avoidance.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::relocate::move_no_replace;
use crate::store::LocalFileStore;
use crate::{MAX_COLLISION_SUFFIX, StoreError};

/// Fresh names tried for one inbox file when its target is claimed mid-move.
const ADOPT_RETRIES: u32 = 3;

/// Outcome of draining an inbox into the store.
#[derive(Debug, Default)]
pub struct AdoptionReport {
    /// Final store names of the adopted files, in adoption order.
    pub adopted: Vec<String>,
    /// Inbox files that could not be moved, with the reason.
    pub failed: Vec<(PathBuf, StoreError)>,
}

impl AdoptionReport {
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.failed.is_empty()
    }
}

impl LocalFileStore {
    /// Moves every managed file found in `inbox` into the store root.
    ///
    /// Name collisions are resolved by appending `_<n>` to the base name
    /// (`a.ipa` -> `a_1.ipa` -> `a_2.ipa`). Each file is adopted on its own:
    /// a failure is recorded in the report and the rest of the batch proceeds.
    pub fn adopt_inbox(&self, inbox: &Path) -> AdoptionReport {
        let mut report = AdoptionReport::default();

        if inbox == self.root() {
            return report;
        }

        let entries = match std::fs::read_dir(inbox) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return report,
            Err(e) => {
                warn!(inbox = %inbox.display(), error = %e, "failed to read inbox");
                report
                    .failed
                    .push((inbox.to_path_buf(), StoreError::storage("read inbox", inbox, e)));
                return report;
            }
        };

        let mut pending: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.is_managed(path))
            .collect();
        pending.sort();

        if pending.is_empty() {
            return report;
        }

        if let Err(e) = self.ensure_root() {
            warn!(error = %e, "cannot adopt inbox files without a store root");
            report.failed.push((self.root().to_path_buf(), e));
            return report;
        }

        for source in pending {
            match self.adopt_one(&source) {
                Ok(name) => report.adopted.push(name),
                Err(e) => {
                    warn!(file = %source.display(), error = %e, "failed to adopt inbox file");
                    report.failed.push((source, e));
                }
            }
        }

        if !report.adopted.is_empty() {
            info!(
                adopted = report.adopted.len(),
                failed = report.failed.len(),
                "adopted inbox files"
            );
        }

        report
    }

    fn adopt_one(&self, source: &Path) -> Result<String, StoreError> {
        let file_name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StoreError::InvalidName(source.display().to_string()))?;

        // A name picked by `unique_name` can be taken before the move lands.
        let mut attempts = 0;
        loop {
            let name = self.unique_name(file_name);
            match move_no_replace(source, &self.resolve_path(&name)) {
                Ok(()) => {
                    debug!(from = %source.display(), to = %name, "adopted inbox file");
                    return Ok(name);
                }
                Err(e)
                    if e.io_kind() == Some(ErrorKind::AlreadyExists)
                        && attempts < ADOPT_RETRIES =>
                {
                    attempts += 1;
                    debug!(%name, "adoption target taken, picking another name");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Returns `file_name` if it is free in the store, otherwise the first
    /// free `<stem>_<n>.<ext>` variant.
    ///
    /// The counter stops at [`MAX_COLLISION_SUFFIX`]; beyond that a random
    /// eight-character token replaces it.
    pub fn unique_name(&self, file_name: &str) -> String {
        if !self.resolve_path(file_name).exists() {
            return file_name.to_string();
        }

        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let ext = path.extension().and_then(|e| e.to_str());

        let with_suffix = |suffix: &str| match ext {
            Some(ext) => format!("{stem}_{suffix}.{ext}"),
            None => format!("{stem}_{suffix}"),
        };

        for n in 1..=MAX_COLLISION_SUFFIX {
            let candidate = with_suffix(&n.to_string());
            if !self.resolve_path(&candidate).exists() {
                return candidate;
            }
        }

        loop {
            let token = uuid::Uuid::new_v4().simple().to_string();
            let candidate = with_suffix(&token[..8]);
            if !self.resolve_path(&candidate).exists() {
                warn!(name = %file_name, %candidate, "collision counter exhausted, using random suffix");
                return candidate;
            }
        }
    }
}
