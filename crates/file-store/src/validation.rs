use std::path::{Component, Path};

use crate::StoreError;

/// Validates that `name` is a single plain file name inside the store root.
///
/// Rejects:
/// - Empty names
/// - Absolute paths and Windows prefixes (`C:`, `\\server`)
/// - Any separator, so nested paths never reach the filesystem
/// - `.` and `..`
pub fn validate_file_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("empty name".into()));
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidName(format!(
            "path separators not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(StoreError::InvalidName(format!(
            "parent directory traversal not allowed: {name}"
        ))),
        (Some(Component::Prefix(_)), _) => Err(StoreError::InvalidName(format!(
            "path prefix not allowed: {name}"
        ))),
        _ => Err(StoreError::InvalidName(format!("not a file name: {name}"))),
    }
}
