//! Package file store.
//!
//! Owns a single directory of package files. Listing first drains the inbox
//! (files handed over by other apps) into the store, resolving name
//! collisions, then returns the managed files in natural name order.

mod adopt;
mod error;
mod natural;
mod relocate;
mod store;
mod validation;

pub use adopt::AdoptionReport;
pub use error::StoreError;
pub use natural::natural_cmp;
pub use store::LocalFileStore;
pub use validation::validate_file_name;

/// Highest `_<n>` suffix tried when resolving a name collision.
///
/// Past this, a short random token is used instead of a counter.
pub const MAX_COLLISION_SUFFIX: u32 = 9_999;
