//! Package metadata extraction.
//!
//! Unpacks a stored `.ipa` into a scratch directory inside the store root,
//! finds `Payload/<name>.app/Info.plist`, and returns the descriptor as
//! pretty-printed JSON, base64-encoded for transport. The scratch directory
//! is removed before every return.

mod convert;
mod error;
mod extract;
mod unpack;

pub use convert::plist_to_json;
pub use error::MetadataError;
pub use extract::{MetadataExtractor, decode_metadata};

/// Prefix of the scratch directories created inside the store root.
pub const SCRATCH_PREFIX: &str = ".extract-";
