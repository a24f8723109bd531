//! Sharebin Storage Library
//!
//! Artifact storage for file shares. Artifacts live in one flat directory and
//! are addressed by their sanitized, de-duplicated filename; names must not
//! contain path separators.

pub mod local;
pub mod traits;

// Re-export commonly used types
pub use local::LocalStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
