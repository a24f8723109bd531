//! Sharebin Services Library
//!
//! Upload orchestration, the content store, retrieval and the expiry reaper.

pub mod cleanup;
pub mod share;

pub use cleanup::{ExpiryReaper, ReapReport};
pub use share::{
    ContentStore, Disposition, Requester, ShareDescriptor, ShareService, UploadContent,
    UploadOutcome, UploadRequest,
};
