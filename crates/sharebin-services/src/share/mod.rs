//! Share lifecycle: upload, storage of content and retrieval.

mod retrieval;
mod service;
mod store;

pub use retrieval::{Disposition, ShareDescriptor};
pub use service::{Requester, ShareService, UploadContent, UploadOutcome, UploadRequest};
pub use store::ContentStore;
