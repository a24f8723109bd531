//! Sharebin Database Library
//!
//! Transactional record store for share items: the repository traits, the
//! Postgres implementation and an in-process implementation.

pub mod db;

pub use db::memory::MemoryShareRepository;
pub use db::postgres::PgShareRepository;
pub use db::share::{ShareRepository, ShareSession};
