//! Data models for the share lifecycle.

mod plan;
mod share;

pub use plan::*;
pub use share::*;
