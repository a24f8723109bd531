mod reaper;

pub use reaper::{ExpiryReaper, ReapReport};
