//! Catalog and reading progress domain logic.

pub mod catalog;
pub mod progress;

pub use catalog::BookInput;
pub use progress::{PageUpdate, ProgressState, ReadingStatus};
