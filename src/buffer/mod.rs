mod buffer_pool_manager;
mod frame;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::*;
pub use frame::*;
pub use replacer::{ReplacementStrategy, Replacer};
pub use stats::*;
