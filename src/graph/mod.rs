//! Planning-time graph construction.

pub mod builder;
pub mod key;

pub use builder::{CachePolicy, GraphBuilder, TaskGraph};
pub use key::TaskKey;
