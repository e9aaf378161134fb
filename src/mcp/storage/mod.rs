//! Storage abstractions for process sessions and search jobs.
//!
//! This module provides trait-based storage abstractions that enable:
//! - Dependency injection for testability
//! - Lock-free concurrent access via DashMap implementations
//! - Clean separation between storage and lifecycle logic

mod process;
mod search;
mod traits;

pub use process::DashMapSessionStorage;
pub use search::DashMapSearchStorage;
pub use traits::{SearchStorage, SessionStorage};
