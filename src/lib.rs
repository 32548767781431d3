//! Memory hierarchy simulator: set-associative caches stacked into an
//! inclusive hierarchy, and demand-paged virtual memory in front of them.

pub mod cache;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod replace;
pub mod sim;
pub mod trace;
pub mod vm;

pub use error::{Result, SimError};
