//! Kaffine core library
//!
//! Catalog caching and synchronization, function resolution and the
//! installed function set.

pub mod catalog;
pub mod config;
pub mod error;
pub mod function;
pub mod paths;

pub use config::Config;
pub use error::{ErrorKind, KaffineError, Result};
pub use function::FunctionManager;
pub use paths::KaffinePaths;
