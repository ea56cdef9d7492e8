//! sutra-core
//!
//! Shared vocabulary of the answer engine: passage and hit types, the async
//! backend traits, the error type and the layered configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
