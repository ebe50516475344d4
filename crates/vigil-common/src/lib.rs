//! # Vigil Common
//!
//! Types shared across the vigil supervisor crates.

pub mod errors;

pub use errors::{ProcessError, ProcessResult};
