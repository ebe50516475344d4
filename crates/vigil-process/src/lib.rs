//! # Vigil Process
//!
//! Low-level process operations used by the supervisor.
//!
//! This crate provides primitives for:
//! - Process existence verification
//! - Graceful and forced termination (single pid or whole process group)
//! - Process-table scans by command-line signature

pub mod check;
pub mod scan;
pub mod terminate;

// Re-export main types
pub use check::*;
pub use scan::*;
pub use terminate::*;
