//! Lumen Core
//!
//! Math value types, logging and profiling shared by the Lumen crates.

pub mod alloc;
pub mod logging;
pub mod math;
pub mod profiling;
