//! Utils Module - Helper Functions & Shared Utilities

pub mod cache;
pub mod constants;
pub mod pyfmt;
pub mod telemetry;

pub use cache::*;
pub use constants::*;
pub use telemetry::*;
