//! Providers Module - External Data Sources
//!
//! Remote COG headers and the notebook configuration list.

pub mod cog;
pub mod http;
pub mod notebook_config;

pub use cog::CogReader;
pub use notebook_config::NotebookConfigClient;
