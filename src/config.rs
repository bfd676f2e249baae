//! JSON configuration for the command-line driver.

pub mod runtime;

pub use runtime::{load_config, ApplyIds, EpochSource, OutputConfig, RuntimeConfig};
