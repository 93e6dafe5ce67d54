//! Watchshot Common Library
//!
//! Shared types, configuration and the phone simulator protocol used by the
//! Watchshot screenshot harness.

pub mod config;
pub mod error;
pub mod phonesim;
pub mod types;

// Re-export commonly used types
pub use config::{CiEnvironment, DelayConfig, HarnessConfig};
pub use error::{Error, Result};
pub use phonesim::{AppConfigMessage, EmulatorInfo, PhonesimClient};
pub use types::*;
