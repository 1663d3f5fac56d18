//! Configuration for gluetun-gost.
//!
//! This module handles:
//! - Optional TOML config file parsing
//! - Built-in default templates and paths

pub mod parser;
pub mod types;

pub use parser::{load_config, parse_config_file, parse_config_str};
pub use types::{ClientConfig, Config, GatewayConfig};
