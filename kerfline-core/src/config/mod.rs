//! Configuration types
//!
//! Board-agnostic machine configuration and the TOML subset parser that
//! loads it.

pub mod toml;
pub mod types;

pub use self::toml::{parse_config, ParseError};
pub use types::*;
