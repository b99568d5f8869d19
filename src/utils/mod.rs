//! Environment variable helpers.

pub mod env;

pub use env::{ENV_PREFIX, env_flag, get_env_with_prefix};
