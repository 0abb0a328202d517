//! Configuration module for vaimm
//!
//! Loads config from `$XDG_CONFIG_HOME/vaimm/config.toml` or `~/.config/vaimm/config.toml`.
//! Falls back to built-in defaults if the file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes,
//! then the `TVAI_*` environment variables are applied on top.
//!
//! # Example
//!
//! ```no_run
//! use vaimm::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Threads: {}", config.download.threads);
//! println!("Max attempts: {}", config.retry.max_attempts);
//! ```

pub mod schema;

pub use schema::Config;
