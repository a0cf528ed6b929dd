//! Configuration system — schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use teabot_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Model: {}", cfg.agent.model);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config};
pub use schema::Config;
