//! Teabot core — shared types, configuration, conversation memory, and the
//! conversation transcript log.

pub mod config;
pub mod session;
pub mod transcript;
pub mod types;
pub mod utils;
