//! Completion provider layer for Teabot.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — trait that all providers implement
//! - [`registry`] — static specs for the supported providers + matching logic
//! - [`http_provider::HttpProvider`] — generic OpenAI-compatible HTTP client
//! - [`http_provider::create_provider`] — convenience builder from model name + config
//! - [`oauth::TokenSource`] — cached access tokens for key-exchange providers

pub mod http_provider;
pub mod oauth;
pub mod registry;
pub mod traits;

pub use http_provider::{create_provider, HttpProvider};
pub use registry::{AuthScheme, ProviderConfig, ProviderSpec, PROVIDERS};
pub use traits::{LlmProvider, LlmRequestConfig, ProviderError};
