//! Tool modules for the Teabot agent.

pub mod base;
pub mod json_search;
pub mod registry;

use std::sync::Arc;

use teabot_core::config::schema::ToolsConfig;
use teabot_core::utils::expand_home;

pub use base::{Tool, ToolError};
pub use json_search::JsonSearchTool;
pub use registry::{RegistryError, ToolRegistry};

/// Build the registry from config. A search tool is only registered when
/// its backing file path is set.
pub fn registry_from_config(config: &ToolsConfig) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    if let Some(path) = &config.catalog_path {
        registry.register(Arc::new(JsonSearchTool::product_search(expand_home(path))))?;
    }
    if let Some(path) = &config.orders_path {
        registry.register(Arc::new(JsonSearchTool::order_search(expand_home(path))))?;
    }
    if let Some(path) = &config.similar_path {
        registry.register(Arc::new(JsonSearchTool::similar_products(expand_home(path))))?;
    }

    Ok(registry)
}
