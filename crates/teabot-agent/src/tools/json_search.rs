//! Search tools over flat JSON arrays of records.
//!
//! Each tool matches a case-insensitive substring against one key field and
//! renders every matching record as `field: value` lines tagged
//! `[doc N]`, N being the record's 1-based position in the file. The file is
//! re-read on every call, so edits show up without a restart.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::base::{Tool, ToolError};

/// A substring search over one JSON file.
pub struct JsonSearchTool {
    name: String,
    description: String,
    path: PathBuf,
    key_field: &'static str,
    fields: &'static [&'static str],
}

impl JsonSearchTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        path: impl Into<PathBuf>,
        key_field: &'static str,
        fields: &'static [&'static str],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            path: path.into(),
            key_field,
            fields,
        }
    }

    /// Product catalog lookup by product name.
    pub fn product_search(path: impl Into<PathBuf>) -> Self {
        Self::new(
            "product_search",
            "Look up products by name. Input: the product name or part of it \
             (e.g. 'Earl Grey'). Returns name, description and price.",
            path,
            "name",
            &["name", "description", "price"],
        )
    }

    /// Order lookup by order number.
    pub fn order_search(path: impl Into<PathBuf>) -> Self {
        Self::new(
            "order_search",
            "Look up an order by its order number. Input: the order number. \
             Returns status, customer, total and delivery date.",
            path,
            "order_number",
            &["order_number", "status", "customer", "total", "delivery_date"],
        )
    }

    /// Recommendations of products similar to a given one.
    pub fn similar_products(path: impl Into<PathBuf>) -> Self {
        Self::new(
            "similar_products",
            "Find products similar to a given product. Input: the product name.",
            path,
            "product_name",
            &["product_name", "similar_products"],
        )
    }

    async fn load_records(&self) -> Result<Vec<Value>, ToolError> {
        let path = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ToolError::Io {
                path: path.clone(),
                source,
            })?;

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(records)) => Ok(records),
            Ok(_) => Err(ToolError::Malformed {
                path,
                reason: "top-level value is not an array".to_string(),
            }),
            Err(e) => Err(ToolError::Malformed {
                path,
                reason: e.to_string(),
            }),
        }
    }

    fn render(&self, position: usize, record: &Value) -> String {
        let lines: Vec<String> = self
            .fields
            .iter()
            .filter_map(|field| {
                record
                    .get(field)
                    .filter(|v| !v.is_null())
                    .map(|v| format!("{field}: {}", render_value(v)))
            })
            .collect();
        format!("[doc {position}] {}", lines.join("\n"))
    }
}

#[async_trait]
impl Tool for JsonSearchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: &str) -> Result<String, ToolError> {
        let query = normalize_query(input)?;
        let records = self.load_records().await?;

        let matches: Vec<String> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                record
                    .get(self.key_field)
                    .map(|v| render_value(v).to_lowercase().contains(&query))
                    .unwrap_or(false)
            })
            .map(|(idx, record)| self.render(idx + 1, record))
            .collect();

        debug!(
            tool = %self.name,
            query = %query,
            records = records.len(),
            matches = matches.len(),
            "json search"
        );
        Ok(matches.join("\n"))
    }
}

/// Trim, drop wrapping quotes the model likes to add, and lowercase.
fn normalize_query(input: &str) -> Result<String, ToolError> {
    let mut query = input.trim();
    for quote in ['"', '\'', '`'] {
        if query.len() >= 2 && query.starts_with(quote) && query.ends_with(quote) {
            query = query[1..query.len() - 1].trim();
        }
    }
    if query.is_empty() {
        return Err(ToolError::InvalidInput("search query is empty".to_string()));
    }
    Ok(query.to_lowercase())
}

/// Strings as-is, arrays comma-joined, everything else via `to_string`.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
