//! Index configuration.

use crate::error::{HcqrError, Result};
use crate::grid::Level;
use crate::index::types::QueryType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Grid backend selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridConfig {
    /// Registry name of the backend
    pub kind: String,
    /// Deepest level the grid subdivides to
    pub max_level: Level,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            kind: "quad".to_string(),
            max_level: 12,
        }
    }
}

/// Configuration of an HCQR index stack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Completion type for query strings without explicit markers
    pub default_query_type: QueryType,
    /// Per-pixel item cache capacity of the cell-index adapter
    pub pixel_cache_size: usize,
    /// Cache-by-query capacity (0 disables the layer)
    pub query_cache_size: usize,
    /// Compactify results on read, merging partial matches below this level
    pub compactify_level: Option<Level>,
    /// Convert results to the compact binary representation on read
    pub make_static: bool,
    /// Grid backend for configurations that do not supply their own grid
    pub grid: GridConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            default_query_type: QueryType::EXACT | QueryType::PREFIX,
            pixel_cache_size: 4096,
            query_cache_size: 256,
            compactify_level: None,
            make_static: false,
            grid: GridConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(content)
            .map_err(|e| HcqrError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_query_type.is_empty() {
            return Err(HcqrError::Config(
                "default_query_type must set at least one completion type".to_string(),
            ));
        }
        if self.pixel_cache_size == 0 {
            return Err(HcqrError::Config("pixel_cache_size must be positive".to_string()));
        }
        Ok(())
    }
}
