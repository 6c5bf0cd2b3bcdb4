//! Preprocessing configuration
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) is valid. CLI flags override file values.
//!
//! ```toml
//! tiny_component_threshold = 10
//! large_component_threshold = 1000
//! component_algorithm = "tarjan"   # or "bfs"
//! compress_degree_two = true
//! prune_tiny_components = false
//! traffic_signal_penalty = 20
//! threads = 8
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::ComponentAlgorithm;
use crate::error::{Error, Result};
use crate::types::EdgeWeight;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepareConfig {
    /// Edges whose component has fewer nodes are flagged `IN_TINY_COMPONENT`
    pub tiny_component_threshold: u32,
    /// Components above this size are logged
    pub large_component_threshold: u32,
    pub component_algorithm: ComponentAlgorithm,
    pub compress_degree_two: bool,
    /// Drop flagged edges instead of only flagging them
    pub prune_tiny_components: bool,
    /// Added per traffic signal when merging segments (deciseconds)
    pub traffic_signal_penalty: EdgeWeight,
    /// Rayon pool size, defaults to the number of cores
    pub threads: Option<usize>,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            tiny_component_threshold: 10,
            large_component_threshold: 1000,
            component_algorithm: ComponentAlgorithm::Tarjan,
            compress_degree_two: true,
            prune_tiny_components: false,
            traffic_signal_penalty: 20,
            threads: None,
        }
    }
}

impl PrepareConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(Error::io(path, "config"))?;
        let config: PrepareConfig = toml::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tiny_component_threshold == 0 {
            return Err(Error::InvalidConfig(
                "tiny_component_threshold must be at least 1".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(Error::InvalidConfig("threads must be at least 1".to_string()));
        }
        if self.traffic_signal_penalty < 0 {
            return Err(Error::InvalidConfig(format!(
                "traffic_signal_penalty must not be negative, got {}",
                self.traffic_signal_penalty
            )));
        }
        Ok(())
    }
}
