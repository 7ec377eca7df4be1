//! Configuration types for the reduction pipeline.

use crate::core::aggregate::AggregationFunction;
use crate::core::clustering::FeatureScaling;
use crate::types::{EmissionsError, EmissionsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest H3 resolution
pub const MAX_GRID_RESOLUTION: u8 = 15;

/// Quality filtering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityParams {
    /// Minimal accepted `qa_value`. The product readme recommends 0.5.
    #[serde(default = "default_minimal_quality")]
    pub minimal_quality: f64,
}

fn default_minimal_quality() -> f64 {
    0.5
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            minimal_quality: default_minimal_quality(),
        }
    }
}

/// Grid indexing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    #[serde(default = "default_resolution")]
    pub resolution: u8,
}

fn default_resolution() -> u8 {
    5
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
        }
    }
}

/// Cell aggregation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationParams {
    /// `"mean"` or `"median"`
    #[serde(default = "default_function")]
    pub function: String,
}

fn default_function() -> String {
    "mean".to_string()
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            function: default_function(),
        }
    }
}

/// Density clustering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParams {
    /// Neighbourhood radius in feature space
    #[serde(default = "default_eps")]
    pub eps: f64,

    /// Neighbours (including the point itself) needed for a core point
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    #[serde(default)]
    pub scaling: FeatureScaling,

    /// Upper bound on points used for the silhouette score
    #[serde(default = "default_max_silhouette_samples")]
    pub max_silhouette_samples: usize,
}

fn default_eps() -> f64 {
    0.5
}

fn default_min_samples() -> usize {
    5
}

fn default_max_silhouette_samples() -> usize {
    10_000
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_samples: default_min_samples(),
            scaling: FeatureScaling::default(),
            max_silhouette_samples: default_max_silhouette_samples(),
        }
    }
}

impl ClusteringParams {
    pub fn validate(&self) -> EmissionsResult<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(EmissionsError::Config(format!(
                "clustering eps must be positive, got {}",
                self.eps
            )));
        }
        if self.min_samples == 0 {
            return Err(EmissionsError::Config(
                "clustering min_samples must be at least 1".to_string(),
            ));
        }
        if self.max_silhouette_samples < 2 {
            return Err(EmissionsError::Config(
                "max_silhouette_samples must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub quality: QualityParams,

    #[serde(default)]
    pub grid: GridParams,

    #[serde(default)]
    pub aggregation: AggregationParams,

    #[serde(default)]
    pub clustering: ClusteringParams,
}

impl PipelineConfig {
    /// Parse configuration from a JSON document
    pub fn from_json(content: &str) -> EmissionsResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| EmissionsError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> EmissionsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> EmissionsResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| EmissionsError::Config(format!("Failed to serialize configuration: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every parameter; run before any data is read
    pub fn validate(&self) -> EmissionsResult<()> {
        let q = self.quality.minimal_quality;
        if !(0.0..=1.0).contains(&q) {
            return Err(EmissionsError::InvalidThreshold(q));
        }
        if self.grid.resolution > MAX_GRID_RESOLUTION {
            return Err(EmissionsError::Grid(format!(
                "resolution {} exceeds maximum {}",
                self.grid.resolution, MAX_GRID_RESOLUTION
            )));
        }
        self.aggregation.function.parse::<AggregationFunction>()?;
        self.clustering.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.quality.minimal_quality, 0.5);
        assert_eq!(config.aggregation.function, "mean");
        assert_eq!(config.clustering.min_samples, 5);
        assert_eq!(config.clustering.scaling, FeatureScaling::Standardize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json(
            r#"{ "grid": { "resolution": 7 }, "aggregation": { "function": "median" } }"#,
        )
        .unwrap();
        assert_eq!(config.grid.resolution, 7);
        assert_eq!(config.aggregation.function, "median");
        assert_eq!(config.quality.minimal_quality, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.quality.minimal_quality = 1.5;
        assert!(matches!(
            config.validate(),
            Err(EmissionsError::InvalidThreshold(_))
        ));

        let mut config = PipelineConfig::default();
        config.aggregation.function = "max".to_string();
        assert!(matches!(
            config.validate(),
            Err(EmissionsError::InvalidAggregationFunction(_))
        ));

        let mut config = PipelineConfig::default();
        config.grid.resolution = 16;
        assert!(matches!(config.validate(), Err(EmissionsError::Grid(_))));

        let mut config = PipelineConfig::default();
        config.clustering.eps = 0.0;
        assert!(matches!(config.validate(), Err(EmissionsError::Config(_))));
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");

        let mut config = PipelineConfig::default();
        config.clustering.scaling = FeatureScaling::Raw;
        config.to_json_file(&path).unwrap();

        let loaded = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            PipelineConfig::from_json("{ not json"),
            Err(EmissionsError::Config(_))
        ));
    }
}
