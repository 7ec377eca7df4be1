//! Emissions: reduction of Sentinel-5P trace-gas scans
//!
//! This library turns the per-pixel measurements of a scan product into a
//! quality-filtered, H3-indexed and per-cell aggregated dataset, and offers a
//! density-based clustering pass for plume detection.
//!
//! ```no_run
//! use emissions::{PipelineConfig, ScanPipeline};
//! use emissions::io::InMemoryProduct;
//!
//! let pipeline = ScanPipeline::new(PipelineConfig::default()).unwrap();
//! let reduction = pipeline.run(&InMemoryProduct::new("scan")).unwrap();
//! println!("{} cells", reduction.cells.len());
//! ```

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AggregatedCell, BoundingBox, CellId, DeltaTimeUnit, EmissionsError, EmissionsResult,
    IndexedObservation, Observation, ObservationTable, RawFieldSet, ScanMetadata,
};
pub use config::{AggregationParams, ClusteringParams, GridParams, PipelineConfig, QualityParams};

pub use io::{extract_scan, InMemoryProduct, ProductReader, Variable};
#[cfg(feature = "gdal")]
pub use io::GdalProductReader;
pub use crate::core::{
    AggregationFunction, ClusterDetector, ClusteringReport, GridSystem, H3Grid, QualityFilter,
    ScanPipeline, ScanReduction,
};
