//! Core reduction modules

pub mod timestamps;
pub mod point_table;
pub mod quality_filter;
pub mod grid_index;
pub mod aggregate;
pub mod clustering;
pub mod pipeline;

// Re-export main types
pub use timestamps::reconstruct_timestamps;
pub use point_table::build_observation_table;
pub use quality_filter::{QualityFilter, Qualified, filter_by_quality};
pub use grid_index::{GridIndexer, GridSystem, H3Grid};
pub use aggregate::{AggregationFunction, aggregate_cells, aggregate_cells_by_name};
pub use clustering::{ClusterDetector, ClusteringReport, ClusterAssignment, FeatureScaling};
pub use pipeline::{ScanPipeline, ScanReduction, RunLog};
