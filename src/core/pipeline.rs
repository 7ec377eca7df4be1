//! Single-scan reduction: extract, timestamp, tabulate, filter, index, aggregate.

use crate::config::PipelineConfig;
use crate::core::aggregate::{aggregate_cells, AggregationFunction};
use crate::core::clustering::{ClusterDetector, ClusteringReport};
use crate::core::grid_index::{GridIndexer, GridSystem, H3Grid};
use crate::core::point_table::build_observation_table;
use crate::core::quality_filter::QualityFilter;
use crate::core::timestamps::reconstruct_timestamps;
use crate::io::extractor::extract_scan;
use crate::io::product::ProductReader;
use crate::types::{AggregatedCell, EmissionsResult, IndexedObservation, ScanMetadata};
use std::time::Instant;

#[cfg(feature = "gdal")]
use crate::io::gdal_reader::GdalProductReader;
#[cfg(all(feature = "gdal", feature = "parallel"))]
use rayon::prelude::*;
#[cfg(feature = "gdal")]
use std::path::{Path, PathBuf};

/// Log handle of one pipeline run; every record carries the run label
#[derive(Debug, Clone)]
pub struct RunLog {
    label: String,
}

impl RunLog {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn info(&self, message: std::fmt::Arguments<'_>) {
        log::info!("[{}] {}", self.label, message);
    }

    pub fn debug(&self, message: std::fmt::Arguments<'_>) {
        log::debug!("[{}] {}", self.label, message);
    }

    pub fn warn(&self, message: std::fmt::Arguments<'_>) {
        log::warn!("[{}] {}", self.label, message);
    }
}

/// Result of reducing one scan
#[derive(Debug, Clone)]
pub struct ScanReduction {
    pub metadata: ScanMetadata,
    /// Valid pixels before quality filtering
    pub observation_count: usize,
    /// Observations that passed the quality filter, with their cells
    pub observations: Vec<IndexedObservation>,
    pub cells: Vec<AggregatedCell>,
}

impl ScanReduction {
    pub fn retained_count(&self) -> usize {
        self.observations.len()
    }
}

/// Configured reduction pipeline
pub struct ScanPipeline<G: GridSystem = H3Grid> {
    filter: QualityFilter,
    indexer: GridIndexer<G>,
    function: AggregationFunction,
    config: PipelineConfig,
}

impl ScanPipeline<H3Grid> {
    /// Pipeline over the H3 grid
    pub fn new(config: PipelineConfig) -> EmissionsResult<Self> {
        Self::with_grid(config, H3Grid)
    }
}

impl<G: GridSystem> ScanPipeline<G> {
    /// Validates the whole configuration before any data is touched
    pub fn with_grid(config: PipelineConfig, grid: G) -> EmissionsResult<Self> {
        config.validate()?;
        Ok(Self {
            filter: QualityFilter::new(config.quality.minimal_quality)?,
            indexer: GridIndexer::new(grid, config.grid.resolution)?,
            function: config.aggregation.function.parse()?,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn indexer(&self) -> &GridIndexer<G> {
        &self.indexer
    }

    /// Reduce one product
    pub fn run<R: ProductReader>(&self, reader: &R) -> EmissionsResult<ScanReduction> {
        let log = RunLog::new(reader.describe());
        log.info(format_args!(
            "Starting reduction (quality >= {}, resolution {}, {})",
            self.filter.minimal_quality(),
            self.indexer.resolution(),
            self.function
        ));
        let start_time = Instant::now();

        let (fields, metadata) = extract_scan(reader)?;
        log.debug(format_args!(
            "Scan {} x {}, reference {}",
            metadata.lines, metadata.pixels, metadata.time_reference
        ));

        let timestamps = reconstruct_timestamps(
            &fields.delta_time,
            metadata.delta_time_unit,
            metadata.time_reference,
            metadata.pixels,
        )?;
        let table = build_observation_table(&fields, &timestamps)?;
        drop(fields);
        let observation_count = table.len();

        let table = self.filter.apply_table(table);
        if table.is_empty() {
            log.warn(format_args!(
                "No observation passed quality {} ({} valid pixels)",
                self.filter.minimal_quality(),
                observation_count
            ));
        }

        let observations = self.indexer.index(&table)?;
        let cells = aggregate_cells(&observations, self.function);

        log.info(format_args!(
            "Reduced {} valid pixels to {} observations in {} cells in {:?}",
            observation_count,
            observations.len(),
            cells.len(),
            start_time.elapsed()
        ));

        Ok(ScanReduction {
            metadata,
            observation_count,
            observations,
            cells,
        })
    }

    /// Run the cluster detector on a product instead of the reduction.
    ///
    /// Fields come from the same extraction as [`ScanPipeline::run`], so a
    /// product without a time reference fails with `MetadataMissing`.
    pub fn detect_clusters<R: ProductReader>(&self, reader: &R) -> EmissionsResult<ClusteringReport> {
        let detector = ClusterDetector::new(self.config.clustering.clone())?;
        let (fields, _) = extract_scan(reader)?;
        detector.detect(&fields)
    }

    /// Reduce one product file through GDAL
    #[cfg(feature = "gdal")]
    pub fn run_file<P: AsRef<Path>>(&self, path: P) -> EmissionsResult<ScanReduction> {
        let reader = GdalProductReader::new(path)?;
        self.run(&reader)
    }

    /// Reduce independent product files, one result per file.
    ///
    /// Files run in parallel with the `parallel` feature.
    #[cfg(feature = "gdal")]
    pub fn process_files(&self, paths: &[PathBuf]) -> Vec<(PathBuf, EmissionsResult<ScanReduction>)> {
        log::info!("Processing {} files", paths.len());
        let reduce = |path: &PathBuf| (path.clone(), self.run_file(path));

        #[cfg(feature = "parallel")]
        let results: Vec<_> = paths.par_iter().map(reduce).collect();

        #[cfg(not(feature = "parallel"))]
        let results: Vec<_> = paths.iter().map(reduce).collect();

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        for (path, result) in &results {
            if let Err(e) = result {
                log::error!("Failed to process {}: {}", path.display(), e);
            }
        }
        log::info!(
            "Completed {} files, {} failed",
            results.len() - failed,
            failed
        );
        results
    }
}
