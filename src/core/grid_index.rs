//! Hierarchical hexagonal grid indexing.

use crate::config::MAX_GRID_RESOLUTION;
use crate::types::{
    CellId, EmissionsError, EmissionsResult, IndexedObservation, Observation, ObservationTable,
};
use h3o::{CellIndex, LatLng, Resolution};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Point-to-cell mapping of a hierarchical grid
pub trait GridSystem: Send + Sync {
    fn max_resolution(&self) -> u8;

    /// Deterministic cell containing the point
    fn geo_to_cell(&self, longitude: f64, latitude: f64, resolution: u8) -> EmissionsResult<CellId>;

    /// Center of a cell as (longitude, latitude)
    fn cell_center(&self, cell: CellId) -> EmissionsResult<(f64, f64)>;
}

/// Uber H3 grid
#[derive(Debug, Clone, Copy, Default)]
pub struct H3Grid;

impl H3Grid {
    fn resolution(resolution: u8) -> EmissionsResult<Resolution> {
        Resolution::try_from(resolution)
            .map_err(|e| EmissionsError::Grid(format!("resolution {}: {}", resolution, e)))
    }
}

impl GridSystem for H3Grid {
    fn max_resolution(&self) -> u8 {
        MAX_GRID_RESOLUTION
    }

    fn geo_to_cell(&self, longitude: f64, latitude: f64, resolution: u8) -> EmissionsResult<CellId> {
        let resolution = Self::resolution(resolution)?;
        let point = LatLng::new(latitude, longitude).map_err(|e| {
            EmissionsError::Grid(format!("({}, {}): {}", longitude, latitude, e))
        })?;
        Ok(CellId(u64::from(point.to_cell(resolution))))
    }

    fn cell_center(&self, cell: CellId) -> EmissionsResult<(f64, f64)> {
        let index = CellIndex::try_from(cell.0)
            .map_err(|e| EmissionsError::Grid(format!("cell {}: {}", cell, e)))?;
        let center = LatLng::from(index);
        Ok((center.lng(), center.lat()))
    }
}

/// Assigns every observation its grid cell at one resolution
pub struct GridIndexer<G: GridSystem> {
    grid: G,
    resolution: u8,
}

impl<G: GridSystem> GridIndexer<G> {
    pub fn new(grid: G, resolution: u8) -> EmissionsResult<Self> {
        if resolution > grid.max_resolution() {
            return Err(EmissionsError::Grid(format!(
                "resolution {} exceeds maximum {}",
                resolution,
                grid.max_resolution()
            )));
        }
        Ok(Self { grid, resolution })
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    fn index_one(&self, observation: &Observation) -> EmissionsResult<IndexedObservation> {
        let cell = self
            .grid
            .geo_to_cell(observation.longitude, observation.latitude, self.resolution)?;
        Ok(IndexedObservation {
            observation: observation.clone(),
            cell,
        })
    }

    /// Index a table; output order equals input order
    pub fn index(&self, table: &ObservationTable) -> EmissionsResult<Vec<IndexedObservation>> {
        log::debug!(
            "Indexing {} observations at resolution {}",
            table.len(),
            self.resolution
        );

        #[cfg(feature = "parallel")]
        let indexed = table
            .as_slice()
            .par_iter()
            .map(|obs| self.index_one(obs))
            .collect::<EmissionsResult<Vec<_>>>();

        #[cfg(not(feature = "parallel"))]
        let indexed = table
            .iter()
            .map(|obs| self.index_one(obs))
            .collect::<EmissionsResult<Vec<_>>>();

        indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn observation(longitude: f64, latitude: f64) -> Observation {
        Observation {
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            longitude,
            latitude,
            value: 0.02,
            quality: 1.0,
        }
    }

    #[test]
    fn test_geo_to_cell_is_deterministic() {
        let grid = H3Grid;
        for resolution in [0, 5, 10, 15] {
            let a = grid.geo_to_cell(8.6821, 50.1109, resolution).unwrap();
            let b = grid.geo_to_cell(8.6821, 50.1109, resolution).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_nearby_and_distant_points() {
        let grid = H3Grid;
        let a = grid.geo_to_cell(8.6821, 50.1109, 3).unwrap();
        let b = grid.geo_to_cell(8.6822, 50.1110, 3).unwrap();
        let c = grid.geo_to_cell(-122.4194, 37.7749, 3).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cell_center_falls_in_cell() {
        let grid = H3Grid;
        let cell = grid.geo_to_cell(13.405, 52.52, 6).unwrap();
        let (lon, lat) = grid.cell_center(cell).unwrap();
        assert_eq!(grid.geo_to_cell(lon, lat, 6).unwrap(), cell);
        assert!(grid.cell_center(CellId(0)).is_err());
    }

    #[test]
    fn test_invalid_inputs() {
        let grid = H3Grid;
        assert!(matches!(
            grid.geo_to_cell(0.0, 0.0, 16),
            Err(EmissionsError::Grid(_))
        ));
        assert!(matches!(
            grid.geo_to_cell(f64::NAN, 0.0, 4),
            Err(EmissionsError::Grid(_))
        ));
        assert!(GridIndexer::new(H3Grid, 16).is_err());
    }

    #[test]
    fn test_index_preserves_order() {
        let table = ObservationTable::new(vec![
            observation(0.0, 0.0),
            observation(100.0, 45.0),
            observation(0.0, 0.0),
        ]);
        let indexer = GridIndexer::new(H3Grid, 4).unwrap();
        let indexed = indexer.index(&table).unwrap();

        assert_eq!(indexed.len(), 3);
        assert_eq!(indexed[0].cell, indexed[2].cell);
        assert_ne!(indexed[0].cell, indexed[1].cell);
        assert_eq!(indexed[1].observation.longitude, 100.0);
    }
}
