use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute observation time
pub type Timestamp = DateTime<Utc>;

/// 2D per-pixel field (scanline x ground pixel)
pub type ScanField = Array2<f64>;

/// Per-pixel timestamps (scanline x ground pixel)
pub type TimestampGrid = Array2<Timestamp>;

/// Unit of the per-scanline `delta_time` variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaTimeUnit {
    Milliseconds,
    Microseconds,
}

impl DeltaTimeUnit {
    /// Parse a CF-style units string such as `"milliseconds since 2019-04-08 00:00:00"`
    pub fn from_units(units: &str) -> Option<Self> {
        let unit = units.trim().split_whitespace().next()?.to_ascii_lowercase();
        match unit.as_str() {
            "ms" | "millisecond" | "milliseconds" => Some(DeltaTimeUnit::Milliseconds),
            "us" | "µs" | "microsecond" | "microseconds" => Some(DeltaTimeUnit::Microseconds),
            _ => None,
        }
    }

    /// Number of microseconds in one unit
    pub fn microseconds_per_unit(&self) -> f64 {
        match self {
            DeltaTimeUnit::Milliseconds => 1_000.0,
            DeltaTimeUnit::Microseconds => 1.0,
        }
    }
}

impl Default for DeltaTimeUnit {
    fn default() -> Self {
        DeltaTimeUnit::Milliseconds
    }
}

impl fmt::Display for DeltaTimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaTimeUnit::Milliseconds => write!(f, "milliseconds"),
            DeltaTimeUnit::Microseconds => write!(f, "microseconds"),
        }
    }
}

/// Scan-level attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    /// Scan start, all delta times are relative to this
    pub time_reference: Timestamp,
    pub lines: usize,
    pub pixels: usize,
    pub delta_time_unit: DeltaTimeUnit,
}

/// Aligned raw arrays of one scan product
#[derive(Debug, Clone)]
pub struct RawFieldSet {
    pub value: ScanField,
    pub longitude: ScanField,
    pub latitude: ScanField,
    pub quality: ScanField,
    /// One entry per scanline
    pub delta_time: Array1<f64>,
    /// True where the measurement holds real data
    pub valid: Array2<bool>,
}

impl RawFieldSet {
    /// Assemble a field set, checking that all arrays are aligned
    pub fn new(
        value: ScanField,
        longitude: ScanField,
        latitude: ScanField,
        quality: ScanField,
        delta_time: Array1<f64>,
        valid: Array2<bool>,
    ) -> EmissionsResult<Self> {
        let shape = value.dim();
        for (name, dim) in [
            ("longitude", longitude.dim()),
            ("latitude", latitude.dim()),
            ("qa_value", quality.dim()),
            ("validity mask", valid.dim()),
        ] {
            if dim != shape {
                return Err(EmissionsError::SourceFormat(format!(
                    "{} has shape {:?}, expected {:?}",
                    name, dim, shape
                )));
            }
        }
        if delta_time.len() != shape.0 {
            return Err(EmissionsError::SourceFormat(format!(
                "delta_time has {} entries for {} scanlines",
                delta_time.len(),
                shape.0
            )));
        }

        Ok(Self {
            value,
            longitude,
            latitude,
            quality,
            delta_time,
            valid,
        })
    }

    /// (scanlines, ground pixels)
    pub fn dim(&self) -> (usize, usize) {
        self.value.dim()
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}

/// One valid ground pixel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: Timestamp,
    pub longitude: f64,
    pub latitude: f64,
    pub value: f64,
    pub quality: f64,
}

/// Geospatial bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Observations of one scan in row-major pixel order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationTable {
    rows: Vec<Observation>,
}

impl ObservationTable {
    pub fn new(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.rows.iter()
    }

    pub fn as_slice(&self) -> &[Observation] {
        &self.rows
    }

    pub fn into_inner(self) -> Vec<Observation> {
        self.rows
    }

    /// Geographic extent of the table, `None` when empty
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.rows.first()?;
        let init = BoundingBox {
            min_lon: first.longitude,
            max_lon: first.longitude,
            min_lat: first.latitude,
            max_lat: first.latitude,
        };
        Some(self.rows.iter().fold(init, |bbox, obs| BoundingBox {
            min_lon: bbox.min_lon.min(obs.longitude),
            max_lon: bbox.max_lon.max(obs.longitude),
            min_lat: bbox.min_lat.min(obs.latitude),
            max_lat: bbox.max_lat.max(obs.latitude),
        }))
    }
}

impl From<Vec<Observation>> for ObservationTable {
    fn from(rows: Vec<Observation>) -> Self {
        Self::new(rows)
    }
}

impl IntoIterator for ObservationTable {
    type Item = Observation;
    type IntoIter = std::vec::IntoIter<Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ObservationTable {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Opaque grid cell token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u64);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Observation with its grid cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedObservation {
    pub observation: Observation,
    pub cell: CellId,
}

/// Reduction of all observations sharing one cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedCell {
    pub cell: CellId,
    /// Earliest contributing timestamp
    pub timestamp: Timestamp,
    /// Worst contributing quality
    pub quality: f64,
    pub value: f64,
    /// Number of contributing observations
    pub count: usize,
}

/// Error types for scan reduction
#[derive(Debug, thiserror::Error)]
pub enum EmissionsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid source format: {0}")]
    SourceFormat(String),

    #[error("Time reference not found under any of {0:?}")]
    MetadataMissing(Vec<String>),

    #[error("Minimal quality {0} is outside [0.0, 1.0]")]
    InvalidThreshold(f64),

    #[error("Unsupported aggregation function '{0}', expected 'mean' or 'median'")]
    InvalidAggregationFunction(String),

    #[error("Insufficient data: {found} observations, at least {required} required")]
    InsufficientData { found: usize, required: usize },

    #[error("Grid error: {0}")]
    Grid(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for scan reduction
pub type EmissionsResult<T> = Result<T, EmissionsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::array;

    fn obs(lon: f64, lat: f64) -> Observation {
        Observation {
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            longitude: lon,
            latitude: lat,
            value: 1.0,
            quality: 1.0,
        }
    }

    #[test]
    fn test_delta_time_units() {
        assert_eq!(
            DeltaTimeUnit::from_units("milliseconds since 2019-04-08 00:00:00"),
            Some(DeltaTimeUnit::Milliseconds)
        );
        assert_eq!(
            DeltaTimeUnit::from_units("microseconds"),
            Some(DeltaTimeUnit::Microseconds)
        );
        assert_eq!(DeltaTimeUnit::from_units("fortnights"), None);
        assert_eq!(DeltaTimeUnit::from_units(""), None);
    }

    #[test]
    fn test_raw_field_set_shape_check() {
        let field = array![[1.0, 2.0], [3.0, 4.0]];
        let mask = Array2::from_elem((2, 2), true);

        let ok = RawFieldSet::new(
            field.clone(),
            field.clone(),
            field.clone(),
            field.clone(),
            array![0.0, 1.0],
            mask.clone(),
        );
        assert!(ok.is_ok());
        assert_eq!(ok.unwrap().valid_count(), 4);

        let bad_lat = RawFieldSet::new(
            field.clone(),
            field.clone(),
            array![[1.0, 2.0]],
            field.clone(),
            array![0.0, 1.0],
            mask.clone(),
        );
        assert!(matches!(bad_lat, Err(EmissionsError::SourceFormat(_))));

        let bad_time = RawFieldSet::new(
            field.clone(),
            field.clone(),
            field.clone(),
            field,
            array![0.0],
            mask,
        );
        assert!(matches!(bad_time, Err(EmissionsError::SourceFormat(_))));
    }

    #[test]
    fn test_bounding_box() {
        assert!(ObservationTable::default().bounding_box().is_none());

        let table = ObservationTable::new(vec![obs(10.0, -5.0), obs(-3.0, 7.5), obs(2.0, 0.0)]);
        let bbox = table.bounding_box().unwrap();
        assert_eq!(bbox.min_lon, -3.0);
        assert_eq!(bbox.max_lon, 10.0);
        assert_eq!(bbox.min_lat, -5.0);
        assert_eq!(bbox.max_lat, 7.5);
    }

    #[test]
    fn test_cell_id_display() {
        assert_eq!(CellId(0x8a1fb46622dffff).to_string(), "8a1fb46622dffff");
    }
}
