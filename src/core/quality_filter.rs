use crate::types::{
    EmissionsError, EmissionsResult, IndexedObservation, Observation, ObservationTable,
};

/// Anything carrying a per-pixel quality score
pub trait Qualified {
    fn quality(&self) -> f64;
}

impl Qualified for Observation {
    fn quality(&self) -> f64 {
        self.quality
    }
}

impl Qualified for IndexedObservation {
    fn quality(&self) -> f64 {
        self.observation.quality
    }
}

/// Drops observations below a minimal quality score
#[derive(Debug, Clone, Copy)]
pub struct QualityFilter {
    minimal_quality: f64,
}

impl QualityFilter {
    /// Threshold must lie in [0.0, 1.0]
    pub fn new(minimal_quality: f64) -> EmissionsResult<Self> {
        if !(0.0..=1.0).contains(&minimal_quality) {
            return Err(EmissionsError::InvalidThreshold(minimal_quality));
        }
        Ok(Self { minimal_quality })
    }

    pub fn minimal_quality(&self) -> f64 {
        self.minimal_quality
    }

    pub fn accepts<T: Qualified>(&self, item: &T) -> bool {
        item.quality() >= self.minimal_quality
    }

    /// Keep items with `quality >= minimal_quality`, preserving order
    pub fn apply<T: Qualified>(&self, items: Vec<T>) -> Vec<T> {
        let before = items.len();
        let kept: Vec<T> = items.into_iter().filter(|item| self.accepts(item)).collect();
        log::debug!(
            "Quality filter {:.2}: kept {} of {} observations",
            self.minimal_quality,
            kept.len(),
            before
        );
        kept
    }

    pub fn apply_table(&self, table: ObservationTable) -> ObservationTable {
        ObservationTable::new(self.apply(table.into_inner()))
    }
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            minimal_quality: 0.5,
        }
    }
}

/// Filter a table in one call
pub fn filter_by_quality(
    table: ObservationTable,
    minimal_quality: f64,
) -> EmissionsResult<ObservationTable> {
    Ok(QualityFilter::new(minimal_quality)?.apply_table(table))
}
