use crate::types::{AggregatedCell, CellId, EmissionsError, EmissionsResult, IndexedObservation, Timestamp};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Statistic used to reduce the values of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunction {
    Mean,
    Median,
}

impl FromStr for AggregationFunction {
    type Err = EmissionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(AggregationFunction::Mean),
            "median" => Ok(AggregationFunction::Median),
            other => Err(EmissionsError::InvalidAggregationFunction(other.to_string())),
        }
    }
}

impl fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationFunction::Mean => write!(f, "mean"),
            AggregationFunction::Median => write!(f, "median"),
        }
    }
}

impl AggregationFunction {
    /// Reduce a non-empty set of values; reorders `values` for the median
    pub fn reduce<T: Float>(&self, values: &mut [T]) -> T {
        match self {
            AggregationFunction::Mean => mean(values),
            AggregationFunction::Median => median(values),
        }
    }
}

fn mean<T: Float>(values: &[T]) -> T {
    let sum = values.iter().fold(T::zero(), |acc, &v| acc + v);
    sum / T::from(values.len()).unwrap_or_else(T::nan)
}

fn median<T: Float>(values: &mut [T]) -> T {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / (T::one() + T::one())
    }
}

struct CellAccumulator {
    timestamp: Timestamp,
    quality: f64,
    values: Vec<f64>,
}

/// Reduce observations to one row per distinct cell.
///
/// Timestamp and quality take the minimum over the cell, the value uses `function`.
/// Rows are returned sorted by cell id.
pub fn aggregate_cells(
    observations: &[IndexedObservation],
    function: AggregationFunction,
) -> Vec<AggregatedCell> {
    let mut groups: HashMap<CellId, CellAccumulator> = HashMap::new();

    for item in observations {
        let obs = &item.observation;
        groups
            .entry(item.cell)
            .and_modify(|acc| {
                acc.timestamp = acc.timestamp.min(obs.timestamp);
                acc.quality = acc.quality.min(obs.quality);
                acc.values.push(obs.value);
            })
            .or_insert_with(|| CellAccumulator {
                timestamp: obs.timestamp,
                quality: obs.quality,
                values: vec![obs.value],
            });
    }

    let mut cells: Vec<AggregatedCell> = groups
        .into_iter()
        .map(|(cell, mut acc)| AggregatedCell {
            cell,
            timestamp: acc.timestamp,
            quality: acc.quality,
            value: function.reduce(&mut acc.values),
            count: acc.values.len(),
        })
        .collect();
    cells.sort_by_key(|c| c.cell);

    log::debug!(
        "Aggregated {} observations into {} cells ({})",
        observations.len(),
        cells.len(),
        function
    );
    cells
}

/// Aggregate with the function given by name; unknown names fail before any grouping
pub fn aggregate_cells_by_name(
    observations: &[IndexedObservation],
    function: &str,
) -> EmissionsResult<Vec<AggregatedCell>> {
    let function: AggregationFunction = function.parse()?;
    Ok(aggregate_cells(observations, function))
}
