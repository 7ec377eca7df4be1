use crate::types::{DeltaTimeUnit, EmissionsError, EmissionsResult, Timestamp, TimestampGrid};
use chrono::Duration;
use ndarray::{Array1, Array2};

/// Offset of one scanline from the time reference, rounded to microseconds
pub fn line_offset(delta: f64, unit: DeltaTimeUnit) -> EmissionsResult<Duration> {
    if !delta.is_finite() {
        return Err(EmissionsError::SourceFormat(format!(
            "Non-finite delta_time {}",
            delta
        )));
    }
    let micros = (delta * unit.microseconds_per_unit()).round();
    if micros.abs() > i64::MAX as f64 {
        return Err(EmissionsError::SourceFormat(format!(
            "delta_time {} {} out of range",
            delta, unit
        )));
    }
    Ok(Duration::microseconds(micros as i64))
}

/// Expand per-scanline delta times into one timestamp per pixel.
///
/// The instrument reports one time per scanline, so all pixels of a line
/// share the same timestamp.
pub fn reconstruct_timestamps(
    delta_time: &Array1<f64>,
    unit: DeltaTimeUnit,
    time_reference: Timestamp,
    pixels: usize,
) -> EmissionsResult<TimestampGrid> {
    let line_times = delta_time
        .iter()
        .map(|&delta| {
            let offset = line_offset(delta, unit)?;
            time_reference.checked_add_signed(offset).ok_or_else(|| {
                EmissionsError::SourceFormat(format!("delta_time {} overflows the time range", delta))
            })
        })
        .collect::<EmissionsResult<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((line_times.len(), pixels), |(line, _)| {
        line_times[line]
    }))
}
