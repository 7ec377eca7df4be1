use crate::types::{
    EmissionsError, EmissionsResult, Observation, ObservationTable, RawFieldSet, TimestampGrid,
};

/// Fuse the raw fields and pixel timestamps into a table of valid observations.
///
/// Pixels are visited in row-major order so the output order is stable.
pub fn build_observation_table(
    fields: &RawFieldSet,
    timestamps: &TimestampGrid,
) -> EmissionsResult<ObservationTable> {
    if timestamps.dim() != fields.dim() {
        return Err(EmissionsError::SourceFormat(format!(
            "timestamp grid {:?} does not match field shape {:?}",
            timestamps.dim(),
            fields.dim()
        )));
    }

    let mut rows = Vec::with_capacity(fields.valid_count());
    for ((idx, &valid), &value) in fields.valid.indexed_iter().zip(fields.value.iter()) {
        if !valid {
            continue;
        }
        rows.push(Observation {
            timestamp: timestamps[idx],
            longitude: fields.longitude[idx],
            latitude: fields.latitude[idx],
            value,
            quality: fields.quality[idx],
        });
    }

    log::debug!(
        "Built observation table: {} of {} pixels valid",
        rows.len(),
        fields.valid.len()
    );
    Ok(ObservationTable::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timestamps::reconstruct_timestamps;
    use crate::types::DeltaTimeUnit;
    use chrono::{Duration, TimeZone, Utc};
    use ndarray::{array, Array2};

    fn fields(valid: Array2<bool>) -> RawFieldSet {
        RawFieldSet::new(
            array![[1.0, 2.0], [3.0, 4.0]],
            array![[10.0, 11.0], [12.0, 13.0]],
            array![[-1.0, -2.0], [-3.0, -4.0]],
            array![[0.1, 0.2], [0.3, 0.4]],
            array![0.0, 500.0],
            valid,
        )
        .unwrap()
    }

    #[test]
    fn test_row_major_valid_pixels() {
        let fields = fields(array![[true, false], [true, true]]);
        let reference = Utc.timestamp_opt(0, 0).unwrap();
        let times = reconstruct_timestamps(&fields.delta_time, DeltaTimeUnit::Milliseconds, reference, 2)
            .unwrap();

        let table = build_observation_table(&fields, &times).unwrap();
        assert_eq!(table.len(), fields.valid_count());

        let values: Vec<f64> = table.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![1.0, 3.0, 4.0]);

        let second = &table.as_slice()[1];
        assert_eq!(second.longitude, 12.0);
        assert_eq!(second.latitude, -3.0);
        assert_eq!(second.quality, 0.3);
        assert_eq!(second.timestamp, reference + Duration::milliseconds(500));
    }

    #[test]
    fn test_repeated_builds_are_identical() {
        let fields = fields(array![[true, true], [false, true]]);
        let reference = Utc.timestamp_opt(1_554_681_600, 0).unwrap();
        let times = reconstruct_timestamps(&fields.delta_time, DeltaTimeUnit::Milliseconds, reference, 2)
            .unwrap();

        let first = build_observation_table(&fields, &times).unwrap();
        let second = build_observation_table(&fields, &times).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_timestamp_shape_mismatch() {
        let fields = fields(Array2::from_elem((2, 2), true));
        let reference = Utc.timestamp_opt(0, 0).unwrap();
        let times = reconstruct_timestamps(&fields.delta_time, DeltaTimeUnit::Milliseconds, reference, 3)
            .unwrap();
        assert!(matches!(
            build_observation_table(&fields, &times),
            Err(EmissionsError::SourceFormat(_))
        ));
    }
}
