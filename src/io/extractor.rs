//! Raw field extraction from a scan product.

use crate::io::product::{
    ProductReader, Variable, DELTA_TIME_VARIABLE, LATITUDE_VARIABLE, LONGITUDE_VARIABLE,
    QA_VALUE_VARIABLE, VALUE_VARIABLE,
};
use crate::types::{
    DeltaTimeUnit, EmissionsError, EmissionsResult, RawFieldSet, ScanMetadata, Timestamp,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ndarray::Array1;

/// Keys holding the time reference as an ISO-8601 string.
/// The global form is what the netCDF driver reports, the bare form is the HDF5 root attribute.
pub const TIME_REFERENCE_KEYS: [&str; 2] = ["NC_GLOBAL#time_reference", "time_reference"];

/// Keys holding the time reference as seconds since 1970
pub const TIME_REFERENCE_SECONDS_KEYS: [&str; 2] = [
    "NC_GLOBAL#time_reference_seconds_since_1970",
    "time_reference_seconds_since_1970",
];

/// Read all fields and the scan metadata from a product
pub fn extract_scan<R: ProductReader>(reader: &R) -> EmissionsResult<(RawFieldSet, ScanMetadata)> {
    let source = reader.describe();
    log::info!("Extracting raw fields from {}", source);
    let start_time = std::time::Instant::now();

    let value = reader.read_variable(VALUE_VARIABLE)?;
    let longitude = reader.read_variable(LONGITUDE_VARIABLE)?;
    let latitude = reader.read_variable(LATITUDE_VARIABLE)?;
    let quality = reader.read_variable(QA_VALUE_VARIABLE)?;
    let delta_time = reader.read_variable(DELTA_TIME_VARIABLE)?;

    let (lines, pixels) = value.data.dim();
    let delta_time_unit = delta_time
        .units
        .as_deref()
        .and_then(DeltaTimeUnit::from_units)
        .unwrap_or_default();
    let per_line = flatten_delta_time(&delta_time, lines)?;

    let mut fields = RawFieldSet::new(
        value.unpacked(),
        longitude.unpacked(),
        latitude.unpacked(),
        quality.unpacked(),
        per_line,
        value.validity_mask(),
    )?;
    // A pixel is usable only if every per-pixel field holds a real reading.
    // Shapes were checked above.
    for variable in [&longitude, &latitude, &quality] {
        fields
            .valid
            .zip_mut_with(&variable.validity_mask(), |valid, &ok| *valid &= ok);
    }

    let metadata = ScanMetadata {
        time_reference: read_time_reference(reader)?,
        lines,
        pixels,
        delta_time_unit,
    };

    log::info!(
        "Extracted {} x {} pixels ({} valid) from {} in {:?}",
        lines,
        pixels,
        fields.valid_count(),
        source,
        start_time.elapsed()
    );
    log::debug!(
        "Time reference {}, delta time in {}",
        metadata.time_reference,
        metadata.delta_time_unit
    );

    Ok((fields, metadata))
}

/// Reduce the delta-time variable to one entry per scanline.
///
/// GDAL exposes the `(time, scanline)` variable as a one-row raster.
fn flatten_delta_time(delta_time: &Variable, lines: usize) -> EmissionsResult<Array1<f64>> {
    let (rows, cols) = delta_time.data.dim();
    if rows * cols != lines || (rows != 1 && cols != 1) {
        return Err(EmissionsError::SourceFormat(format!(
            "delta_time has shape {:?}, expected one entry for each of {} scanlines",
            (rows, cols),
            lines
        )));
    }
    let unpacked = delta_time.unpacked();
    Ok(unpacked.iter().copied().collect())
}

/// Resolve the scan time reference, trying every known attribute name
pub fn read_time_reference<R: ProductReader>(reader: &R) -> EmissionsResult<Timestamp> {
    for key in TIME_REFERENCE_KEYS {
        if let Some(raw) = reader.attribute(key)? {
            log::debug!("Time reference found under {}", key);
            return parse_time_reference(&raw);
        }
    }
    for key in TIME_REFERENCE_SECONDS_KEYS {
        if let Some(raw) = reader.attribute(key)? {
            log::debug!("Time reference found under {}", key);
            return parse_epoch_seconds(&raw);
        }
    }

    Err(EmissionsError::MetadataMissing(
        TIME_REFERENCE_KEYS
            .iter()
            .chain(TIME_REFERENCE_SECONDS_KEYS.iter())
            .map(|k| k.to_string())
            .collect(),
    ))
}

/// Parse a time reference given as ISO-8601 text or as plain epoch seconds
pub fn parse_time_reference(raw: &str) -> EmissionsResult<Timestamp> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%SZ",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    parse_epoch_seconds(trimmed)
}

fn parse_epoch_seconds(raw: &str) -> EmissionsResult<Timestamp> {
    let seconds: f64 = raw.trim().parse().map_err(|_| {
        EmissionsError::SourceFormat(format!("Unparseable time reference '{}'", raw))
    })?;
    if !seconds.is_finite() {
        return Err(EmissionsError::SourceFormat(format!(
            "Non-finite time reference '{}'",
            raw
        )));
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    Utc.timestamp_opt(whole as i64, nanos.min(999_999_999))
        .single()
        .ok_or_else(|| EmissionsError::SourceFormat(format!("Time reference out of range '{}'", raw)))
}
