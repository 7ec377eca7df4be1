use crate::types::{EmissionsError, EmissionsResult, ScanField};

/// Measurement layer of the CO total column product
pub const VALUE_VARIABLE: &str = "PRODUCT/carbonmonoxide_total_column";
pub const LONGITUDE_VARIABLE: &str = "PRODUCT/longitude";
pub const LATITUDE_VARIABLE: &str = "PRODUCT/latitude";
pub const QA_VALUE_VARIABLE: &str = "PRODUCT/qa_value";
pub const DELTA_TIME_VARIABLE: &str = "PRODUCT/delta_time";

/// netCDF default fill for 32-bit floats
pub const NC_FILL_FLOAT: f64 = 9.969_209_968_386_869e36;

/// One numeric variable as stored in the product
#[derive(Debug, Clone)]
pub struct Variable {
    /// Raw (packed) values; 1D variables are a single row
    pub data: ScanField,
    pub fill_value: Option<f64>,
    pub scale_factor: Option<f64>,
    pub add_offset: Option<f64>,
    pub units: Option<String>,
}

impl Variable {
    pub fn new(data: ScanField) -> Self {
        Self {
            data,
            fill_value: None,
            scale_factor: None,
            add_offset: None,
            units: None,
        }
    }

    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_packing(mut self, scale_factor: f64, add_offset: f64) -> Self {
        self.scale_factor = Some(scale_factor);
        self.add_offset = Some(add_offset);
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    /// True if a raw element is a missing-data marker
    pub fn is_missing(&self, raw: f64) -> bool {
        if !raw.is_finite() {
            return true;
        }
        match self.fill_value {
            Some(fill) => raw == fill || (fill as f32) == (raw as f32),
            None => raw >= NC_FILL_FLOAT * 0.999,
        }
    }

    /// Apply scale factor and offset, leaving missing elements untouched
    pub fn unpacked(&self) -> ScanField {
        let scale = self.scale_factor.unwrap_or(1.0);
        let offset = self.add_offset.unwrap_or(0.0);
        if scale == 1.0 && offset == 0.0 {
            return self.data.clone();
        }
        self.data
            .mapv(|raw| if self.is_missing(raw) { raw } else { raw * scale + offset })
    }

    /// Element-wise validity derived from the missing-data markers
    pub fn validity_mask(&self) -> ndarray::Array2<bool> {
        self.data.mapv(|raw| !self.is_missing(raw))
    }
}

/// Source of product variables and file attributes.
///
/// Implementations own the file access; each call acquires and releases
/// whatever handle it needs.
pub trait ProductReader {
    /// Read a variable by its group path, e.g. `PRODUCT/latitude`
    fn read_variable(&self, name: &str) -> EmissionsResult<Variable>;

    /// Look up a file-level attribute by its exact key
    fn attribute(&self, key: &str) -> EmissionsResult<Option<String>>;

    /// Short label used in log output
    fn describe(&self) -> String;
}

/// Convert a missing variable into the format error for the product
pub(crate) fn missing_variable(name: &str, source: &str) -> EmissionsError {
    EmissionsError::SourceFormat(format!("{} does not contain {}", source, name))
}
