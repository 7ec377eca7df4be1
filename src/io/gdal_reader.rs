use crate::io::product::{ProductReader, Variable};
use crate::types::{EmissionsError, EmissionsResult};
use gdal::{Dataset, Metadata};
use std::path::{Path, PathBuf};

/// Reads Sentinel-5P netCDF4/HDF5 products through GDAL's HDF5 driver.
///
/// Every call opens its own dataset and drops it before returning.
pub struct GdalProductReader {
    path: PathBuf,
}

impl GdalProductReader {
    pub fn new<P: AsRef<Path>>(path: P) -> EmissionsResult<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(EmissionsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// GDAL subdataset name for a variable
    fn subdataset(&self, name: &str) -> String {
        format!("HDF5:{}://{}", self.path.display(), name)
    }

    /// First attribute found under the naming variants GDAL uses for variable attributes
    fn variable_attribute(dataset: &Dataset, leaf: &str, attribute: &str) -> Option<String> {
        let candidates = [
            format!("{}#{}", leaf, attribute),
            format!("{}_{}", leaf, attribute),
            attribute.to_string(),
        ];
        candidates
            .iter()
            .find_map(|key| dataset.metadata_item(key, ""))
            .map(|v| v.trim().to_string())
    }

    fn numeric_attribute(dataset: &Dataset, leaf: &str, attribute: &str) -> Option<f64> {
        Self::variable_attribute(dataset, leaf, attribute).and_then(|v| {
            v.trim_start_matches('{')
                .trim_end_matches('}')
                .split(',')
                .next()
                .and_then(|s| s.trim().parse::<f64>().ok())
        })
    }
}

impl ProductReader for GdalProductReader {
    fn read_variable(&self, name: &str) -> EmissionsResult<Variable> {
        let subdataset = self.subdataset(name);
        log::debug!("Opening {}", subdataset);

        let dataset = Dataset::open(Path::new(&subdataset)).map_err(|e| {
            EmissionsError::SourceFormat(format!("Failed to open {}: {}", subdataset, e))
        })?;

        let (width, height) = dataset.raster_size();
        if dataset.raster_count() < 1 {
            return Err(EmissionsError::SourceFormat(format!(
                "{} has no raster bands",
                subdataset
            )));
        }

        let band = dataset.rasterband(1)?;
        let data = band.read_as_array::<f64>((0, 0), (width, height), (width, height), None)?;
        log::debug!("{}: {} x {}", name, height, width);

        let leaf = name.rsplit('/').next().unwrap_or(name);
        let fill_value = band
            .no_data_value()
            .or_else(|| Self::numeric_attribute(&dataset, leaf, "_FillValue"));

        Ok(Variable {
            data,
            fill_value,
            scale_factor: Self::numeric_attribute(&dataset, leaf, "scale_factor"),
            add_offset: Self::numeric_attribute(&dataset, leaf, "add_offset"),
            units: Self::variable_attribute(&dataset, leaf, "units"),
        })
    }

    fn attribute(&self, key: &str) -> EmissionsResult<Option<String>> {
        let dataset = Dataset::open(&self.path)?;
        Ok(dataset.metadata_item(key, ""))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
