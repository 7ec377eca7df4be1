//! I/O modules for reading scan products

pub mod product;
pub mod memory;
pub mod extractor;
#[cfg(feature = "gdal")]
pub mod gdal_reader;

pub use product::{ProductReader, Variable};
pub use memory::InMemoryProduct;
pub use extractor::{extract_scan, read_time_reference};
#[cfg(feature = "gdal")]
pub use gdal_reader::GdalProductReader;
