// src/io/mod.rs
pub mod reader;
pub mod writer;

pub use reader::{collect_inputs, load_stack, read_geo_info, GeoInfo, RasterStack};
pub use writer::{write_raster, WriteOptions};
