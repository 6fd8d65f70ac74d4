// src/io/writer.rs
use gdal::raster::{Buffer, RasterCreationOptions};
use gdal::{DriverManager, Metadata};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::reader::GeoInfo;
use crate::error::{Result, SpeiError};

/// GeoTIFF creation settings for index rasters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct WriteOptions {
    #[serde(default = "default_compress")]
    pub compress: String,
    #[serde(default = "default_compress_level")]
    pub compress_level: u8,
    #[serde(default = "default_true")]
    pub tiled: bool,
}

fn default_compress() -> String {
    "DEFLATE".to_string()
}

fn default_compress_level() -> u8 {
    6
}

fn default_true() -> bool {
    true
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compress: default_compress(),
            compress_level: default_compress_level(),
            tiled: true,
        }
    }
}

impl WriteOptions {
    /// GDAL creation options, e.g. `COMPRESS=DEFLATE`, `ZLEVEL=6`, `TILED=YES`.
    pub fn creation_options(&self) -> Vec<String> {
        let mut options = Vec::new();
        let compress = self.compress.to_uppercase();

        // Add compression if not NONE
        if compress != "NONE" {
            options.push(format!("COMPRESS={compress}"));
            match compress.as_str() {
                "DEFLATE" => options.push(format!("ZLEVEL={}", self.compress_level.min(9))),
                "ZSTD" => options.push(format!("ZSTD_LEVEL={}", self.compress_level.min(22))),
                _ => {}
            }
        }

        if self.tiled {
            options.push("TILED=YES".to_string());
        }

        options.push("NUM_THREADS=ALL_CPUS".to_string());
        options
    }
}

/// Writes one single-band float32 GeoTIFF with NaN as nodata, georeferenced
/// like the input stack. `data` is row-major, `width * height` long.
pub fn write_raster(
    output_path: &Path,
    geo_info: &GeoInfo,
    data: Vec<f32>,
    description: &str,
    options: &WriteOptions,
) -> Result<()> {
    let write_err = |source| SpeiError::OutputWrite { path: output_path.to_path_buf(), source };

    let driver = DriverManager::get_driver_by_name("GTiff").map_err(write_err)?;
    let creation_options = RasterCreationOptions::from_iter(options.creation_options());

    let mut out_ds = driver
        .create_with_band_type_with_options::<f32, _>(
            output_path,
            geo_info.width,
            geo_info.height,
            1,
            &creation_options,
        )
        .map_err(write_err)?;

    out_ds.set_projection(&geo_info.projection).map_err(write_err)?;
    out_ds.set_geo_transform(&geo_info.geo_transform).map_err(write_err)?;

    let mut band = out_ds.rasterband(1).map_err(write_err)?;
    band.set_no_data_value(Some(f64::NAN)).map_err(write_err)?;
    band.set_description(description).map_err(write_err)?;

    let shape = (geo_info.width, geo_info.height);
    let mut buffer = Buffer::new(shape, data);
    band.write((0, 0), shape, &mut buffer).map_err(write_err)?;

    out_ds.flush_cache().map_err(write_err)?;
    Ok(())
}
