// src/io/reader.rs
use gdal::Dataset;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SpeiError};
use crate::progress;

/// Relative tolerance when comparing geotransforms of different files.
const GEO_TRANSFORM_TOLERANCE: f64 = 1e-9;

/// Georeferencing shared by every raster of a stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoInfo {
    pub projection: String,
    pub geo_transform: [f64; 6],
    pub width: usize,
    pub height: usize,
}

impl GeoInfo {
    /// Describes the first property where `other` differs from `self`.
    pub fn mismatch(&self, other: &GeoInfo) -> Option<String> {
        if (self.width, self.height) != (other.width, other.height) {
            return Some(format!("raster size {}x{}", other.width, other.height));
        }
        let transforms_match = self
            .geo_transform
            .iter()
            .zip(&other.geo_transform)
            .all(|(a, b)| (a - b).abs() <= GEO_TRANSFORM_TOLERANCE * a.abs().max(b.abs()).max(1.0));
        if !transforms_match {
            return Some(format!("geotransform {:?}", other.geo_transform));
        }
        if self.projection != other.projection {
            return Some("projection".to_string());
        }
        None
    }
}

/// Monthly water-balance grids, time-major: `data[t * pixels + row * width + col]`.
/// Missing cells are NaN.
#[derive(Debug, Clone)]
pub struct RasterStack {
    data: Vec<f32>,
    months: usize,
    geo: GeoInfo,
}

impl RasterStack {
    /// Builds a stack from already-decoded grids.
    pub fn from_parts(data: Vec<f32>, months: usize, geo: GeoInfo) -> Result<Self> {
        if months == 0 {
            return Err(SpeiError::EmptyInput);
        }
        let expected = months * geo.width * geo.height;
        if data.len() != expected {
            return Err(SpeiError::InvalidConfig {
                reason: format!("stack holds {} values, expected {expected}", data.len()),
            });
        }
        Ok(Self { data, months, geo })
    }

    pub fn months(&self) -> usize {
        self.months
    }

    pub fn width(&self) -> usize {
        self.geo.width
    }

    pub fn height(&self) -> usize {
        self.geo.height
    }

    pub fn pixels(&self) -> usize {
        self.geo.width * self.geo.height
    }

    pub fn geo(&self) -> &GeoInfo {
        &self.geo
    }

    /// Value of pixel `pixel` (row-major) at month `t`.
    #[inline]
    pub fn value(&self, t: usize, pixel: usize) -> f32 {
        self.data[t * self.pixels() + pixel]
    }

    /// The grid for month `t`.
    pub fn band(&self, t: usize) -> &[f32] {
        let pixels = self.pixels();
        &self.data[t * pixels..(t + 1) * pixels]
    }

    /// Time series of one cell, widened to f64.
    pub fn pixel_series(&self, row: usize, col: usize) -> Vec<f64> {
        let pixel = row * self.width() + col;
        (0..self.months).map(|t| self.value(t, pixel) as f64).collect()
    }
}

/// Expands directories to their GeoTIFF files and sorts the result, which
/// puts date-stamped file names in chronological order.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input).map_err(|source| SpeiError::InputDir {
                path: input.clone(),
                source,
            })?;
            for entry in entries {
                let path = entry
                    .map_err(|source| SpeiError::InputDir { path: input.clone(), source })?
                    .path();
                if is_geotiff(&path) {
                    paths.push(path);
                }
            }
        } else {
            paths.push(input.clone());
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_geotiff(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"))
}

fn open(path: &Path) -> Result<Dataset> {
    Dataset::open(path).map_err(|source| SpeiError::Gdal { path: path.to_path_buf(), source })
}

/// Reads the georeferencing of a raster without touching its pixels.
pub fn read_geo_info(path: &Path) -> Result<GeoInfo> {
    let dataset = open(path)?;
    if dataset.raster_count() == 0 {
        return Err(SpeiError::ShapeMismatch {
            path: path.to_path_buf(),
            detail: "band count 0".to_string(),
        });
    }
    let (width, height) = dataset.raster_size();
    let geo_transform = dataset
        .geo_transform()
        .map_err(|source| SpeiError::Gdal { path: path.to_path_buf(), source })?;

    Ok(GeoInfo {
        projection: dataset.projection(),
        geo_transform,
        width,
        height,
    })
}

/// Loads an ordered list of single-band rasters into a [`RasterStack`].
///
/// Every header is checked against the first file before any pixel is read.
/// Band 1 of each file is then decoded in parallel; cells equal to the
/// file's nodata value become NaN. `show_progress` draws a bar over the reads.
pub fn load_stack(paths: &[PathBuf], show_progress: bool) -> Result<RasterStack> {
    let first = paths.first().ok_or(SpeiError::EmptyInput)?;
    let geo = read_geo_info(first)?;
    debug!(path = %first.display(), width = geo.width, height = geo.height, "reference raster");

    for path in &paths[1..] {
        let other = read_geo_info(path)?;
        if let Some(detail) = geo.mismatch(&other) {
            return Err(SpeiError::ShapeMismatch { path: path.clone(), detail });
        }
    }

    let pixels = geo.width * geo.height;
    let mut data = vec![f32::NAN; pixels * paths.len()];
    let pb = progress::bar(paths.len(), "Reading rasters", show_progress);
    let read = data
        .par_chunks_mut(pixels.max(1))
        .zip(paths.par_iter())
        .progress_with(pb.clone())
        .try_for_each(|(dst, path)| read_band_into(path, &geo, dst));
    pb.finish();
    read?;

    info!(
        months = paths.len(),
        width = geo.width,
        height = geo.height,
        "loaded raster stack"
    );
    RasterStack::from_parts(data, paths.len(), geo)
}

fn read_band_into(path: &Path, geo: &GeoInfo, dst: &mut [f32]) -> Result<()> {
    let gdal_err = |source| SpeiError::Gdal { path: path.to_path_buf(), source };
    let dataset = open(path)?;
    let band = dataset.rasterband(1).map_err(gdal_err)?;
    let nodata = band.no_data_value();
    let size = (geo.width, geo.height);
    let buffer = band.read_as::<f32>((0, 0), size, size, None).map_err(gdal_err)?;

    for (out, &value) in dst.iter_mut().zip(buffer.data()) {
        *out = match nodata {
            Some(sentinel) if value as f64 == sentinel || value == sentinel as f32 => f32::NAN,
            _ => value,
        };
    }
    debug!(path = %path.display(), ?nodata, "read band");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(width: usize, height: usize) -> GeoInfo {
        GeoInfo {
            projection: String::new(),
            geo_transform: [75.0, 0.05, 0.0, 26.0, 0.0, -0.05],
            width,
            height,
        }
    }

    #[test]
    fn mismatch_detects_size() {
        assert_eq!(geo(2, 2).mismatch(&geo(3, 2)), Some("raster size 3x2".to_string()));
        assert_eq!(geo(2, 2).mismatch(&geo(2, 2)), None);
    }

    #[test]
    fn mismatch_detects_transform() {
        let mut shifted = geo(2, 2);
        shifted.geo_transform[0] += 0.05;
        assert!(geo(2, 2).mismatch(&shifted).unwrap().starts_with("geotransform"));
    }

    #[test]
    fn stack_indexing_is_time_major() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let stack = RasterStack::from_parts(data, 3, geo(2, 2)).unwrap();
        assert_eq!(stack.pixels(), 4);
        assert_eq!(stack.band(1), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(stack.pixel_series(1, 0), vec![2.0, 6.0, 10.0]);
    }

    #[test]
    fn from_parts_checks_length() {
        assert!(RasterStack::from_parts(vec![0.0; 7], 2, geo(2, 2)).is_err());
        assert!(matches!(
            RasterStack::from_parts(Vec::new(), 0, geo(2, 2)),
            Err(SpeiError::EmptyInput)
        ));
    }
}
