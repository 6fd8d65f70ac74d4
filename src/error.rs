// src/error.rs
//! Error types for spei-calc.

use std::path::PathBuf;

use crate::calendar::YearMonth;

/// Run-level failures. Per-pixel statistical problems never show up here,
/// they are recorded as [`crate::processing::SkipReason`] instead.
#[derive(Debug, thiserror::Error)]
pub enum SpeiError {
    /// No input rasters were supplied.
    #[error("no input rasters supplied")]
    EmptyInput,

    /// An input raster disagrees with the first file of the stack.
    #[error("{}: {detail} does not match the first input raster", path.display())]
    ShapeMismatch { path: PathBuf, detail: String },

    /// An input directory could not be listed.
    #[error("cannot list input directory {}: {source}", path.display())]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// GDAL could not open or read an input raster.
    #[error("failed to read {}: {source}", path.display())]
    Gdal {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    /// Dated input files skip or repeat a month.
    #[error("{}: expected {expected}, found {found}", path.display())]
    NonContiguousTimeline {
        path: PathBuf,
        expected: YearMonth,
        found: YearMonth,
    },

    /// A calendar-aligned timescale was requested but the start month is unknown.
    #[error("cannot place {label} outputs on the calendar: set a start month or use dated file names")]
    UndatedInput { label: &'static str },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The output directory could not be created.
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single output raster could not be written.
    #[error("failed to write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("failed to write manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, SpeiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_message() {
        assert_eq!(SpeiError::EmptyInput.to_string(), "no input rasters supplied");
    }

    #[test]
    fn shape_mismatch_names_file() {
        let e = SpeiError::ShapeMismatch {
            path: PathBuf::from("wb_2004_02.tif"),
            detail: "raster size 3x2".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "wb_2004_02.tif: raster size 3x2 does not match the first input raster"
        );
    }

    #[test]
    fn timeline_message() {
        let e = SpeiError::NonContiguousTimeline {
            path: PathBuf::from("wb_2004_04.tif"),
            expected: YearMonth::new(2004, 3).unwrap(),
            found: YearMonth::new(2004, 4).unwrap(),
        };
        assert_eq!(e.to_string(), "wb_2004_04.tif: expected 2004-03, found 2004-04");
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync + std::error::Error>() {}
        assert_impl::<SpeiError>();
    }
}
