//! Analog-output waveform files.
//!
//! A waveform is a single one-dimensional dataset of doubles named
//! `analog-output` inside an HDF5 file. Files are checked for the HDF5
//! signature before they are handed to libhdf5, so a wrong file is reported
//! instead of producing library noise. Decoding needs the `hdf5` feature;
//! without it, valid HDF5 files are rejected with
//! [`AnalogOutputError::FeatureNotEnabled`].
//!
//! Reading is blocking I/O; callers on the async runtime should wrap
//! [`read_analog_output`] in `spawn_blocking`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

/// Name of the dataset holding the waveform.
pub const DATASET_NAME: &str = "analog-output";

/// Eight-byte HDF5 format signature.
pub const HDF5_SIGNATURE: [u8; 8] = *b"\x89HDF\r\n\x1a\n";

/// Whether this build can decode waveform files.
pub const HDF5_ENABLED: bool = cfg!(feature = "hdf5");

/// File filter offered by the file chooser.
pub const FILE_EXTENSIONS: [&str; 3] = ["h5", "hdf5", "hdf"];

/// Errors reading an analog-output file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalogOutputError {
    #[error("Could not read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("The selected file is not in valid HDF5 format.")]
    NotHdf5,

    #[error("The file doesn't have a dataset called 'analog-output'")]
    MissingDataset,

    #[error("The 'analog-output' dataset is empty")]
    EmptyDataset,

    #[error("The 'analog-output' dataset must be one-dimensional, found {0} dimensions")]
    WrongDimensionality(usize),

    #[error("The 'analog-output' dataset could not be read as double-precision values: {0}")]
    WrongType(String),

    #[error("HDF5 support is not enabled. Please build with --features hdf5")]
    FeatureNotEnabled,
}

fn io_error(path: &Path, err: &std::io::Error) -> AnalogOutputError {
    AnalogOutputError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Check for the HDF5 signature.
///
/// The superblock may start at offset 0 or at any power of two from 512
/// onwards (files with a user block), so every such offset is probed.
pub fn has_hdf5_signature(path: &Path) -> Result<bool, AnalogOutputError> {
    let mut file = File::open(path).map_err(|e| io_error(path, &e))?;
    let len = file.metadata().map_err(|e| io_error(path, &e))?.len();

    let mut offset = 0u64;
    let mut buf = [0u8; 8];
    while offset + HDF5_SIGNATURE.len() as u64 <= len {
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| io_error(path, &e))?;
        if buf == HDF5_SIGNATURE {
            return Ok(true);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    Ok(false)
}

/// Read the `analog-output` waveform from `path`.
pub fn read_analog_output(path: &Path) -> Result<Vec<f64>, AnalogOutputError> {
    if !has_hdf5_signature(path)? {
        return Err(AnalogOutputError::NotHdf5);
    }
    let samples = non_empty(read_dataset(path)?)?;
    tracing::debug!(
        "Read {} analog-output samples from {}",
        samples.len(),
        path.display()
    );
    Ok(samples)
}

fn non_empty(samples: Vec<f64>) -> Result<Vec<f64>, AnalogOutputError> {
    if samples.is_empty() {
        Err(AnalogOutputError::EmptyDataset)
    } else {
        Ok(samples)
    }
}

#[cfg(feature = "hdf5")]
fn read_dataset(path: &Path) -> Result<Vec<f64>, AnalogOutputError> {
    let file = hdf5::File::open(path).map_err(|e| {
        tracing::warn!("libhdf5 refused {}: {}", path.display(), e);
        AnalogOutputError::NotHdf5
    })?;
    let dataset = file
        .dataset(DATASET_NAME)
        .map_err(|_| AnalogOutputError::MissingDataset)?;

    let ndim = dataset.ndim();
    if ndim != 1 {
        return Err(AnalogOutputError::WrongDimensionality(ndim));
    }

    dataset
        .read_raw::<f64>()
        .map_err(|e| AnalogOutputError::WrongType(e.to_string()))
}

#[cfg(not(feature = "hdf5"))]
fn read_dataset(_path: &Path) -> Result<Vec<f64>, AnalogOutputError> {
    Err(AnalogOutputError::FeatureNotEnabled)
}
