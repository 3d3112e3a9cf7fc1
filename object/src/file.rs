//! Convenience functions for reading DICOM objects.

use crate::{FileDataSet, ReadError};
use std::io::Read;
use std::path::Path;

/// Create a DICOM object by reading from a byte source,
/// starting at the 128-byte preamble.
pub fn from_reader<F>(file: F) -> Result<FileDataSet, ReadError>
where
    F: Read,
{
    FileDataSet::from_reader(file)
}

/// Create a DICOM object by reading from a file.
pub fn open_file<P>(path: P) -> Result<FileDataSet, ReadError>
where
    P: AsRef<Path>,
{
    FileDataSet::open_file(path)
}
