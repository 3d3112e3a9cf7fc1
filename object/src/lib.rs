#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations)]

//! This crate contains the high-level abstraction for reading DICOM
//! objects from files and other byte sources.
//!
//! A DICOM file comprises a 128-byte preamble, the `DICM` magic code, the
//! file meta group (always in Explicit VR Little Endian), and the main
//! data set in the transfer syntax the meta group announces. The function
//! [`open_file`] (or [`from_reader`] for arbitrary sources) drives all of
//! those phases and returns a [`FileDataSet`]: the meta group plus the
//! fully decoded in-memory data set tree.
//!
//! ## Example
//!
//! ```no_run
//! use dicomet_object::open_file;
//! use dicomet_core::Tag;
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let obj = open_file("0001.dcm")?;
//! if let Some(elem) = obj.dataset().element(Tag(0x0010, 0x0010)) {
//!     println!("patient name: {:?}", elem.value().primitive());
//! }
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod mem;
pub mod meta;

use dicomet_core::Length;
use dicomet_encoding::transfer_syntax::{EXPLICIT_VR_LITTLE_ENDIAN, TransferSyntaxIndex};
use dicomet_parser::DataSetReader;
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub use crate::file::{from_reader, open_file};
pub use crate::mem::{InMemDataSet, InMemElement};
pub use crate::meta::FileMetaGroup;

/// The length of the DICOM file preamble, which precedes the magic code.
const PREAMBLE_LENGTH: usize = 128;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    /// Could not open the file for reading
    #[snafu(display("could not open file '{}'", filename.display()))]
    OpenFile {
        filename: PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// The 128-byte preamble could not be read in full
    #[snafu(display("could not read file header: incomplete preamble"))]
    ReadPreamble {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// The file meta group could not be decoded
    #[snafu(display("could not read file meta group"))]
    ParseMetaGroup {
        #[snafu(backtrace)]
        source: crate::meta::Error,
    },

    /// The main data set could not be decoded
    #[snafu(display("could not read data set"))]
    BuildDataSet {
        #[snafu(backtrace)]
        source: crate::mem::Error,
    },
}

type Result<T> = std::result::Result<T, ReadError>;

/// A DICOM object read from a Part 10 file:
/// the file meta group and the main data set.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDataSet {
    meta: FileMetaGroup,
    dataset: InMemDataSet,
}

impl FileDataSet {
    /// Getter for the file meta group.
    pub fn meta(&self) -> &FileMetaGroup {
        &self.meta
    }

    /// Getter for the main data set.
    pub fn dataset(&self) -> &InMemDataSet {
        &self.dataset
    }

    /// Create a DICOM object by reading from a file.
    ///
    /// This function assumes the standard file encoding structure:
    /// 128-byte preamble, magic code, file meta group,
    /// and then the main data set.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|_| OpenFileSnafu {
            filename: path.to_owned(),
        })?;
        Self::from_reader(file)
    }

    /// Create a DICOM object by reading from a byte source.
    ///
    /// The source must provide the full file content,
    /// starting at the 128-byte preamble.
    pub fn from_reader<S: Read>(src: S) -> Result<Self> {
        let mut file = BufReader::new(src);

        // the preamble carries no information, but must be fully present
        let mut buf = [0u8; PREAMBLE_LENGTH];
        file.read_exact(&mut buf).context(ReadPreambleSnafu)?;

        // read the file meta group, always Explicit VR Little Endian
        let meta = FileMetaGroup::read_from(&mut file).context(ParseMetaGroupSnafu)?;

        // switch to the transfer syntax announced by the meta group;
        // when it is absent or unknown, fall back to the default encoding
        let ts = match meta.transfer_syntax() {
            Some(uid) => TransferSyntaxIndex.get(uid).unwrap_or_else(|| {
                tracing::warn!(
                    uid,
                    "unknown transfer syntax, assuming Explicit VR Little Endian"
                );
                &EXPLICIT_VR_LITTLE_ENDIAN
            }),
            None => {
                tracing::warn!("missing transfer syntax, assuming Explicit VR Little Endian");
                &EXPLICIT_VR_LITTLE_ENDIAN
            }
        };
        tracing::debug!(uid = ts.uid(), name = ts.name(), "reading data set");

        // read the rest of the data according to the transfer syntax
        let mut dataset = DataSetReader::new_with_ts(file, ts);
        let obj = InMemDataSet::build_object(&mut dataset, false, Length::UNDEFINED)
            .context(BuildDataSetSnafu)?;

        Ok(FileDataSet { meta, dataset: obj })
    }
}
