//! This crate works on top of `dicomet-encoding` to provide a middle-level
//! abstraction for parsing DICOM data sets: a stateful decoder bound to one
//! source and one transfer syntax, and a data set reader which walks the
//! structure of the data set as a sequence of tokens while enforcing the
//! byte limits of nested sequences and items.

pub mod dataset;
pub mod stateful;

pub use dataset::read::DataSetReader;
pub use dataset::DataToken;
pub use stateful::decode::{DynStatefulDecoder, StatefulDecode, StatefulDecoder};
