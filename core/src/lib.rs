#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, missing_docs)]

//! This is the core library of the `dicomet` workspace,
//! containing the concepts, data structures and traits
//! shared by the decoding layers above it:
//! attribute tags, value representations, value lengths,
//! data element and sequence item headers,
//! and the structural attribute dictionary
//! used when decoding Implicit VR data sets.

pub mod dictionary;
pub mod header;
pub mod tags;
pub mod value;

pub use dictionary::{DataDictionary, StructuralDictionary};
pub use header::{DataElementHeader, Header, Length, SequenceItemHeader, Tag, VR};
pub use value::{DataElement, DataSetSequence, Item, Value};
