//! This crate contains the DICOM decoding primitives of the `dicomet`
//! workspace: endian-aware basic decoders, data element header decoders for
//! each supported transfer syntax, the transfer syntax descriptors
//! themselves, and the text helpers for stream-level string values.

pub mod decode;
pub mod text;
pub mod transfer_syntax;

pub use decode::basic::BasicDecoder;
pub use decode::{BasicDecode, Decode, DecodeFrom};
pub use transfer_syntax::{Endianness, TransferSyntax, TransferSyntaxIndex};
