//! Module containing the transfer syntax descriptors and their registry.
//!
//! A `TransferSyntax` names the encoding conventions of a data set: the
//! byte order of its multi-byte values and whether value representations
//! appear on the wire. The descriptor constructs the matching data element
//! header decoder and basic decoder for the layers above.

use crate::decode::basic::BasicDecoder;
use crate::decode::explicit_be::ExplicitVRBigEndianDecoder;
use crate::decode::explicit_le::ExplicitVRLittleEndianDecoder;
use crate::decode::implicit_le::ImplicitVRLittleEndianDecoder;
use crate::decode::DecodeFrom;
use crate::text::trim_trailing_padding;
use std::io::Read;

pub use byteordered::Endianness;

/// A data element header decoder with its type erased.
pub type DynDecoder<S> = Box<dyn DecodeFrom<S>>;

/// A DICOM transfer syntax descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSyntax {
    /// The unique identifier of the transfer syntax.
    uid: &'static str,
    /// The name of the transfer syntax.
    name: &'static str,
    /// The byte order of multi-byte values.
    byte_order: Endianness,
    /// Whether the transfer syntax mandates an explicit value
    /// representation, or the VR is implicit.
    explicit_vr: bool,
}

impl TransferSyntax {
    /// Create a transfer syntax descriptor from its properties.
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        byte_order: Endianness,
        explicit_vr: bool,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            byte_order,
            explicit_vr,
        }
    }

    /// Obtain this transfer syntax' unique identifier.
    pub fn uid(&self) -> &'static str {
        self.uid
    }

    /// Obtain the name of this transfer syntax.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Obtain this transfer syntax' expected endianness.
    pub fn endianness(&self) -> Endianness {
        self.byte_order
    }

    /// Whether this transfer syntax puts value representations on the wire.
    pub fn explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// Retrieve the appropriate data element header decoder for this
    /// transfer syntax, erased to the given source type.
    pub fn decoder_for<S>(&self) -> DynDecoder<S>
    where
        S: ?Sized + Read,
    {
        match (self.byte_order, self.explicit_vr) {
            (Endianness::Little, false) => {
                Box::new(ImplicitVRLittleEndianDecoder::new()) as DynDecoder<S>
            }
            (Endianness::Little, true) => Box::new(ExplicitVRLittleEndianDecoder::default()),
            (Endianness::Big, _) => Box::new(ExplicitVRBigEndianDecoder::default()),
        }
    }

    /// Retrieve the basic decoder for this transfer syntax' byte order.
    pub fn basic_decoder(&self) -> BasicDecoder {
        BasicDecoder::new(self.byte_order)
    }
}

/// Implicit VR Little Endian: the default transfer syntax.
pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
);

/// Explicit VR Little Endian.
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Endianness::Little,
    true,
);

/// Deflated Explicit VR Little Endian. The data set is decoded as Explicit
/// VR Little Endian; inflating the byte stream is up to the byte source.
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.1.99",
    "Deflated Explicit VR Little Endian",
    Endianness::Little,
    true,
);

/// Explicit VR Big Endian. Retired, see PS3.5 2016b, but files encoded
/// with it still exist.
pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
);

/// The registry of the transfer syntaxes this crate can decode.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct TransferSyntaxIndex;

impl TransferSyntaxIndex {
    /// Obtain a transfer syntax descriptor by its unique identifier.
    /// The lookup is robust to trailing whitespace and NUL padding.
    /// Returns `None` when the identifier is not registered; callers
    /// wanting the standard fallback behavior should then assume
    /// [`EXPLICIT_VR_LITTLE_ENDIAN`].
    pub fn get(&self, uid: &str) -> Option<&'static TransferSyntax> {
        match trim_trailing_padding(uid) {
            "1.2.840.10008.1.2" => Some(&IMPLICIT_VR_LITTLE_ENDIAN),
            "1.2.840.10008.1.2.1" => Some(&EXPLICIT_VR_LITTLE_ENDIAN),
            "1.2.840.10008.1.2.1.99" => Some(&DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN),
            "1.2.840.10008.1.2.2" => Some(&EXPLICIT_VR_BIG_ENDIAN),
            _ => None,
        }
    }
}
