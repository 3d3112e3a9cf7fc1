//! Implicit VR Little Endian transfer syntax implementation

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::{
    BadSequenceHeaderSnafu, BasicDecode, DecodeFrom, ReadHeaderTagSnafu, ReadLengthSnafu,
    ReadTagSnafu, Result, UnexpectedTagSnafu,
};
use crate::Decode;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicomet_core::dictionary::{DataDictionary, StructuralDictionary};
use dicomet_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dicomet_core::{tags, Tag, VR};
use snafu::ResultExt;
use std::fmt;
use std::io::Read;

/// An `ImplicitVRLittleEndianDecoder` which uses the structural dictionary.
pub type StandardImplicitVRLittleEndianDecoder = ImplicitVRLittleEndianDecoder<StructuralDictionary>;

/// A data element header decoder for the Implicit VR Little Endian
/// transfer syntax. The VR is not on the wire, so this type holds an
/// attribute dictionary for resolving value representations; attributes
/// absent from the dictionary decode as `UN`.
pub struct ImplicitVRLittleEndianDecoder<D> {
    dict: D,
    basic: LittleEndianBasicDecoder,
}

impl<D> fmt::Debug for ImplicitVRLittleEndianDecoder<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ImplicitVRLittleEndianDecoder")
            .field("dict", &"«omitted»")
            .field("basic", &self.basic)
            .finish()
    }
}

impl ImplicitVRLittleEndianDecoder<StructuralDictionary> {
    /// Retrieve this decoder using the structural dictionary.
    pub fn new() -> Self {
        ImplicitVRLittleEndianDecoder {
            dict: StructuralDictionary,
            basic: LittleEndianBasicDecoder,
        }
    }
}

impl Default for ImplicitVRLittleEndianDecoder<StructuralDictionary> {
    fn default() -> Self {
        ImplicitVRLittleEndianDecoder::new()
    }
}

impl<D> ImplicitVRLittleEndianDecoder<D>
where
    D: DataDictionary,
{
    /// Retrieve this decoder using a custom attribute dictionary.
    pub fn with_dict(dictionary: D) -> Self {
        ImplicitVRLittleEndianDecoder {
            dict: dictionary,
            basic: LittleEndianBasicDecoder,
        }
    }
}

impl<D> Decode for ImplicitVRLittleEndianDecoder<D>
where
    D: DataDictionary,
{
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve tag; end of input here is the clean end of the data set
        let tag_bytes = crate::decode::read_tag_bytes(source)?;
        let tag = Tag(
            LittleEndian::read_u16(&tag_bytes[0..2]),
            LittleEndian::read_u16(&tag_bytes[2..4]),
        );

        // only the item delimiter may stand in the position of a data
        // element; its length field is consumed through the regular path
        // below, since Implicit VR lengths are always 4 bytes
        if tag.group() == 0xFFFE && tag != tags::ITEM_DELIMITATION_ITEM {
            return UnexpectedTagSnafu { tag }.fail();
        }

        // the length field is always 4 bytes in Implicit VR
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadLengthSnafu)?;
        let len = LittleEndian::read_u32(&buf);

        // In Implicit VR Little Endian,
        // the VR of OW must be used for Pixel Data (7FE0,0010).
        // This edge case is addressed manually here,
        // and every other attribute goes through the dictionary,
        // defaulting to UN when the attribute is not known.
        let vr = if tag == tags::PIXEL_DATA {
            VR::OW
        } else {
            self.dict.vr_of(tag).unwrap_or(VR::UN)
        };

        Ok((DataElementHeader::new(tag, vr, Length(len)), 8))
    }

    fn decode_item_header<S>(&self, mut source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        // retrieve tag and always consume the 4-byte length
        let tag = self
            .basic
            .decode_tag(&mut source)
            .context(ReadHeaderTagSnafu)?;

        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadLengthSnafu)?;
        let len = LittleEndian::read_u32(&buf);
        SequenceItemHeader::new(tag, Length(len)).context(BadSequenceHeaderSnafu)
    }

    #[inline]
    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        self.basic.decode_tag(source).context(ReadTagSnafu)
    }
}

impl<S: ?Sized, D> DecodeFrom<S> for ImplicitVRLittleEndianDecoder<D>
where
    S: Read,
    D: DataDictionary,
{
    #[inline]
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        Decode::decode_header(self, source)
    }

    #[inline]
    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        Decode::decode_item_header(self, source)
    }

    #[inline]
    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        Decode::decode_tag(self, source)
    }
}
