//! Explicit VR Little Endian transfer syntax implementation

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::*;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicomet_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dicomet_core::{tags, Tag, VR};
use snafu::ResultExt;
use std::io::Read;

/// A 16-bit value length of 0xFFFF is rectified to the canonical 32-bit
/// undefined length sentinel.
const SMALL_UNDEFINED_LEN: u16 = 0xFFFF;

/// A data element header decoder for the Explicit VR Little Endian
/// transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRLittleEndianDecoder {
    basic: LittleEndianBasicDecoder,
}

impl Decode for ExplicitVRLittleEndianDecoder {
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve tag; end of input here is the clean end of the data set
        let tag_bytes = super::read_tag_bytes(source)?;
        let group = LittleEndian::read_u16(&tag_bytes[0..2]);
        let element = LittleEndian::read_u16(&tag_bytes[2..4]);

        let mut buf = [0u8; 4];
        if group == 0xFFFE {
            // only the item delimiter may stand in the position of a data
            // element; it carries no VR or reserved field, only a 4-byte
            // length, which is always consumed here
            let tag = Tag(group, element);
            if tag != tags::ITEM_DELIMITATION_ITEM {
                return UnexpectedTagSnafu { tag }.fail();
            }
            source.read_exact(&mut buf).context(ReadItemLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            return Ok((
                DataElementHeader::new(tag, VR::UN, Length(len)),
                8, // tag + len
            ));
        }

        // retrieve explicit VR
        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let vr = VR::from_binary([buf[0], buf[1]]).unwrap_or(VR::UN);
        let bytes_read;

        // retrieve data length
        let len = if vr.is_short_len() {
            // 2 bytes for the data length
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            bytes_read = 8;
            match LittleEndian::read_u16(&buf[0..2]) {
                SMALL_UNDEFINED_LEN => Length::UNDEFINED,
                len => Length(u32::from(len)),
            }
        } else {
            // 2 reserved bytes, then 4 bytes for the data length
            source.read_exact(&mut buf[0..2]).context(ReadReservedSnafu)?;
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            bytes_read = 12;
            Length(LittleEndian::read_u32(&buf))
        };

        Ok((
            DataElementHeader::new((group, element), vr, len),
            bytes_read,
        ))
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf).context(ReadItemHeaderSnafu)?;
        // retrieve tag and always consume the 4-byte length
        let group = LittleEndian::read_u16(&buf[0..2]);
        let element = LittleEndian::read_u16(&buf[2..4]);
        let len = LittleEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        self.basic.decode_tag(source).context(ReadTagSnafu)
    }
}

impl<S: ?Sized> DecodeFrom<S> for ExplicitVRLittleEndianDecoder
where
    S: Read,
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
