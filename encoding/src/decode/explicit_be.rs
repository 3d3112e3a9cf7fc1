//! Explicit VR Big Endian transfer syntax implementation.
//!
//! This transfer syntax was retired from the standard,
//! but files encoded with it still exist and remain decodable.

use crate::decode::basic::BigEndianBasicDecoder;
use crate::decode::*;
use byteordered::byteorder::{BigEndian, ByteOrder};
use dicomet_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dicomet_core::{tags, Tag, VR};
use snafu::ResultExt;
use std::io::Read;

const SMALL_UNDEFINED_LEN: u16 = 0xFFFF;

/// A data element header decoder for the Explicit VR Big Endian
/// transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRBigEndianDecoder {
    basic: BigEndianBasicDecoder,
}

impl Decode for ExplicitVRBigEndianDecoder {
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve tag; end of input here is the clean end of the data set
        let tag_bytes = super::read_tag_bytes(source)?;
        let group = BigEndian::read_u16(&tag_bytes[0..2]);
        let element = BigEndian::read_u16(&tag_bytes[2..4]);

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
            let len = BigEndian::read_u32(&buf);
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
            match BigEndian::read_u16(&buf[0..2]) {
                SMALL_UNDEFINED_LEN => Length::UNDEFINED,
                len => Length(u32::from(len)),
            }
        } else {
            // 2 reserved bytes, then 4 bytes for the data length
            source.read_exact(&mut buf[0..2]).context(ReadReservedSnafu)?;
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            bytes_read = 12;
            Length(BigEndian::read_u32(&buf))
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
        let group = BigEndian::read_u16(&buf[0..2]);
        let element = BigEndian::read_u16(&buf[2..4]);
        let len = BigEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        self.basic.decode_tag(source).context(ReadTagSnafu)
    }
}

impl<S: ?Sized> DecodeFrom<S> for ExplicitVRBigEndianDecoder
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

#[cfg(test)]
mod tests {
    use super::ExplicitVRBigEndianDecoder;
    use crate::decode::Decode;
    use dicomet_core::header::{Header, Length};
    use dicomet_core::{Tag, VR};
    use std::io::{Cursor, Read};

    // manually crafting one DICOM data element
    //  Tag: (0010,0010) Patient's Name
    //  VR: PN
    //  Length: 8
    //  Value: "DOE^JANE"
    // all multi-byte fields encoded in big endian
    const RAW: &[u8] = &[
        0x00, 0x10, 0x00, 0x10, b'P', b'N', 0x00, 0x08, b'D', b'O', b'E', b'^', b'J', b'A', b'N',
        b'E',
    ];

    #[test]
    fn decode_data_elements() {
        let dec = ExplicitVRBigEndianDecoder::default();
        let mut cursor = Cursor::new(RAW);
        let (elem, bytes_read) = dec
            .decode_header(&mut cursor)
            .expect("should find an element");
        assert_eq!(elem.tag(), Tag(0x0010, 0x0010));
        assert_eq!(elem.vr(), VR::PN);
        assert_eq!(elem.length(), Length(8));
        assert_eq!(bytes_read, 8);
        let mut buffer = [0; 8];
        cursor.read_exact(&mut buffer).expect("should read it fine");
        assert_eq!(&buffer, b"DOE^JANE".as_ref());
    }

    #[test]
    fn decode_item_headers() {
        // item with declared length 16, then a sequence delimiter
        const RAW: &[u8] = &[
            0xFF, 0xFE, 0xE0, 0x00, 0x00, 0x00, 0x00, 0x10, 0xFF, 0xFE, 0xE0, 0xDD, 0x00, 0x00,
            0x00, 0x00,
        ];
        let dec = ExplicitVRBigEndianDecoder::default();
        let mut cursor = Cursor::new(RAW);

        let item = dec
            .decode_item_header(&mut cursor)
            .expect("should find an item header");
        assert!(item.is_item());
        assert_eq!(item.length(), Length(16));

        let delimiter = dec
            .decode_item_header(&mut cursor)
            .expect("should find an item header");
        assert!(delimiter.is_sequence_delimiter());
    }
}
