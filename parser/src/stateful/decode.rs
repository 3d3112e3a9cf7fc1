//! Module holding the stateful DICOM data decoding abstraction.
//!
//! A stateful decoder owns its byte source and the decoders picked for the
//! active transfer syntax, and keeps count of every byte consumed. The byte
//! count is what the data set reader uses to enforce the limits of
//! defined-length sequences and items.

use dicomet_core::header::{DataElementHeader, SequenceItemHeader, Tag};
use dicomet_encoding::decode::basic::BasicDecoder;
use dicomet_encoding::decode::{BasicDecode, DecodeFrom};
use dicomet_encoding::transfer_syntax::{DynDecoder, Endianness, TransferSyntax};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use std::io::Read;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not decode element header at position {}", position))]
    DecodeElementHeader {
        position: u64,
        #[snafu(backtrace)]
        source: dicomet_encoding::decode::Error,
    },

    #[snafu(display("could not decode item header at position {}", position))]
    DecodeItemHeader {
        position: u64,
        #[snafu(backtrace)]
        source: dicomet_encoding::decode::Error,
    },

    #[snafu(display("could not read value from source at position {}", position))]
    ReadValueData {
        position: u64,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display(
        "undefined value length of element tagged {} at position {}",
        tag,
        position
    ))]
    UndefinedValueLength {
        tag: Tag,
        position: u64,
        backtrace: Backtrace,
    },
}

impl Error {
    /// Whether this error marks the clean end of the data set:
    /// the source was exhausted right at a data element boundary.
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            Error::DecodeElementHeader { source, .. } => source.is_end_of_stream(),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Interface of a stateful decoder: decoding of headers and values over an
/// owned source, with byte accounting.
pub trait StatefulDecode {
    /// Decode the next data element header.
    /// At the end of this operation, the source will be pointing at the
    /// element's value data. The item delimiter decodes through here as
    /// well, with its 4-byte length field already consumed; any other
    /// delimitation tag in this position is an error.
    fn decode_header(&mut self) -> Result<DataElementHeader>;

    /// Decode the next sequence item header,
    /// consuming its tag and 32-bit length.
    fn decode_item_header(&mut self) -> Result<SequenceItemHeader>;

    /// Eagerly read the value of the given element header from the source,
    /// as raw bytes of exactly the declared length.
    ///
    /// # Errors
    ///
    /// Fails on I/O problems and when the declared length is undefined,
    /// which is only legal for sequence elements and therefore never valid
    /// here.
    fn read_value(&mut self, header: &DataElementHeader) -> Result<Vec<u8>>;

    /// Consume and discard the given number of bytes,
    /// counting them as read.
    fn skip_bytes(&mut self, length: u32) -> Result<()>;

    /// Retrieve the number of bytes read so far by this decoder.
    fn position(&self) -> u64;
}

/// Alias for a stateful decoder whose header decoder was resolved at run
/// time from a transfer syntax.
pub type DynStatefulDecoder<S> = StatefulDecoder<DynDecoder<S>, S>;

/// A stateful abstraction for the DICOM data set reading process.
/// `S` is the type of the byte source,
/// `D` the data element header decoder,
/// and `BD` the basic decoder for the active byte order.
#[derive(Debug)]
pub struct StatefulDecoder<D, S, BD = BasicDecoder> {
    from: S,
    decoder: D,
    basic: BD,
    /// the number of bytes read from the source so far
    position: u64,
}

impl<S> StatefulDecoder<DynDecoder<S>, S> {
    /// Create a new stateful decoder for the given transfer syntax,
    /// starting the byte count at `position`.
    pub fn new_with(from: S, ts: &TransferSyntax, position: u64) -> Self
    where
        S: Read,
    {
        let basic = ts.basic_decoder();
        let decoder = ts.decoder_for();

        StatefulDecoder::new_with_position(from, decoder, basic, position)
    }
}

impl<D, S, BD> StatefulDecoder<D, S, BD> {
    /// Create a new stateful decoder from its parts.
    #[inline]
    pub fn new(from: S, decoder: D, basic: BD) -> Self {
        Self::new_with_position(from, decoder, basic, 0)
    }

    /// Create a new stateful decoder from its parts,
    /// assuming a base reading position.
    #[inline]
    pub fn new_with_position(from: S, decoder: D, basic: BD, position: u64) -> Self {
        Self {
            from,
            decoder,
            basic,
            position,
        }
    }
}

impl<D, S, BD> StatefulDecoder<D, S, BD>
where
    BD: BasicDecode,
{
    /// Retrieve the byte order this decoder reads multi-byte values under.
    pub fn endianness(&self) -> Endianness {
        self.basic.endianness()
    }
}

impl<D, S, BD> StatefulDecode for StatefulDecoder<D, S, BD>
where
    D: DecodeFrom<S>,
    S: Read,
    BD: BasicDecode,
{
    fn decode_header(&mut self) -> Result<DataElementHeader> {
        let (header, bytes_read) = self
            .decoder
            .decode_header(&mut self.from)
            .context(DecodeElementHeaderSnafu {
                position: self.position,
            })?;
        tracing::trace!(
            tag = %header.tag,
            vr = %header.vr,
            len = %header.len,
            position = self.position,
            "decoded element header"
        );
        self.position += bytes_read as u64;
        Ok(header)
    }

    fn decode_item_header(&mut self) -> Result<SequenceItemHeader> {
        let header = self
            .decoder
            .decode_item_header(&mut self.from)
            .context(DecodeItemHeaderSnafu {
                position: self.position,
            })?;
        // tag and 32-bit length
        self.position += 8;
        Ok(header)
    }

    fn read_value(&mut self, header: &DataElementHeader) -> Result<Vec<u8>> {
        let len = header
            .len
            .get()
            .context(UndefinedValueLengthSnafu {
                position: self.position,
                tag: header.tag,
            })? as usize;

        let mut buf = vec![0u8; len];
        self.from
            .read_exact(&mut buf)
            .context(ReadValueDataSnafu {
                position: self.position,
            })?;
        self.position += len as u64;
        Ok(buf)
    }

    fn skip_bytes(&mut self, length: u32) -> Result<()> {
        let count = std::io::copy(
            &mut self.from.by_ref().take(u64::from(length)),
            &mut std::io::sink(),
        )
        .context(ReadValueDataSnafu {
            position: self.position,
        })?;
        if count != u64::from(length) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "failed to skip the requested number of bytes",
            ))
            .context(ReadValueDataSnafu {
                position: self.position,
            });
        }
        self.position += count;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, StatefulDecode, StatefulDecoder};
    use dicomet_core::header::{Header, Length};
    use dicomet_core::{Tag, VR};
    use dicomet_encoding::decode::basic::LittleEndianBasicDecoder;
    use dicomet_encoding::decode::explicit_le::ExplicitVRLittleEndianDecoder;

    // manually crafting two DICOM data elements
    //  Tag: (0002,0002) Media Storage SOP Class UID
    //  VR: UI, Length: 26, Value: "1.2.840.10008.5.1.4.1.1.1\0"
    // --
    //  Tag: (0002,0010) Transfer Syntax UID
    //  VR: UI, Length: 20, Value: "1.2.840.10008.1.2.1\0"
    // --
    const RAW: &[u8; 62] = &[
        0x02, 0x00, 0x02, 0x00, 0x55, 0x49, 0x1a, 0x00, 0x31, 0x2e, 0x32, 0x2e, 0x38, 0x34, 0x30,
        0x2e, 0x31, 0x30, 0x30, 0x30, 0x38, 0x2e, 0x35, 0x2e, 0x31, 0x2e, 0x34, 0x2e, 0x31, 0x2e,
        0x31, 0x2e, 0x31, 0x00, 0x02, 0x00, 0x10, 0x00, 0x55, 0x49, 0x14, 0x00, 0x31, 0x2e, 0x32,
        0x2e, 0x38, 0x34, 0x30, 0x2e, 0x31, 0x30, 0x30, 0x30, 0x38, 0x2e, 0x31, 0x2e, 0x32, 0x2e,
        0x31, 0x00,
    ];

    #[test]
    fn decode_elements_and_track_position() {
        let mut cursor: &[u8] = RAW;
        let mut decoder = StatefulDecoder::new(
            &mut cursor,
            ExplicitVRLittleEndianDecoder::default(),
            LittleEndianBasicDecoder,
        );

        assert_eq!(decoder.endianness(), dicomet_encoding::Endianness::Little);

        let header = decoder.decode_header().expect("should decode a header");
        assert_eq!(header.tag, Tag(0x0002, 0x0002));
        assert_eq!(header.vr, VR::UI);
        assert_eq!(header.len, Length(26));
        assert_eq!(decoder.position(), 8);

        let value = decoder.read_value(&header).expect("should read the value");
        assert_eq!(value.as_slice(), b"1.2.840.10008.5.1.4.1.1.1\0".as_ref());
        assert_eq!(decoder.position(), 34);

        let header = decoder.decode_header().expect("should decode a header");
        assert_eq!(header.tag, Tag(0x0002, 0x0010));
        assert_eq!(decoder.position(), 42);

        // skipping counts as reading
        decoder.skip_bytes(20).expect("should skip the value");
        assert_eq!(decoder.position(), 62);

        // the stream is exhausted at an element boundary
        let err = decoder.decode_header().unwrap_err();
        assert!(err.is_end_of_stream());
    }

    #[test]
    fn refuse_value_of_undefined_length() {
        let mut cursor: &[u8] = &[];
        let mut decoder = StatefulDecoder::new(
            &mut cursor,
            ExplicitVRLittleEndianDecoder::default(),
            LittleEndianBasicDecoder,
        );

        let header = dicomet_core::header::DataElementHeader::new(
            Tag(0x7FE0, 0x0010),
            VR::OB,
            Length::UNDEFINED,
        );
        let err = decoder.read_value(&header).unwrap_err();
        assert!(matches!(err, Error::UndefinedValueLength { .. }));
        assert!(!err.is_end_of_stream());
    }

    #[test]
    fn eof_in_the_middle_of_a_tag_is_not_clean() {
        // two stray bytes, not enough for a tag
        let mut cursor: &[u8] = &[0x08, 0x00];
        let mut decoder = StatefulDecoder::new(
            &mut cursor,
            ExplicitVRLittleEndianDecoder::default(),
            LittleEndianBasicDecoder,
        );

        let err = decoder.decode_header().unwrap_err();
        assert!(!err.is_end_of_stream());
    }

    #[test]
    fn item_headers_count_eight_bytes() {
        let mut cursor: &[u8] = &[
            0xFE, 0xFF, 0x00, 0xE0, 0x04, 0x00, 0x00, 0x00, // item, length 4
        ];
        let mut decoder = StatefulDecoder::new(
            &mut cursor,
            ExplicitVRLittleEndianDecoder::default(),
            LittleEndianBasicDecoder,
        );

        let header = decoder
            .decode_item_header()
            .expect("should decode an item header");
        assert!(header.is_item());
        assert_eq!(header.length(), Length(4));
        assert_eq!(decoder.position(), 8);
    }
}
