//! This module contains all DICOM data element header decoding logic.

use byteordered::Endianness;
use dicomet_core::header::{DataElementHeader, SequenceItemHeader};
use dicomet_core::Tag;
use snafu::{Backtrace, Snafu};
use std::io::{self, Read};

pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit_le;

/// Module-level error type:
/// errors which may occur while decoding a data element header.
/// Each variant identifies the wire field being read when the source
/// failed, so that a short read in the middle of a header is reported
/// against the field it truncated.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The source was exhausted before the tag of the next data element,
    /// with no bytes consumed. This marks the clean end of a data set,
    /// not a decoding failure.
    #[snafu(display("no more data elements remain in the source"))]
    EndOfStream { backtrace: Backtrace },

    /// Failed to read the tag at the beginning of a data element header
    #[snafu(display("failed to read the tag of the element header"))]
    ReadHeaderTag {
        backtrace: Option<Backtrace>,
        source: io::Error,
    },

    /// Failed to read a sequence item header
    #[snafu(display("failed to read the item header"))]
    ReadItemHeader {
        backtrace: Backtrace,
        source: io::Error,
    },

    /// Failed to read the 32-bit length of an item or delimiter
    #[snafu(display("failed to read the item length field"))]
    ReadItemLength {
        backtrace: Backtrace,
        source: io::Error,
    },

    /// Failed to read an attribute tag
    #[snafu(display("failed to read the tag field"))]
    ReadTag {
        backtrace: Backtrace,
        source: io::Error,
    },

    /// Failed to read the two reserved bytes after the VR code
    #[snafu(display("failed to read the header's reserved bytes"))]
    ReadReserved {
        backtrace: Backtrace,
        source: io::Error,
    },

    /// Failed to read the value length field
    #[snafu(display("failed to read the value length field"))]
    ReadLength {
        backtrace: Backtrace,
        source: io::Error,
    },

    /// Failed to read the two-byte value representation code
    #[snafu(display("failed to read the value representation"))]
    ReadVr {
        backtrace: Backtrace,
        source: io::Error,
    },

    /// The tag/length pair does not form a valid sequence item header
    #[snafu(display("bad sequence item header"))]
    BadSequenceHeader {
        source: dicomet_core::header::SequenceItemError,
    },

    /// A delimitation tag appeared in the position of a data element.
    /// Of the (FFFE,xxxx) tags, only the item delimiter may stand there.
    #[snafu(display("unexpected tag {} in place of a data element", tag))]
    UnexpectedTag { tag: Tag, backtrace: Backtrace },
}

impl Error {
    /// Whether this error marks the clean end of the data set:
    /// the source was exhausted at a data element boundary.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Read the 4 bytes of a data element tag, distinguishing the clean end of
/// the stream (end of input before the first byte) from a short read in the
/// middle of the tag.
pub(crate) fn read_tag_bytes<S>(source: &mut S) -> Result<[u8; 4]>
where
    S: ?Sized + Read,
{
    use snafu::ResultExt;

    let mut buf = [0u8; 4];
    let mut nread = 0;
    while nread < buf.len() {
        let n = match source.read(&mut buf[nread..]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context(ReadHeaderTagSnafu),
        };
        if n == 0 {
            if nread == 0 {
                return EndOfStreamSnafu.fail();
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole tag",
            ))
            .context(ReadHeaderTagSnafu);
        }
        nread += n;
    }
    Ok(buf)
}

/// Type trait for reading and decoding basic data values from a data
/// source. This trait provides the endianness-dependent primitive reads
/// that all header decoding is built from. There are, and only will be,
/// two implementations, one per byte order, plus the runtime-dispatched
/// [`BasicDecoder`](basic::BasicDecoder).
pub trait BasicDecode {
    /// Retrieve the source's endianness, as expected by this decoder.
    fn endianness(&self) -> Endianness;

    /// Decode an unsigned short value from the given source.
    fn decode_us<S>(&self, source: S) -> std::io::Result<u16>
    where
        S: Read;

    /// Decode an unsigned long value from the given source.
    fn decode_ul<S>(&self, source: S) -> std::io::Result<u32>
    where
        S: Read;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S>(&self, mut source: S) -> std::io::Result<Tag>
    where
        S: Read,
    {
        let g = self.decode_us(&mut source)?;
        let e = self.decode_us(source)?;
        Ok(Tag(g, e))
    }
}

impl<T: ?Sized> BasicDecode for &T
where
    T: BasicDecode,
{
    fn endianness(&self) -> Endianness {
        (**self).endianness()
    }

    fn decode_us<S>(&self, source: S) -> std::io::Result<u16>
    where
        S: Read,
    {
        (**self).decode_us(source)
    }

    fn decode_ul<S>(&self, source: S) -> std::io::Result<u32>
    where
        S: Read,
    {
        (**self).decode_ul(source)
    }

    fn decode_tag<S>(&self, source: S) -> std::io::Result<Tag>
    where
        S: Read,
    {
        (**self).decode_tag(source)
    }
}

/// Type trait for decoding DICOM data element headers.
///
/// The specific wire form of a header depends on the transfer syntax,
/// which is captured by the implementing type.
pub trait Decode {
    /// Fetch and decode the next data element header from the given source.
    /// At the end of this operation, the source will be pointing at the
    /// element's value data, which should be read or skipped as necessary.
    ///
    /// The item delimiter is decoded through this method as well, since it
    /// ends the element stream of an item of undefined length: its 4-byte
    /// length field is always consumed, and the value representation
    /// reported for it is `UN`. Any other delimitation tag in this
    /// position is rejected.
    ///
    /// Returns the decoded header and the exact number of bytes read from
    /// the source.
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read;

    /// Fetch and decode the next sequence item header from the given
    /// source, always consuming the tag and the 32-bit length. This is a
    /// separate method because items and delimiters never carry a value
    /// representation, in any transfer syntax. Only an item or the
    /// sequence delimiter may appear in this position; any other tag,
    /// including the item delimiter, is an error.
    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read;
}

impl<T: ?Sized> Decode for Box<T>
where
    T: Decode,
{
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        (**self).decode_header(source)
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        (**self).decode_item_header(source)
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        (**self).decode_tag(source)
    }
}

impl<T: ?Sized> Decode for &T
where
    T: Decode,
{
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        (**self).decode_header(source)
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        (**self).decode_item_header(source)
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        (**self).decode_tag(source)
    }
}

/// Type trait for decoding DICOM data element headers from a specific
/// source reader type. Unlike [`Decode`], this trait is object safe,
/// which allows the transfer syntax to pick the decoder at run time.
pub trait DecodeFrom<S: ?Sized + Read> {
    /// Fetch and decode the next data element header from the given source.
    /// See [`Decode::decode_header`].
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)>;

    /// Fetch and decode the next sequence item header from the given
    /// source. See [`Decode::decode_item_header`].
    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader>;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag(&self, source: &mut S) -> Result<Tag>;
}

impl<S: ?Sized, T: ?Sized> DecodeFrom<S> for &T
where
    S: Read,
    T: DecodeFrom<S>,
{
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        (**self).decode_header(source)
    }

    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        (**self).decode_item_header(source)
    }

    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        (**self).decode_tag(source)
    }
}

impl<S: ?Sized, T: ?Sized> DecodeFrom<S> for Box<T>
where
    S: Read,
    T: DecodeFrom<S>,
{
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        (**self).decode_header(source)
    }

    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        (**self).decode_item_header(source)
    }

    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        (**self).decode_tag(source)
    }
}

/// Obtain a data element decoder for reading the data elements in a DICOM
/// file's meta information group. According to the standard, these are
/// always encoded in Explicit VR Little Endian.
pub fn file_header_decoder() -> explicit_le::ExplicitVRLittleEndianDecoder {
    explicit_le::ExplicitVRLittleEndianDecoder::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_decode_from<T: DecodeFrom<dyn Read>>(_decoder: &T) {}

    #[allow(unused)]
    fn boxed_decode_from_is_decode_from<T>(decoder: T)
    where
        T: DecodeFrom<dyn Read>,
    {
        is_decode_from(&decoder);
        let boxed = Box::new(decoder);
        is_decode_from(&boxed);
        let erased = boxed as Box<dyn DecodeFrom<dyn Read>>;
        is_decode_from(&erased);
    }
}
