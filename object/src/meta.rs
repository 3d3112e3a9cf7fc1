//! Module containing the data structure and reader of the DICOM file meta
//! information group.
//!
//! The file meta group is always encoded in Explicit VR Little Endian,
//! regardless of the transfer syntax it announces for the rest of the file.
//! The group starts right after the `DICM` magic code. Its extent is given
//! by the File Meta Information Group Length element: once that element is
//! decoded, the remainder of the group is read under a byte bound of the
//! declared size, and the phase ends when the bound is exhausted.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicomet_core::header::{DataElementHeader, Length, Tag, VR};
use dicomet_core::tags;
use dicomet_core::value::Value;
use dicomet_encoding::decode::{self, DecodeFrom};
use dicomet_encoding::text::parse_uid;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::io::Read;

use crate::mem::InMemElement;

const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The file meta group parser could not read
    /// the magic code `DICM` from its source.
    #[snafu(display("could not read magic code"))]
    ReadMagicCode {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// Invalid DICOM data, detected by checking the `DICM` code.
    #[snafu(display("invalid DICOM file (magic code check failed)"))]
    NotDicom { backtrace: Backtrace },

    /// An issue occurred while decoding the next data element
    /// in the file meta group.
    #[snafu(display("could not decode data element"))]
    DecodeElement {
        #[snafu(backtrace)]
        source: decode::Error,
    },

    /// The file meta group parser could not fetch
    /// the value of a data element from its source.
    #[snafu(display("could not read value of data element tagged {}", tag))]
    ReadValueData {
        tag: Tag,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// The value length of a data element in the file meta group
    /// is undefined, which is not legal there.
    #[snafu(display("undefined value length for data element tagged {}", tag))]
    UndefinedValueLength { tag: Tag, backtrace: Backtrace },

    /// The group length element declared an unexpected value
    /// representation or value length.
    #[snafu(display(
        "incorrect file meta group length element: vr={}, length={}",
        vr,
        length
    ))]
    BadGroupLength {
        vr: VR,
        length: Length,
        backtrace: Backtrace,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// DICOM file meta information group.
///
/// The elements are retained exactly as decoded, in stream order, with
/// duplicates kept; the values of structural interest (the group length
/// and the transfer syntax UID) are additionally captured in typed form.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaGroup {
    elements: Vec<InMemElement>,
    group_length: Option<u32>,
    transfer_syntax_uid: Option<String>,
}

impl FileMetaGroup {
    /// Construct a file meta group by parsing DICOM data from a reader.
    /// The source must be positioned right after the 128-byte preamble,
    /// at the `DICM` magic code.
    pub fn read_from<S: Read>(mut source: S) -> Result<Self> {
        let mut buf: [u8; 4] = [0; 4];
        {
            // check magic code with an exact read
            source.read_exact(&mut buf).context(ReadMagicCodeSnafu)?;

            ensure!(buf == DICM_MAGIC_CODE, NotDicomSnafu);
        }

        let decoder = decode::file_header_decoder();

        let mut group = FileMetaGroup {
            elements: Vec::new(),
            group_length: None,
            transfer_syntax_uid: None,
        };

        // read elements until the group length element is found
        // (or the source ends cleanly, for meta groups without one)
        while group.group_length.is_none() {
            let (header, _bytes_read) = match decoder.decode_header(&mut source) {
                Ok(out) => out,
                Err(e) if e.is_end_of_stream() => return Ok(group),
                Err(e) => return Err(e).context(DecodeElementSnafu),
            };
            group.read_element(header, &mut source)?;
        }

        // the remaining meta elements must fit in the declared byte count;
        // exhausting the bound is the ordinary end of this phase, and any
        // bytes beyond it belong to the main data set
        if let Some(group_length) = group.group_length {
            let mut bounded = source.take(u64::from(group_length));
            loop {
                let (header, _bytes_read) = match decoder.decode_header(&mut bounded) {
                    Ok(out) => out,
                    Err(e) if e.is_end_of_stream() => break,
                    Err(e) => return Err(e).context(DecodeElementSnafu),
                };
                group.read_element(header, &mut bounded)?;
            }
        }

        Ok(group)
    }

    /// Read one element's value, record it,
    /// and capture the structural values it may carry.
    fn read_element<S: Read>(&mut self, header: DataElementHeader, source: &mut S) -> Result<()> {
        let len = header.len.get().context(UndefinedValueLengthSnafu {
            tag: header.tag,
        })?;

        let mut value = vec![0u8; len as usize];
        source
            .read_exact(&mut value)
            .context(ReadValueDataSnafu { tag: header.tag })?;

        if header.tag == tags::FILE_META_INFORMATION_GROUP_LENGTH {
            ensure!(
                header.vr == VR::UL && header.len == Length(4),
                BadGroupLengthSnafu {
                    vr: header.vr,
                    length: header.len,
                }
            );
            self.group_length = Some(LittleEndian::read_u32(&value));
        }

        if header.tag == tags::TRANSFER_SYNTAX_UID {
            self.transfer_syntax_uid = Some(parse_uid(&value).into_owned());
        }

        self.elements.push(InMemElement::new_with_len(
            header.tag,
            header.vr,
            header.len,
            Value::Primitive(value),
        ));

        Ok(())
    }

    /// Getter for the meta group elements, in the order they were decoded.
    pub fn elements(&self) -> &[InMemElement] {
        &self.elements
    }

    /// The number of elements in the meta group.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// The declared byte count of the meta group past its length element,
    /// if a group length element was present.
    pub fn group_length(&self) -> Option<u32> {
        self.group_length
    }

    /// The captured transfer syntax UID, with trailing padding already
    /// excluded, if a transfer syntax element was present.
    pub fn transfer_syntax(&self) -> Option<&str> {
        self.transfer_syntax_uid.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, FileMetaGroup};
    use dicomet_core::{Tag, VR};

    // a full file meta group:
    //  "DICM",
    //  (0002,0000) UL 4, group length = 26
    //  (0002,0010) UI 18, "1.2.840.10008.1.2\0"
    #[rustfmt::skip]
    const RAW: &[u8] = &[
        b'D', b'I', b'C', b'M',
        0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00, 0x1a, 0x00, 0x00, 0x00,
        0x02, 0x00, 0x10, 0x00, b'U', b'I', 0x12, 0x00,
        b'1', b'.', b'2', b'.', b'8', b'4', b'0', b'.', b'1', b'0', b'0', b'0', b'8',
        b'.', b'1', b'.', b'2', 0x00,
    ];

    #[test]
    fn read_meta_group_with_group_length() {
        let group = FileMetaGroup::read_from(RAW).expect("should read the meta group");
        assert_eq!(group.group_length(), Some(26));
        assert_eq!(group.transfer_syntax(), Some("1.2.840.10008.1.2"));
        assert_eq!(group.element_count(), 2);

        let elems = group.elements();
        assert_eq!(elems[0].header().tag, Tag(0x0002, 0x0000));
        assert_eq!(elems[0].vr(), VR::UL);
        assert_eq!(elems[1].header().tag, Tag(0x0002, 0x0010));
        assert_eq!(
            elems[1].value().primitive(),
            Some(b"1.2.840.10008.1.2\0".as_ref())
        );
    }

    #[test]
    fn stray_bytes_after_the_bound_are_left_unread() {
        let mut with_trailing = RAW.to_vec();
        with_trailing.extend_from_slice(&[0x08, 0x00, 0x00, 0x00]);
        let mut source: &[u8] = &with_trailing;

        let group = FileMetaGroup::read_from(&mut source).expect("should read the meta group");
        assert_eq!(group.element_count(), 2);
        // the main data set bytes were not consumed
        assert_eq!(source, &[0x08, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn group_length_one_byte_short_is_an_error() {
        let mut raw = RAW.to_vec();
        // declare 25 bytes instead of 26: the transfer syntax element
        // no longer fits in the bound
        raw[12] = 0x19;

        let err = FileMetaGroup::read_from(raw.as_slice())
            .expect_err("the truncated bound must fail the parse");
        assert!(matches!(err, Error::ReadValueData { .. }));
    }

    #[test]
    fn bad_group_length_element() {
        // (0002,0000) UL with a value length of 2
        #[rustfmt::skip]
        const RAW: &[u8] = &[
            b'D', b'I', b'C', b'M',
            0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x02, 0x00, 0x1e, 0x00,
        ];

        let err = FileMetaGroup::read_from(RAW).expect_err("the group length must be rejected");
        assert!(matches!(err, Error::BadGroupLength { .. }));
    }

    #[test]
    fn magic_code_is_checked() {
        const RAW: &[u8] = &[b'D', b'I', b'C', b'O'];
        let err = FileMetaGroup::read_from(RAW).expect_err("the magic code must be rejected");
        assert!(matches!(err, Error::NotDicom { .. }));
    }

    #[test]
    fn meta_group_without_group_length_ends_at_eof() {
        // only a transfer syntax element, no group length
        #[rustfmt::skip]
        const RAW: &[u8] = &[
            b'D', b'I', b'C', b'M',
            0x02, 0x00, 0x10, 0x00, b'U', b'I', 0x14, 0x00,
            b'1', b'.', b'2', b'.', b'8', b'4', b'0', b'.', b'1', b'0', b'0', b'0', b'8',
            b'.', b'1', b'.', b'2', b'.', b'1', 0x00,
        ];

        let group = FileMetaGroup::read_from(RAW).expect("should read the meta group");
        assert_eq!(group.group_length(), None);
        assert_eq!(group.transfer_syntax(), Some("1.2.840.10008.1.2.1"));
        assert_eq!(group.element_count(), 1);
    }
}
