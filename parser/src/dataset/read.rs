//! This module contains a mid-level abstraction for reading DICOM content
//! sequentially: the data set reader, which decodes one data set into a
//! stream of structure tokens while tracking the byte limits of nested
//! sequences and items.

use crate::dataset::{DataToken, SeqTokenType};
use crate::stateful::decode::{DynStatefulDecoder, StatefulDecode};
use dicomet_core::header::{DataElementHeader, Length, SequenceItemHeader, VR};
use dicomet_core::tags;
use dicomet_encoding::transfer_syntax::TransferSyntax;
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::Read;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Could not decode the data element header
    #[snafu(display("could not decode data element header"))]
    DecodeHeader {
        #[snafu(backtrace)]
        source: crate::stateful::decode::Error,
    },

    /// Could not decode the sequence item header
    #[snafu(display("could not decode sequence item header"))]
    DecodeItemHeader {
        #[snafu(backtrace)]
        source: crate::stateful::decode::Error,
    },

    /// Could not read the data element value
    #[snafu(display("could not read data element value"))]
    ReadValue {
        #[snafu(backtrace)]
        source: crate::stateful::decode::Error,
    },

    /// The parser read past the declared end of a sequence or item
    #[snafu(display(
        "inconsistent sequence or item end: expected the container to end at position {}, but the parser is at position {}",
        end_of_data,
        bytes_read
    ))]
    InconsistentSequenceEnd {
        end_of_data: u64,
        bytes_read: u64,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A reader-specific token representing a sequence or item start,
/// recording where its value data began and how long it claims to be.
/// The stack of these limits is what bounds every nested container:
/// bytes consumed by an inner container count against every outer one,
/// because all consumption goes through the same stateful decoder.
#[derive(Debug, Copy, Clone, PartialEq)]
struct SeqToken {
    /// Whether it is the start of a sequence or the start of an item.
    typ: SeqTokenType,
    /// The declared length of the value,
    /// which may be undefined (delimited).
    len: Length,
    /// The number of bytes the parser had read when it reached the
    /// beginning of the sequence or item value data.
    base_offset: u64,
}

/// A higher-level reader for retrieving the structure of a DICOM data set
/// from an arbitrary data source, as an iterator of [tokens](DataToken).
///
/// Reaching the declared limit of a container is an ordinary end, emitted
/// as the matching end token; reading past it is an error. The iterator
/// finishes when the source is exhausted at a data element boundary.
#[derive(Debug)]
pub struct DataSetReader<S> {
    parser: S,
    /// whether the reader is expecting an item next (or a sequence delimiter)
    in_sequence: bool,
    /// whether a check for a sequence or item delimitation is pending
    delimiter_check_pending: bool,
    /// the stack of sequence/item byte limits
    seq_delimiters: Vec<SeqToken>,
    /// fuse the iteration process if true
    hard_break: bool,
    /// last decoded header
    last_header: Option<DataElementHeader>,
}

impl<S> DataSetReader<DynStatefulDecoder<S>> {
    /// Create a new data set reader over the given source,
    /// decoding under the given transfer syntax.
    pub fn new_with_ts(source: S, ts: &TransferSyntax) -> Self
    where
        S: Read,
    {
        let parser = DynStatefulDecoder::new_with(source, ts, 0);
        DataSetReader::new(parser)
    }
}

impl<S> DataSetReader<S> {
    /// Create a new data set reader over the given stateful decoder.
    pub fn new(parser: S) -> Self {
        DataSetReader {
            parser,
            seq_delimiters: Vec::new(),
            delimiter_check_pending: false,
            in_sequence: false,
            hard_break: false,
            last_header: None,
        }
    }
}

impl<S> DataSetReader<S>
where
    S: StatefulDecode,
{
    /// Retrieve the number of bytes the underlying decoder has read.
    pub fn position(&self) -> u64 {
        self.parser.position()
    }
}

impl<S> Iterator for DataSetReader<S>
where
    S: StatefulDecode,
{
    type Item = Result<DataToken>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.hard_break {
            return None;
        }

        // item or sequence delimitation logic for defined lengths
        if self.delimiter_check_pending {
            match self.update_seq_delimiters() {
                Err(e) => {
                    self.hard_break = true;
                    return Some(Err(e));
                }
                Ok(Some(token)) => return Some(Ok(token)),
                Ok(None) => { /* no-op */ }
            }
        }

        if self.in_sequence {
            match self.parser.decode_item_header() {
                Ok(header) => match header {
                    SequenceItemHeader::Item { len } => {
                        // entered a new item
                        self.in_sequence = false;
                        self.seq_delimiters.push(SeqToken {
                            typ: SeqTokenType::Item,
                            len,
                            base_offset: self.parser.position(),
                        });
                        // items can be empty
                        if len == Length(0) {
                            self.delimiter_check_pending = true;
                        }
                        Some(Ok(DataToken::ItemStart { len }))
                    }
                    SequenceItemHeader::SequenceDelimiter => {
                        // closed a sequence
                        if matches!(
                            self.seq_delimiters.last().copied(),
                            Some(sd) if sd.len.is_defined()
                        ) {
                            tracing::warn!(
                                position = self.parser.position(),
                                "sequence delimiter inside a sequence of defined length"
                            );
                        }
                        self.seq_delimiters.pop();
                        self.in_sequence = false;
                        self.delimiter_check_pending = true;
                        Some(Ok(DataToken::SequenceEnd))
                    }
                },
                Err(e) => {
                    self.hard_break = true;
                    Some(Err(e).context(DecodeItemHeaderSnafu))
                }
            }
        } else if let Some(header) = self.last_header.take() {
            // a plain element header was read, so a value is expected
            let value = match self.parser.read_value(&header) {
                Ok(v) => v,
                Err(e) => {
                    self.hard_break = true;
                    return Some(Err(e).context(ReadValueSnafu));
                }
            };

            // sequences can end after this token
            self.delimiter_check_pending = true;

            Some(Ok(DataToken::PrimitiveValue(value)))
        } else {
            // a data element header or item delimiter is expected
            match self.parser.decode_header() {
                Ok(DataElementHeader {
                    tag,
                    vr: VR::SQ,
                    len,
                }) => {
                    self.in_sequence = true;
                    self.seq_delimiters.push(SeqToken {
                        typ: SeqTokenType::Sequence,
                        len,
                        base_offset: self.parser.position(),
                    });

                    // sequences can end right after they start
                    if len == Length(0) {
                        self.delimiter_check_pending = true;
                    }

                    Some(Ok(DataToken::SequenceStart { tag, len }))
                }
                Ok(header) if header.tag == tags::ITEM_DELIMITATION_ITEM => {
                    // closed an item of undefined length; the delimiter's
                    // 4-byte length field was consumed with its header
                    match self.seq_delimiters.last().copied() {
                        Some(sd) if sd.typ == SeqTokenType::Item => {
                            self.seq_delimiters.pop();
                            self.in_sequence = true;
                        }
                        _ => {
                            tracing::warn!(
                                position = self.parser.position(),
                                "item delimiter outside of an item"
                            );
                        }
                    }
                    self.delimiter_check_pending = true;
                    Some(Ok(DataToken::ItemEnd))
                }
                Ok(header) => {
                    // save it for the next step
                    self.last_header = Some(header);
                    Some(Ok(DataToken::ElementHeader(header)))
                }
                Err(e) if e.is_end_of_stream() => {
                    // the source was exhausted at an element boundary
                    self.hard_break = true;
                    None
                }
                Err(e) => {
                    self.hard_break = true;
                    Some(Err(e).context(DecodeHeaderSnafu))
                }
            }
        }
    }
}

impl<S> DataSetReader<S>
where
    S: StatefulDecode,
{
    fn update_seq_delimiters(&mut self) -> Result<Option<DataToken>> {
        if let Some(sd) = self.seq_delimiters.last() {
            if let Some(len) = sd.len.get() {
                let end_of_data = sd.base_offset + u64::from(len);
                let bytes_read = self.parser.position();
                if end_of_data == bytes_read {
                    // the container ends here, as declared by its length;
                    // the check stays pending so that enclosing containers
                    // ending at the same position are closed right after
                    let token = match sd.typ {
                        SeqTokenType::Sequence => {
                            self.in_sequence = false;
                            DataToken::SequenceEnd
                        }
                        SeqTokenType::Item => {
                            self.in_sequence = true;
                            DataToken::ItemEnd
                        }
                    };

                    self.seq_delimiters.pop();
                    return Ok(Some(token));
                } else if end_of_data < bytes_read {
                    return InconsistentSequenceEndSnafu {
                        end_of_data,
                        bytes_read,
                    }
                    .fail();
                }
            }
        }
        self.delimiter_check_pending = false;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::{DataSetReader, DataToken};
    use crate::stateful::decode::StatefulDecoder;
    use dicomet_core::header::{DataElementHeader, Length};
    use dicomet_core::{Tag, VR};
    use dicomet_encoding::decode::basic::LittleEndianBasicDecoder;
    use dicomet_encoding::decode::explicit_le::ExplicitVRLittleEndianDecoder;
    use dicomet_encoding::decode::implicit_le::ImplicitVRLittleEndianDecoder;

    fn validate_dataset_reader_explicit_vr<I>(data: &[u8], ground_truth: I)
    where
        I: IntoIterator<Item = DataToken>,
    {
        let parser = StatefulDecoder::new(
            data,
            ExplicitVRLittleEndianDecoder::default(),
            LittleEndianBasicDecoder,
        );

        validate_dataset_reader(data, DataSetReader::new(parser), ground_truth)
    }

    fn validate_dataset_reader_implicit_vr<I>(data: &[u8], ground_truth: I)
    where
        I: IntoIterator<Item = DataToken>,
    {
        let parser = StatefulDecoder::new(
            data,
            ImplicitVRLittleEndianDecoder::new(),
            LittleEndianBasicDecoder,
        );

        validate_dataset_reader(data, DataSetReader::new(parser), ground_truth)
    }

    fn validate_dataset_reader<S, I>(
        data: &[u8],
        mut dset_reader: DataSetReader<S>,
        ground_truth: I,
    ) where
        S: crate::stateful::decode::StatefulDecode,
        I: IntoIterator<Item = DataToken>,
    {
        let mut iter = Iterator::zip(&mut dset_reader, ground_truth);

        for (res, gt_token) in &mut iter {
            let token = res.expect("should parse without an error");
            assert_eq!(token, gt_token);
        }

        assert_eq!(
            iter.count(), // consume til the end
            0,            // we have already read all of them
            "unexpected number of tokens remaining"
        );
        assert_eq!(dset_reader.position(), data.len() as u64);
    }

    #[test]
    fn read_sequence_explicit() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x18, 0x00, 0x11, 0x60, // sequence tag: (0018,6011) SequenceOfUltrasoundRegions
            b'S', b'Q', // VR
            0x00, 0x00, // reserved
            0x2e, 0x00, 0x00, 0x00, // length: 28 + 18 = 46 (#= 2)
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x14, 0x00, 0x00, 0x00, // item length: 20 (#= 2)
            // -- 20 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x01, 0x00, // (0018,6012) RegionSpatialFormat, len = 2, value = 1
            // -- 30 --
            0x18, 0x00, 0x14, 0x60, b'U', b'S', 0x02, 0x00, 0x02, 0x00, // (0018,6014) RegionDataType, len = 2, value = 2
            // -- 40 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x0a, 0x00, 0x00, 0x00, // item length: 10 (#= 1)
            // -- 48 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x04, 0x00, // (0018,6012) RegionSpatialFormat, len = 2, value = 4
            // -- 58 --
            0x20, 0x00, 0x00, 0x40, b'L', b'T', 0x04, 0x00, // (0020,4000) ImageComments, len = 4
            b'T', b'E', b'S', b'T', // value = "TEST"
        ];

        let ground_truth = vec![
            DataToken::SequenceStart {
                tag: Tag(0x0018, 0x6011),
                len: Length(46),
            },
            DataToken::ItemStart { len: Length(20) },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6012),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x01, 0x00]),
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6014),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x02, 0x00]),
            DataToken::ItemEnd,
            DataToken::ItemStart { len: Length(10) },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6012),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x04, 0x00]),
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0020, 0x4000),
                vr: VR::LT,
                len: Length(4),
            }),
            DataToken::PrimitiveValue(b"TEST".to_vec()),
        ];

        validate_dataset_reader_explicit_vr(DATA, ground_truth);
    }

    #[test]
    fn read_sequence_explicit_with_undefined_lengths() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x18, 0x00, 0x11, 0x60, // sequence tag: (0018,6011) SequenceOfUltrasoundRegions
            b'S', b'Q', // VR
            0x00, 0x00, // reserved
            0xff, 0xff, 0xff, 0xff, // length: undefined
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0xff, 0xff, 0xff, 0xff, // item length: undefined
            // -- 20 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x01, 0x00,
            // -- 30 --
            0x18, 0x00, 0x14, 0x60, b'U', b'S', 0x02, 0x00, 0x02, 0x00,
            // -- 40 --
            0xfe, 0xff, 0x0d, 0xe0, 0x00, 0x00, 0x00, 0x00, // item end
            // -- 48 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0xff, 0xff, 0xff, 0xff, // item length: undefined
            // -- 56 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x04, 0x00,
            // -- 66 --
            0xfe, 0xff, 0x0d, 0xe0, 0x00, 0x00, 0x00, 0x00, // item end
            // -- 74 --
            0xfe, 0xff, 0xdd, 0xe0, 0x00, 0x00, 0x00, 0x00, // sequence end
            // -- 82 --
            0x20, 0x00, 0x00, 0x40, b'L', b'T', 0x04, 0x00, // (0020,4000) ImageComments, len = 4
            b'T', b'E', b'S', b'T', // value = "TEST"
        ];

        let ground_truth = vec![
            DataToken::SequenceStart {
                tag: Tag(0x0018, 0x6011),
                len: Length::UNDEFINED,
            },
            DataToken::ItemStart {
                len: Length::UNDEFINED,
            },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6012),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x01, 0x00]),
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6014),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x02, 0x00]),
            DataToken::ItemEnd,
            DataToken::ItemStart {
                len: Length::UNDEFINED,
            },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6012),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x04, 0x00]),
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0020, 0x4000),
                vr: VR::LT,
                len: Length(4),
            }),
            DataToken::PrimitiveValue(b"TEST".to_vec()),
        ];

        validate_dataset_reader_explicit_vr(DATA, ground_truth);
    }

    #[test]
    fn read_empty_sequence_and_empty_item() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            // (0040,0555) AcquisitionContextSequence; len = 0
            0x40, 0x00, 0x55, 0x05, b'S', b'Q', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // -- 12 --
            // (0008,1115) ReferencedSeriesSequence; len = 8
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, 0x08, 0x00, 0x00, 0x00,
            // -- 24 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x00, 0x00, 0x00, 0x00, // item length: 0
        ];

        let ground_truth = vec![
            DataToken::SequenceStart {
                tag: Tag(0x0040, 0x0555),
                len: Length(0),
            },
            DataToken::SequenceEnd,
            DataToken::SequenceStart {
                tag: Tag(0x0008, 0x1115),
                len: Length(8),
            },
            DataToken::ItemStart { len: Length(0) },
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
        ];

        validate_dataset_reader_explicit_vr(DATA, ground_truth);
    }

    #[test]
    fn read_nested_sequences() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            // (0008,2218) AnatomicRegionSequence; len = 38
            0x08, 0x00, 0x18, 0x22, b'S', b'Q', 0x00, 0x00, 0x26, 0x00, 0x00, 0x00,
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x1e, 0x00, 0x00, 0x00, // item length: 30
            // -- 20 --
            // (0008,0121) EquivalentCodeSequence; len = 18
            0x08, 0x00, 0x21, 0x01, b'S', b'Q', 0x00, 0x00, 0x12, 0x00, 0x00, 0x00,
            // -- 32 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x0a, 0x00, 0x00, 0x00, // item length: 10
            // -- 40 --
            0x08, 0x00, 0x00, 0x01, b'S', b'H', 0x02, 0x00, b'A', b' ', // (0008,0100) CodeValue, len = 2
        ];

        let ground_truth = vec![
            DataToken::SequenceStart {
                tag: Tag(0x0008, 0x2218),
                len: Length(38),
            },
            DataToken::ItemStart { len: Length(30) },
            DataToken::SequenceStart {
                tag: Tag(0x0008, 0x0121),
                len: Length(18),
            },
            DataToken::ItemStart { len: Length(10) },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0008, 0x0100),
                vr: VR::SH,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(b"A ".to_vec()),
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
        ];

        validate_dataset_reader_explicit_vr(DATA, ground_truth);
    }

    #[test]
    fn read_implicit_vr_dataset() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            // (0008,0000) group length, resolved to UL through the dictionary
            0x08, 0x00, 0x00, 0x00, // tag
            0x04, 0x00, 0x00, 0x00, // length: 4
            0x0c, 0x00, 0x00, 0x00, // value: 12
            // -- 12 --
            // (0010,0010) unknown to the structural dictionary: UN
            0x10, 0x00, 0x10, 0x00, // tag
            0x08, 0x00, 0x00, 0x00, // length: 8
            b'D', b'O', b'E', b'^', b'J', b'A', b'N', b'E',
        ];

        let ground_truth = vec![
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0008, 0x0000),
                vr: VR::UL,
                len: Length(4),
            }),
            DataToken::PrimitiveValue(vec![0x0c, 0x00, 0x00, 0x00]),
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0010, 0x0010),
                vr: VR::UN,
                len: Length(8),
            }),
            DataToken::PrimitiveValue(b"DOE^JANE".to_vec()),
        ];

        validate_dataset_reader_implicit_vr(DATA, ground_truth);
    }

    #[test]
    fn undefined_length_on_plain_element_is_an_error() {
        // (0010,0010) PN with a rectified undefined length:
        // a value cannot be read for it
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x10, 0x00, 0x10, 0x00, b'P', b'N', 0xff, 0xff,
        ];

        let parser = StatefulDecoder::new(
            DATA,
            ExplicitVRLittleEndianDecoder::default(),
            LittleEndianBasicDecoder,
        );
        let mut dset_reader = DataSetReader::new(parser);

        let token = dset_reader
            .next()
            .expect("a header token")
            .expect("should parse the header fine");
        assert!(matches!(
            token,
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0010, 0x0010),
                vr: VR::PN,
                ..
            })
        ));
        let err = dset_reader
            .next()
            .expect("a value outcome")
            .expect_err("reading the value must fail");
        assert!(matches!(err, super::Error::ReadValue { .. }));
    }

    #[test]
    fn reading_past_the_declared_end_is_an_error() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            // (0008,1115) ReferencedSeriesSequence; len = 4 (too short)
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x0a, 0x00, 0x00, 0x00, // item length: 10 (overruns the sequence)
            // -- 20 --
            0x08, 0x00, 0x00, 0x01, b'S', b'H', 0x02, 0x00, b'A', b' ',
        ];

        let parser = StatefulDecoder::new(
            DATA,
            ExplicitVRLittleEndianDecoder::default(),
            LittleEndianBasicDecoder,
        );
        let dset_reader = DataSetReader::new(parser);

        let err = dset_reader
            .map(|res| res.map(|_| ()))
            .collect::<Result<Vec<_>, _>>()
            .expect_err("the overrun must surface as an error");
        assert!(matches!(err, super::Error::InconsistentSequenceEnd { .. }));
    }
}
