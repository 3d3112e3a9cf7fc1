//! This module contains the in-memory representation of a DICOM data set
//! and the routines for building it out of a data set token stream.
//!
//! The element order seen in the byte stream is preserved, and elements
//! with duplicate tags are retained verbatim; validating them is the
//! concern of a higher layer.

use dicomet_core::header::{Header, Length, Tag, VR};
use dicomet_core::value::{DataElement, DataSetSequence, Item, ItemList, Value};
use dicomet_parser::dataset::DataToken;
use snafu::{OptionExt, ResultExt, Snafu};

/// The type of a data element owned by an in-memory data set.
pub type InMemElement = DataElement<InMemDataSet>;

type ParserResult<T> = std::result::Result<T, dicomet_parser::dataset::read::Error>;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Could not read the next data set token
    #[snafu(display("could not read data set token"))]
    ReadToken {
        #[snafu(backtrace)]
        source: dicomet_parser::dataset::read::Error,
    },

    /// The data set ended between an element header and its value
    #[snafu(display("data set ended before the value of the last element"))]
    MissingElementValue { backtrace: snafu::Backtrace },

    /// The data set ended inside a sequence
    #[snafu(display("data set ended before the end of the sequence"))]
    PrematureEnd { backtrace: snafu::Backtrace },

    /// A token which does not belong in its position
    #[snafu(display("unexpected token {} in data set", token))]
    UnexpectedToken {
        token: DataToken,
        backtrace: snafu::Backtrace,
    },

    /// Could not read the value of a sequence element
    #[snafu(display("could not read sequence with tag {}", tag))]
    ReadSequence {
        tag: Tag,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Could not read one of the items of a sequence
    #[snafu(display("could not read item #{} of the sequence", index))]
    ReadItem {
        index: usize,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// An in-memory DICOM data set: an ordered list of data elements,
/// along with the declared length of the container it was read from
/// (undefined for the top-level data set and for delimited items).
#[derive(Debug, Clone)]
pub struct InMemDataSet {
    elems: Vec<InMemElement>,
    len: Length,
}

/// The declared container length does not take part in equality:
/// two data sets are equal when they hold the same elements
/// in the same order.
impl PartialEq for InMemDataSet {
    fn eq(&self, other: &Self) -> bool {
        self.elems == other.elems
    }
}

impl Default for InMemDataSet {
    fn default() -> Self {
        InMemDataSet::new()
    }
}

impl InMemDataSet {
    /// Create a new empty data set.
    pub fn new() -> Self {
        InMemDataSet {
            elems: Vec::new(),
            len: Length::UNDEFINED,
        }
    }

    /// Getter for the data elements, in the order they were decoded.
    pub fn elements(&self) -> &[InMemElement] {
        &self.elems
    }

    /// The number of data elements in this data set.
    pub fn element_count(&self) -> usize {
        self.elems.len()
    }

    /// The declared length of the container this data set was read from.
    pub fn length(&self) -> Length {
        self.len
    }

    /// Find the first data element with the given tag, if any.
    /// Duplicates are retained in the data set, so later occurrences
    /// are only reachable by iterating over [`elements`](Self::elements).
    pub fn element(&self, tag: Tag) -> Option<&InMemElement> {
        self.elems.iter().find(|e| e.tag() == tag)
    }

    /// Build a data set by draining tokens from the given source.
    ///
    /// When `in_item` is true, the data set is the content of an item and
    /// an item end token finishes it; at the top level, the token stream
    /// is expected to simply run out.
    pub(crate) fn build_object<I: ?Sized>(
        dataset: &mut I,
        in_item: bool,
        len: Length,
    ) -> Result<Self>
    where
        I: Iterator<Item = ParserResult<DataToken>>,
    {
        let mut elems = Vec::new();

        // perform a structured parsing of incoming tokens
        while let Some(token) = dataset.next() {
            let elem = match token.context(ReadTokenSnafu)? {
                DataToken::ElementHeader(header) => {
                    // fetch the respective value
                    let next_token = dataset.next().context(MissingElementValueSnafu)?;
                    match next_token.context(ReadTokenSnafu)? {
                        DataToken::PrimitiveValue(v) => InMemElement::new_with_len(
                            header.tag,
                            header.vr,
                            header.len,
                            Value::Primitive(v),
                        ),
                        token => return UnexpectedTokenSnafu { token }.fail(),
                    }
                }
                DataToken::SequenceStart { tag, len } => {
                    // delegate sequence building to another function
                    let seq = Self::build_sequence(len, &mut *dataset)
                        .context(ReadSequenceSnafu { tag })?;
                    InMemElement::new_with_len(tag, VR::SQ, len, Value::Sequence(seq))
                }
                DataToken::ItemEnd if in_item => {
                    // end of item, leave now
                    return Ok(InMemDataSet { elems, len });
                }
                token => return UnexpectedTokenSnafu { token }.fail(),
            };
            elems.push(elem);
        }

        Ok(InMemDataSet { elems, len })
    }

    /// Build the item list of a sequence value
    /// by draining tokens from the given source.
    fn build_sequence<I: ?Sized>(
        len: Length,
        dataset: &mut I,
    ) -> Result<DataSetSequence<InMemDataSet>>
    where
        I: Iterator<Item = ParserResult<DataToken>>,
    {
        let mut items: ItemList<InMemDataSet> = ItemList::new();
        while let Some(token) = dataset.next() {
            match token.context(ReadTokenSnafu)? {
                DataToken::ItemStart { len: item_len } => {
                    let data = Self::build_object(&mut *dataset, true, item_len)
                        .context(ReadItemSnafu { index: items.len() })?;
                    items.push(Item::new(item_len, data));
                }
                DataToken::SequenceEnd => {
                    return Ok(DataSetSequence::new(items, len));
                }
                token => return UnexpectedTokenSnafu { token }.fail(),
            }
        }

        // the token stream ended inside the sequence
        PrematureEndSnafu.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, InMemDataSet};
    use dicomet_core::header::{Header, Length};
    use dicomet_core::{Tag, VR};
    use dicomet_encoding::decode::basic::LittleEndianBasicDecoder;
    use dicomet_encoding::decode::explicit_le::ExplicitVRLittleEndianDecoder;
    use dicomet_parser::{DataSetReader, StatefulDecoder};

    fn read_data_set(data: &[u8]) -> Result<InMemDataSet, Error> {
        let parser = StatefulDecoder::new(
            data,
            ExplicitVRLittleEndianDecoder::default(),
            LittleEndianBasicDecoder,
        );
        let mut dataset = DataSetReader::new(parser);
        InMemDataSet::build_object(&mut dataset, false, Length::UNDEFINED)
    }

    #[test]
    fn build_flat_data_set() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x08, 0x00, // (0010,0010) PN, len = 8
            b'D', b'O', b'E', b'^', b'J', b'A', b'N', b'E',
            0x10, 0x00, 0x20, 0x00, b'L', b'O', 0x04, 0x00, // (0010,0020) LO, len = 4
            b'1', b'2', b'3', b'4',
        ];

        let obj = read_data_set(DATA).expect("should build the data set");
        assert_eq!(obj.element_count(), 2);
        let elem = obj.element(Tag(0x0010, 0x0010)).expect("should be present");
        assert_eq!(elem.vr(), VR::PN);
        assert_eq!(elem.value().primitive(), Some(b"DOE^JANE".as_ref()));
    }

    #[test]
    fn duplicate_tags_are_retained_in_order() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x10, 0x00, 0x20, 0x00, b'L', b'O', 0x04, 0x00, b'A', b'B', b'C', b'1',
            0x10, 0x00, 0x20, 0x00, b'L', b'O', 0x04, 0x00, b'A', b'B', b'C', b'2',
        ];

        let obj = read_data_set(DATA).expect("should build the data set");
        assert_eq!(obj.element_count(), 2);
        assert_eq!(
            obj.elements()[0].value().primitive(),
            Some(b"ABC1".as_ref())
        );
        assert_eq!(
            obj.elements()[1].value().primitive(),
            Some(b"ABC2".as_ref())
        );
        // lookup by tag reaches the first occurrence
        assert_eq!(
            obj.element(Tag(0x0010, 0x0020))
                .and_then(|e| e.value().primitive()),
            Some(b"ABC1".as_ref())
        );
    }

    #[test]
    fn build_data_set_with_sequence() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            // (0008,1115) ReferencedSeriesSequence, len = 46, two items of 15 bytes
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, 0x2e, 0x00, 0x00, 0x00,
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, 0x0f, 0x00, 0x00, 0x00, // item, len = 15
            0x10, 0x00, 0x20, 0x00, b'L', b'O', 0x07, 0x00, // (0010,0020) LO, len = 7
            b'A', b'B', b'C', b'1', b'2', b'3', b'4',
            // -- 35 --
            0xfe, 0xff, 0x00, 0xe0, 0x0f, 0x00, 0x00, 0x00, // item, len = 15
            0x10, 0x00, 0x20, 0x00, b'L', b'O', 0x07, 0x00,
            b'A', b'B', b'C', b'1', b'2', b'3', b'4',
        ];

        let obj = read_data_set(DATA).expect("should build the data set");
        assert_eq!(obj.element_count(), 1);

        let elem = obj.element(Tag(0x0008, 0x1115)).expect("should be present");
        assert_eq!(elem.vr(), VR::SQ);
        assert_eq!(elem.length(), Length(46));
        let items = elem.value().items().expect("should hold items");
        assert_eq!(items.len(), 2);
        for item in items {
            assert_eq!(item.length(), Length(15));
            assert_eq!(item.dataset().element_count(), 1);
            let inner = item
                .dataset()
                .element(Tag(0x0010, 0x0020))
                .expect("should be present");
            assert_eq!(inner.value().primitive(), Some(b"ABC1234".as_ref()));
        }
    }

    #[test]
    fn sequence_errors_carry_their_context() {
        // sequence of undefined length whose single item never ends
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
            0xfe, 0xff, 0x00, 0xe0, 0xff, 0xff, 0xff, 0xff,
        ];

        let err = read_data_set(DATA).expect_err("the open sequence must fail the build");
        assert!(matches!(
            err,
            Error::ReadSequence {
                tag: Tag(0x0008, 0x1115),
                ..
            }
        ));
    }
}
