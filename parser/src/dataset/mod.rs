//! Interpretation of DICOM data sets as streams of tokens.
//!
//! At this level, the headers and values retrieved from the lower layers
//! are treated as tokens which outline the structure of the data set:
//! where elements, sequences and items start and end. A consumer can fold
//! the token stream into a full in-memory tree, which is what the object
//! layer does.

use dicomet_core::header::{DataElementHeader, Length, Tag};
use std::fmt;

pub mod read;

/// A token of a DICOM data set stream.
#[derive(Debug, Clone)]
pub enum DataToken {
    /// A data element header, for an element not part of a sequence.
    /// The element's value comes in the following token.
    ElementHeader(DataElementHeader),
    /// The raw value of the last data element.
    PrimitiveValue(Vec<u8>),
    /// The beginning of a sequence element.
    SequenceStart {
        /// the sequence tag
        tag: Tag,
        /// the declared sequence value length
        len: Length,
    },
    /// The beginning of a new item in the sequence.
    ItemStart {
        /// the declared item length
        len: Length,
    },
    /// The ending delimiter of an item.
    ItemEnd,
    /// The ending delimiter of a sequence.
    SequenceEnd,
}

/// This implementation treats undefined lengths as equal.
impl PartialEq<Self> for DataToken {
    fn eq(&self, other: &Self) -> bool {
        use DataToken::*;
        match (self, other) {
            (
                ElementHeader(DataElementHeader {
                    tag: tag1,
                    vr: vr1,
                    len: len1,
                }),
                ElementHeader(DataElementHeader {
                    tag: tag2,
                    vr: vr2,
                    len: len2,
                }),
            ) => tag1 == tag2 && vr1 == vr2 && len1.inner_eq(*len2),
            (
                SequenceStart {
                    tag: tag1,
                    len: len1,
                },
                SequenceStart {
                    tag: tag2,
                    len: len2,
                },
            ) => tag1 == tag2 && len1.inner_eq(*len2),
            (ItemStart { len: len1 }, ItemStart { len: len2 }) => len1.inner_eq(*len2),
            (PrimitiveValue(v1), PrimitiveValue(v2)) => v1 == v2,
            (ItemEnd, ItemEnd) | (SequenceEnd, SequenceEnd) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DataToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataToken::ElementHeader(header) => {
                write!(f, "ElementHeader({}, {}, {})", header.tag, header.vr, header.len)
            }
            DataToken::PrimitiveValue(data) => write!(f, "PrimitiveValue({} bytes)", data.len()),
            DataToken::SequenceStart { tag, len } => write!(f, "SequenceStart({}, {})", tag, len),
            DataToken::ItemStart { len } => write!(f, "ItemStart({})", len),
            DataToken::ItemEnd => f.write_str("ItemEnd"),
            DataToken::SequenceEnd => f.write_str("SequenceEnd"),
        }
    }
}

/// The type of a container whose limit the data set reader is tracking.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SeqTokenType {
    /// A sequence value.
    Sequence,
    /// An item inside a sequence.
    Item,
}
