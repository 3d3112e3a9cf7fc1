//! Types for the values carried by decoded data elements:
//! raw primitive payloads and nested sequences of items.
//!
//! The concrete data set type is defined downstream, so the types here are
//! generic over the item type `I`.

use crate::header::{DataElementHeader, Header, Length, Tag, VR};
use smallvec::SmallVec;

/// The container type for the items of a sequence.
/// Most sequences in practice hold very few items,
/// so a couple of them are kept inline.
pub type ItemList<I> = SmallVec<[Item<I>; 2]>;

/// A single item of a sequence: the nested data set
/// together with the item length declared on the wire.
#[derive(Debug, Clone)]
pub struct Item<I> {
    len: Length,
    dataset: I,
}

/// The declared length does not take part in equality:
/// an undefined length never equals another length,
/// and two items holding the same data set are the same item.
impl<I> PartialEq for Item<I>
where
    I: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.dataset == other.dataset
    }
}

impl<I> Item<I> {
    /// Create an item from its declared length and nested data set.
    pub fn new(len: Length, dataset: I) -> Self {
        Item { len, dataset }
    }

    /// The item length as declared on the wire,
    /// undefined when the item was closed by an item delimiter.
    pub fn length(&self) -> Length {
        self.len
    }

    /// Getter for the item's nested data set.
    pub fn dataset(&self) -> &I {
        &self.dataset
    }

    /// Extract the nested data set, discarding the declared length.
    pub fn into_dataset(self) -> I {
        self.dataset
    }
}

/// The value of a sequence element: an ordered list of items
/// and the sequence length declared on the wire.
#[derive(Debug, Clone)]
pub struct DataSetSequence<I> {
    items: ItemList<I>,
    len: Length,
}

/// The declared length does not take part in equality.
impl<I> PartialEq for DataSetSequence<I>
where
    I: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<I> DataSetSequence<I> {
    /// Create a sequence value from its items and declared length.
    pub fn new(items: impl Into<ItemList<I>>, len: Length) -> Self {
        DataSetSequence {
            items: items.into(),
            len,
        }
    }

    /// Getter for the sequence items, in the order seen on the wire.
    pub fn items(&self) -> &[Item<I>] {
        &self.items
    }

    /// The sequence length as declared on the wire,
    /// undefined when the sequence was closed by a sequence delimiter.
    pub fn length(&self) -> Length {
        self.len
    }

    /// The number of items in the sequence.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// A decoded data element value: either the raw byte payload of a
/// non-sequence element, or a nested sequence of items. A data element
/// holds exactly one of the two.
#[derive(Debug, PartialEq, Clone)]
pub enum Value<I> {
    /// The raw value payload, exactly as many bytes as the declared length.
    Primitive(Vec<u8>),
    /// A nested sequence of items (VR `SQ`).
    Sequence(DataSetSequence<I>),
}

impl<I> Value<I> {
    /// Check whether the value is a sequence.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(..))
    }

    /// Retrieve the raw bytes of a primitive value,
    /// or `None` if this is a sequence.
    pub fn primitive(&self) -> Option<&[u8]> {
        match self {
            Value::Primitive(data) => Some(data),
            Value::Sequence(..) => None,
        }
    }

    /// Retrieve the items of a sequence value,
    /// or `None` if this is a primitive value.
    pub fn items(&self) -> Option<&[Item<I>]> {
        match self {
            Value::Primitive(..) => None,
            Value::Sequence(seq) => Some(seq.items()),
        }
    }
}

impl<I> From<Vec<u8>> for Value<I> {
    fn from(data: Vec<u8>) -> Self {
        Value::Primitive(data)
    }
}

impl<I> From<DataSetSequence<I>> for Value<I> {
    fn from(seq: DataSetSequence<I>) -> Self {
        Value::Sequence(seq)
    }
}

/// A data type that represents and owns a decoded DICOM data element.
/// Sequence elements contain nested data sets of type `I`.
#[derive(Debug, Clone)]
pub struct DataElement<I> {
    header: DataElementHeader,
    value: Value<I>,
}

/// Equality compares the raw declared length,
/// so two elements of undefined length can compare equal.
impl<I> PartialEq for DataElement<I>
where
    I: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.header.tag == other.header.tag
            && self.header.vr == other.header.vr
            && self.header.len.inner_eq(other.header.len)
            && self.value == other.value
    }
}

impl<I> Header for DataElement<I> {
    #[inline]
    fn tag(&self) -> Tag {
        self.header.tag()
    }

    #[inline]
    fn length(&self) -> Length {
        self.header.length()
    }
}

impl<I> DataElement<I> {
    /// Create a data element from the given parts, with the length declared
    /// on the wire. The length is kept verbatim: it is not derived from the
    /// value, so undefined lengths survive the round through memory.
    pub fn new_with_len<T: Into<Tag>>(tag: T, vr: VR, len: Length, value: Value<I>) -> Self {
        DataElement {
            header: DataElementHeader::new(tag, vr, len),
            value,
        }
    }

    /// Retrieve the element header.
    pub fn header(&self) -> &DataElementHeader {
        &self.header
    }

    /// Retrieve the element's value representation.
    pub fn vr(&self) -> VR {
        self.header.vr()
    }

    /// Retrieve a reference to the element's value.
    pub fn value(&self) -> &Value<I> {
        &self.value
    }

    /// Extract the value from the element, discarding the header.
    pub fn into_value(self) -> Value<I> {
        self.value
    }
}
