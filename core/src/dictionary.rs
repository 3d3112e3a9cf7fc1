//! The attribute dictionary seam used by Implicit VR decoding.
//!
//! When the value representation is not on the wire, it has to be inferred
//! from the tag. The decoder only needs enough of a dictionary to keep the
//! data set structurally navigable, so the implementation provided here is a
//! small structural table rather than the full standard dictionary. Tags
//! absent from the dictionary decode with the `UN` representation.

use crate::header::{Tag, VR};
use crate::tags;

/// Type trait for a dictionary of attribute tags,
/// queried for the value representation of an attribute
/// when decoding Implicit VR data sets.
pub trait DataDictionary {
    /// Fetch the value representation registered for the given tag,
    /// if the dictionary knows the attribute.
    fn vr_of(&self, tag: Tag) -> Option<VR>;
}

impl<T: ?Sized> DataDictionary for &T
where
    T: DataDictionary,
{
    fn vr_of(&self, tag: Tag) -> Option<VR> {
        (**self).vr_of(tag)
    }
}

impl<T: ?Sized> DataDictionary for Box<T>
where
    T: DataDictionary,
{
    fn vr_of(&self, tag: Tag) -> Option<VR> {
        (**self).vr_of(tag)
    }
}

/// A dictionary covering only the attributes with structural meaning:
/// group length elements, the file meta group identifiers, and the handful
/// of standard attributes the decoder special-cases. Everything else is
/// reported as unknown.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct StructuralDictionary;

impl DataDictionary for StructuralDictionary {
    fn vr_of(&self, tag: Tag) -> Option<VR> {
        // group length elements are always UL, for any group
        if tag.element() == 0x0000 {
            return Some(VR::UL);
        }

        match tag {
            tags::MEDIA_STORAGE_SOP_CLASS_UID
            | tags::MEDIA_STORAGE_SOP_INSTANCE_UID
            | tags::TRANSFER_SYNTAX_UID => Some(VR::UI),
            tags::SPECIFIC_CHARACTER_SET => Some(VR::CS),
            tags::PIXEL_DATA => Some(VR::OW),
            _ => None,
        }
    }
}

/// An empty attribute dictionary, for testing the unknown-attribute path.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct StubDictionary;

impl DataDictionary for StubDictionary {
    fn vr_of(&self, _tag: Tag) -> Option<VR> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_lengths_are_ul() {
        assert_eq!(
            StructuralDictionary.vr_of(tags::FILE_META_INFORMATION_GROUP_LENGTH),
            Some(VR::UL)
        );
        assert_eq!(StructuralDictionary.vr_of(Tag(0x0008, 0x0000)), Some(VR::UL));
        assert_eq!(StructuralDictionary.vr_of(Tag(0x7FE0, 0x0000)), Some(VR::UL));
    }

    #[test]
    fn unknown_attributes_have_no_vr() {
        assert_eq!(StructuralDictionary.vr_of(Tag(0x0010, 0x0010)), None);
        assert_eq!(StubDictionary.vr_of(Tag(0x0008, 0x0000)), None);
    }
}
