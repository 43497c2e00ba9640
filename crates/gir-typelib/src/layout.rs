//! Container member layout
//!
//! Struct, union, enum, object and interface blobs are followed directly by
//! their members, one group after another in a fixed order. The offset of
//! member `k` of group `G` is the container header size, plus the bytes of
//! every group before `G`, plus `k` times the element size of `G`.
//! Interface and prerequisite references are 2-byte directory indices padded
//! to an even count so that the first following blob stays 4-aligned.

use crate::blob::{enum_blob, interface, object, struct_blob, union_blob, BlobType};
use crate::reader::{offset_add, ReadError};
use crate::{Typelib, TypelibError};
use std::fmt;

/// Container blob kinds that own member groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Struct or boxed
    Struct,
    Union,
    /// Enum or flags
    Enum,
    Object,
    Interface,
}

impl ContainerKind {
    /// Container kind of a top-level blob type, if it has members
    pub fn from_blob_type(blob_type: BlobType) -> Option<Self> {
        match blob_type {
            BlobType::Struct | BlobType::Boxed => Some(ContainerKind::Struct),
            BlobType::Union => Some(ContainerKind::Union),
            BlobType::Enum | BlobType::Flags => Some(ContainerKind::Enum),
            BlobType::Object => Some(ContainerKind::Object),
            BlobType::Interface => Some(ContainerKind::Interface),
            _ => None,
        }
    }

    /// Member groups of this kind, in canonical order
    pub fn groups(self) -> &'static [MemberGroup] {
        use MemberGroup::*;
        match self {
            ContainerKind::Struct => &[Fields, Methods],
            ContainerKind::Union => &[Fields, Methods, Discriminators],
            ContainerKind::Enum => &[Values, Methods],
            ContainerKind::Object => &[
                Interfaces, Fields, Properties, Methods, Signals, VFuncs, Constants,
            ],
            ContainerKind::Interface => &[
                Prerequisites,
                Properties,
                Methods,
                Signals,
                VFuncs,
                Constants,
            ],
        }
    }
}

/// A group of homogeneous members inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberGroup {
    /// Implemented interfaces (directory indices)
    Interfaces,
    /// Interface prerequisites (directory indices)
    Prerequisites,
    Fields,
    Properties,
    /// Methods, or functions of a union
    Methods,
    Signals,
    VFuncs,
    Constants,
    /// Enum values
    Values,
    /// Per-field discriminator constants of a union
    Discriminators,
}

impl MemberGroup {
    /// Size of one member of this group
    pub fn element_size(self, typelib: &Typelib) -> u32 {
        let sizes = &typelib.header().sizes;
        u32::from(match self {
            MemberGroup::Interfaces | MemberGroup::Prerequisites => 2,
            MemberGroup::Fields => sizes.field,
            MemberGroup::Properties => sizes.property,
            MemberGroup::Methods => sizes.function,
            MemberGroup::Signals => sizes.signal,
            MemberGroup::VFuncs => sizes.vfunc,
            MemberGroup::Constants | MemberGroup::Discriminators => sizes.constant,
            MemberGroup::Values => sizes.value,
        })
    }

    /// Whether the group's byte size is padded to an even count
    pub fn is_padded(self) -> bool {
        matches!(self, MemberGroup::Interfaces | MemberGroup::Prerequisites)
    }

    /// Lowercase plural name, used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            MemberGroup::Interfaces => "interfaces",
            MemberGroup::Prerequisites => "prerequisites",
            MemberGroup::Fields => "fields",
            MemberGroup::Properties => "properties",
            MemberGroup::Methods => "methods",
            MemberGroup::Signals => "signals",
            MemberGroup::VFuncs => "vfuncs",
            MemberGroup::Constants => "constants",
            MemberGroup::Values => "values",
            MemberGroup::Discriminators => "discriminators",
        }
    }
}

impl fmt::Display for MemberGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One group's count and element size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSpan {
    pub group: MemberGroup,
    pub count: u32,
    pub element_size: u32,
}

impl GroupSpan {
    /// Bytes occupied by the whole group
    pub fn byte_size(&self) -> u64 {
        let count = u64::from(self.count);
        let slots = if self.group.is_padded() {
            count + count % 2
        } else {
            count
        };
        slots * u64::from(self.element_size)
    }
}

fn advance(offset: u32, bytes: u64) -> Result<u32, ReadError> {
    u64::from(offset)
        .checked_add(bytes)
        .and_then(|end| u32::try_from(end).ok())
        .ok_or(ReadError::OffsetOverflow {
            base: offset,
            delta: bytes,
        })
}

/// Member layout of one container blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLayout {
    offset: u32,
    header_size: u32,
    spans: Vec<GroupSpan>,
}

impl ContainerLayout {
    /// Layout from explicit spans, listed in canonical order
    pub fn new(offset: u32, header_size: u32, spans: Vec<GroupSpan>) -> Self {
        Self {
            offset,
            header_size,
            spans,
        }
    }

    /// Read the member counts of the container blob at `offset`
    pub fn read(
        typelib: &Typelib,
        kind: ContainerKind,
        offset: u32,
    ) -> Result<Self, TypelibError> {
        let sizes = &typelib.header().sizes;
        let count = |field: u32| -> Result<u32, TypelibError> {
            Ok(u32::from(typelib.u16_field(offset, field)?))
        };
        let (header_size, counts): (u16, Vec<u32>) = match kind {
            ContainerKind::Struct => (
                sizes.struct_blob,
                vec![count(struct_blob::N_FIELDS)?, count(struct_blob::N_METHODS)?],
            ),
            ContainerKind::Union => {
                let n_fields = count(union_blob::N_FIELDS)?;
                let flags = typelib.u16_field(offset, crate::blob::common::FLAGS)?;
                let n_discriminators = if flags & union_blob::DISCRIMINATED != 0 {
                    n_fields
                } else {
                    0
                };
                (
                    sizes.union_blob,
                    vec![n_fields, count(union_blob::N_FUNCTIONS)?, n_discriminators],
                )
            }
            ContainerKind::Enum => (
                sizes.enum_blob,
                vec![count(enum_blob::N_VALUES)?, count(enum_blob::N_METHODS)?],
            ),
            ContainerKind::Object => (
                sizes.object,
                vec![
                    count(object::N_INTERFACES)?,
                    count(object::N_FIELDS)?,
                    count(object::N_PROPERTIES)?,
                    count(object::N_METHODS)?,
                    count(object::N_SIGNALS)?,
                    count(object::N_VFUNCS)?,
                    count(object::N_CONSTANTS)?,
                ],
            ),
            ContainerKind::Interface => (
                sizes.interface,
                vec![
                    count(interface::N_PREREQUISITES)?,
                    count(interface::N_PROPERTIES)?,
                    count(interface::N_METHODS)?,
                    count(interface::N_SIGNALS)?,
                    count(interface::N_VFUNCS)?,
                    count(interface::N_CONSTANTS)?,
                ],
            ),
        };
        let spans = kind
            .groups()
            .iter()
            .zip(counts)
            .map(|(&group, count)| GroupSpan {
                group,
                count,
                element_size: group.element_size(typelib),
            })
            .collect();
        Ok(Self::new(offset, u32::from(header_size), spans))
    }

    /// Offset of the container blob itself
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Spans in canonical order
    pub fn spans(&self) -> &[GroupSpan] {
        &self.spans
    }

    /// Number of members in `group` (0 if the container has no such group)
    pub fn count(&self, group: MemberGroup) -> u32 {
        self.spans
            .iter()
            .find(|span| span.group == group)
            .map_or(0, |span| span.count)
    }

    /// Offset of the first member of `group`
    pub fn group_offset(&self, group: MemberGroup) -> Result<u32, TypelibError> {
        let mut offset = offset_add(self.offset, self.header_size)?;
        for span in &self.spans {
            if span.group == group {
                return Ok(offset);
            }
            offset = advance(offset, span.byte_size())?;
        }
        Err(TypelibError::NoSuchGroup(group))
    }

    /// Offset of member `index` of `group`
    pub fn member_offset(&self, group: MemberGroup, index: u32) -> Result<u32, TypelibError> {
        let mut offset = offset_add(self.offset, self.header_size)?;
        for span in &self.spans {
            if span.group == group {
                if index >= span.count {
                    return Err(TypelibError::MemberIndexOutOfRange {
                        group,
                        index,
                        count: span.count,
                    });
                }
                return Ok(advance(
                    offset,
                    u64::from(index) * u64::from(span.element_size),
                )?);
            }
            offset = advance(offset, span.byte_size())?;
        }
        Err(TypelibError::NoSuchGroup(group))
    }

    /// Offset one past the last member
    pub fn end(&self) -> Result<u32, TypelibError> {
        let mut offset = offset_add(self.offset, self.header_size)?;
        for span in &self.spans {
            offset = advance(offset, span.byte_size())?;
        }
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(group: MemberGroup, count: u32, element_size: u32) -> GroupSpan {
        GroupSpan {
            group,
            count,
            element_size,
        }
    }

    #[test]
    fn test_struct_member_offsets() {
        let layout = ContainerLayout::new(
            1000,
            20,
            vec![
                span(MemberGroup::Fields, 2, 12),
                span(MemberGroup::Methods, 1, 20),
            ],
        );
        assert_eq!(layout.member_offset(MemberGroup::Fields, 1).unwrap(), 1000 + 20 + 12);
        assert_eq!(
            layout.member_offset(MemberGroup::Methods, 0).unwrap(),
            1000 + 20 + 2 * 12
        );
        assert_eq!(layout.end().unwrap(), 1000 + 20 + 24 + 20);
    }

    #[test]
    fn test_offsets_past_u32_are_errors() {
        let layout = ContainerLayout::new(
            0xFFFF_FF00,
            20,
            vec![
                span(MemberGroup::Fields, 40, 12),
                span(MemberGroup::Methods, 1, 20),
            ],
        );
        assert!(layout.member_offset(MemberGroup::Fields, 0).is_ok());
        assert!(matches!(
            layout.member_offset(MemberGroup::Fields, 30),
            Err(TypelibError::Read(ReadError::OffsetOverflow { .. }))
        ));
        assert!(matches!(
            layout.group_offset(MemberGroup::Methods),
            Err(TypelibError::Read(ReadError::OffsetOverflow { .. }))
        ));
        assert!(layout.end().is_err());
    }

    #[test]
    fn test_out_of_range_does_not_alias_next_group() {
        let layout = ContainerLayout::new(
            0,
            20,
            vec![
                span(MemberGroup::Fields, 2, 12),
                span(MemberGroup::Methods, 1, 20),
            ],
        );
        assert!(matches!(
            layout.member_offset(MemberGroup::Fields, 2),
            Err(TypelibError::MemberIndexOutOfRange {
                group: MemberGroup::Fields,
                index: 2,
                count: 2
            })
        ));
        assert!(matches!(
            layout.member_offset(MemberGroup::Signals, 0),
            Err(TypelibError::NoSuchGroup(MemberGroup::Signals))
        ));
    }

    #[test]
    fn test_interface_slots_padded_to_even() {
        let layout = ContainerLayout::new(
            0,
            36,
            vec![
                span(MemberGroup::Interfaces, 3, 2),
                span(MemberGroup::Fields, 1, 12),
            ],
        );
        assert_eq!(layout.member_offset(MemberGroup::Interfaces, 2).unwrap(), 36 + 4);
        assert_eq!(layout.group_offset(MemberGroup::Fields).unwrap(), 36 + 8);

        let odd_one = ContainerLayout::new(
            0,
            36,
            vec![
                span(MemberGroup::Interfaces, 1, 2),
                span(MemberGroup::Fields, 1, 12),
            ],
        );
        assert_eq!(odd_one.group_offset(MemberGroup::Fields).unwrap(), 36 + 4);
    }

    #[test]
    fn test_empty_groups_contribute_nothing() {
        let layout = ContainerLayout::new(
            0,
            32,
            vec![
                span(MemberGroup::Prerequisites, 0, 2),
                span(MemberGroup::Properties, 0, 12),
                span(MemberGroup::Methods, 2, 20),
            ],
        );
        assert_eq!(layout.member_offset(MemberGroup::Methods, 1).unwrap(), 32 + 20);
        assert_eq!(layout.count(MemberGroup::Properties), 0);
        assert_eq!(layout.count(MemberGroup::Values), 0);
    }
}
