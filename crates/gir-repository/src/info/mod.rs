//! Info objects
//!
//! An info object is a reference-counted handle onto one blob of a typelib:
//! its kind, the shared buffer, the blob offset and, for members, the
//! container it was reached from. Handles never copy or modify the bytes;
//! every accessor is a read through a computed offset. Navigation creates a
//! fresh handle on every call, so two lookups of the same entity yield two
//! handles over the same bytes (see [`BaseInfo::same_blob`]).
//!
//! Cross-module references that cannot be resolved produce an
//! [`InfoType::Unresolved`] handle that only knows its name and namespace;
//! every blob accessor on it fails with [`InfoError::Unresolved`].

mod callable;
mod constant;
mod container;
mod enums;
mod members;
mod registered;
mod type_info;

pub use callable::{ArgInfo, Callable, CallableInfo, CallbackInfo, FunctionInfo, SignalInfo, VFuncInfo};
pub use constant::{ConstantInfo, ErrorDomainInfo};
pub use container::{InterfaceInfo, ObjectInfo, StructInfo, UnionInfo};
pub use enums::{EnumInfo, ValueInfo};
pub use members::{FieldInfo, PropertyInfo};
pub use registered::{RegisteredType, RegisteredTypeInfo};
pub use type_info::TypeInfo;

use crate::InfoError;
use gir_typelib::blob::{common, property, signal, value};
use gir_typelib::{
    Annotation, BlobType, ContainerKind, ContainerLayout, MemberGroup, Typelib,
};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

// ============================================================================
// Kinds
// ============================================================================

/// Kind of an info object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoType {
    Function,
    Callback,
    Struct,
    Boxed,
    Enum,
    Flags,
    Object,
    Interface,
    Constant,
    ErrorDomain,
    Union,
    Value,
    Signal,
    VFunc,
    Property,
    Field,
    Arg,
    Type,
    /// Cross-module reference that could not be resolved
    Unresolved,
}

impl InfoType {
    /// Kind of the info built for a top-level blob type
    pub fn from_blob_type(blob_type: BlobType) -> Self {
        match blob_type {
            BlobType::Function => InfoType::Function,
            BlobType::Callback => InfoType::Callback,
            BlobType::Struct => InfoType::Struct,
            BlobType::Boxed => InfoType::Boxed,
            BlobType::Enum => InfoType::Enum,
            BlobType::Flags => InfoType::Flags,
            BlobType::Object => InfoType::Object,
            BlobType::Interface => InfoType::Interface,
            BlobType::Constant => InfoType::Constant,
            BlobType::ErrorDomain => InfoType::ErrorDomain,
            BlobType::Union => InfoType::Union,
            BlobType::Invalid => InfoType::Unresolved,
        }
    }

    /// Member layout of container kinds
    pub fn container_kind(self) -> Option<ContainerKind> {
        match self {
            InfoType::Struct | InfoType::Boxed => Some(ContainerKind::Struct),
            InfoType::Union => Some(ContainerKind::Union),
            InfoType::Enum | InfoType::Flags => Some(ContainerKind::Enum),
            InfoType::Object => Some(ContainerKind::Object),
            InfoType::Interface => Some(ContainerKind::Interface),
            _ => None,
        }
    }

    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            InfoType::Function => "function",
            InfoType::Callback => "callback",
            InfoType::Struct => "struct",
            InfoType::Boxed => "boxed",
            InfoType::Enum => "enum",
            InfoType::Flags => "flags",
            InfoType::Object => "object",
            InfoType::Interface => "interface",
            InfoType::Constant => "constant",
            InfoType::ErrorDomain => "error domain",
            InfoType::Union => "union",
            InfoType::Value => "value",
            InfoType::Signal => "signal",
            InfoType::VFunc => "vfunc",
            InfoType::Property => "property",
            InfoType::Field => "field",
            InfoType::Arg => "arg",
            InfoType::Type => "type",
            InfoType::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for InfoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Base info
// ============================================================================

enum Location {
    Blob { typelib: Typelib, offset: u32 },
    Unresolved { namespace: String, name: String },
}

struct InfoInner {
    kind: InfoType,
    container: Option<BaseInfo>,
    location: Location,
    /// Lazily built name -> index maps, keyed by member group
    name_index: OnceLock<FxHashMap<MemberGroup, FxHashMap<String, u32>>>,
}

/// Reference-counted handle onto one blob
///
/// Cloning acquires a reference, dropping releases it. A member handle keeps
/// exactly one reference on its container for as long as it lives.
#[derive(Clone)]
pub struct BaseInfo(Arc<InfoInner>);

impl BaseInfo {
    /// Handle onto the blob of `kind` at `offset`
    pub fn new(kind: InfoType, container: Option<BaseInfo>, typelib: Typelib, offset: u32) -> Self {
        Self(Arc::new(InfoInner {
            kind,
            container,
            location: Location::Blob { typelib, offset },
            name_index: OnceLock::new(),
        }))
    }

    /// Placeholder for a cross-module reference that could not be resolved
    pub fn unresolved(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self(Arc::new(InfoInner {
            kind: InfoType::Unresolved,
            container: None,
            location: Location::Unresolved {
                namespace: namespace.into(),
                name: name.into(),
            },
            name_index: OnceLock::new(),
        }))
    }

    /// Kind of this info
    pub fn kind(&self) -> InfoType {
        self.0.kind
    }

    /// Whether this is an unresolved reference
    pub fn is_unresolved(&self) -> bool {
        matches!(self.0.location, Location::Unresolved { .. })
    }

    /// Info this one was reached from
    pub fn container(&self) -> Option<&BaseInfo> {
        self.0.container.as_ref()
    }

    /// Number of live handles sharing this info
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Typelib holding the blob
    pub fn typelib(&self) -> Result<&Typelib, InfoError> {
        match &self.0.location {
            Location::Blob { typelib, .. } => Ok(typelib),
            Location::Unresolved { namespace, name } => Err(InfoError::Unresolved {
                namespace: namespace.clone(),
                name: name.clone(),
            }),
        }
    }

    /// Offset of the blob
    pub fn offset(&self) -> Result<u32, InfoError> {
        match &self.0.location {
            Location::Blob { offset, .. } => Ok(*offset),
            Location::Unresolved { namespace, name } => Err(InfoError::Unresolved {
                namespace: namespace.clone(),
                name: name.clone(),
            }),
        }
    }

    /// Typelib and offset in one call
    pub(crate) fn blob(&self) -> Result<(&Typelib, u32), InfoError> {
        Ok((self.typelib()?, self.offset()?))
    }

    /// Whether both handles refer to the same bytes
    pub fn same_blob(&self, other: &BaseInfo) -> bool {
        match (&self.0.location, &other.0.location) {
            (
                Location::Blob { typelib: a, offset: x },
                Location::Blob { typelib: b, offset: y },
            ) => a.ptr_eq(b) && x == y,
            (
                Location::Unresolved { namespace: a, name: x },
                Location::Unresolved { namespace: b, name: y },
            ) => a == b && x == y,
            _ => false,
        }
    }

    // ===== Common accessors =====

    /// Entity name
    pub fn name(&self) -> Result<&str, InfoError> {
        let field = match self.kind() {
            InfoType::Unresolved => {
                return match &self.0.location {
                    Location::Unresolved { name, .. } => Ok(name),
                    Location::Blob { .. } => Err(InfoError::NoName(InfoType::Unresolved)),
                };
            }
            InfoType::Type => return Err(InfoError::NoName(InfoType::Type)),
            InfoType::Value => value::NAME,
            InfoType::Signal => signal::NAME,
            InfoType::VFunc | InfoType::Property | InfoType::Field | InfoType::Arg => 0,
            _ => common::NAME,
        };
        let (typelib, offset) = self.blob()?;
        Ok(typelib.string(typelib.u32_field(offset, field)?)?)
    }

    /// Namespace the entity belongs to
    pub fn namespace(&self) -> Result<&str, InfoError> {
        match &self.0.location {
            Location::Blob { typelib, .. } => Ok(typelib.namespace()),
            Location::Unresolved { namespace, .. } => Ok(namespace),
        }
    }

    /// Whether the entity is marked deprecated
    pub fn is_deprecated(&self) -> Result<bool, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(match self.kind() {
            InfoType::Value => typelib.u32_field(offset, value::FLAGS)? & value::DEPRECATED != 0,
            InfoType::Signal => typelib.u16_field(offset, signal::FLAGS)? & signal::DEPRECATED != 0,
            InfoType::Property => {
                typelib.u32_field(offset, property::FLAGS)? & property::DEPRECATED != 0
            }
            InfoType::VFunc | InfoType::Field | InfoType::Arg | InfoType::Type => false,
            _ => typelib.u16_field(offset, common::FLAGS)? & common::DEPRECATED != 0,
        })
    }

    /// Value of annotation `key`
    pub fn annotation(&self, key: &str) -> Result<Option<&str>, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.annotation(offset, key)?)
    }

    /// All annotations on this entity
    pub fn annotations(&self) -> Result<Vec<Annotation<'_>>, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.annotations_for(offset)?)
    }

    // ===== Container navigation =====

    /// Member layout of this container
    pub(crate) fn layout(&self) -> Result<ContainerLayout, InfoError> {
        let (typelib, offset) = self.blob()?;
        let kind = self.kind().container_kind().ok_or(InfoError::WrongKind {
            expected: "container",
            found: self.kind(),
        })?;
        Ok(ContainerLayout::read(typelib, kind, offset)?)
    }

    /// Number of members in `group`
    pub(crate) fn member_count(&self, group: MemberGroup) -> Result<u32, InfoError> {
        Ok(self.layout()?.count(group))
    }

    /// Member `index` of `group`, as an info of `kind` owned by this container
    pub(crate) fn member(
        &self,
        group: MemberGroup,
        index: u32,
        kind: InfoType,
    ) -> Result<BaseInfo, InfoError> {
        let offset = self.layout()?.member_offset(group, index)?;
        Ok(BaseInfo::new(kind, Some(self.clone()), self.typelib()?.clone(), offset))
    }

    /// Raw u16 member of `group` (interface and prerequisite indices)
    pub(crate) fn member_u16(&self, group: MemberGroup, index: u32) -> Result<u16, InfoError> {
        let offset = self.layout()?.member_offset(group, index)?;
        Ok(self.typelib()?.u16_at(offset)?)
    }

    /// First member of `group` named `name`, in canonical order
    pub(crate) fn find_member(
        &self,
        group: MemberGroup,
        name: &str,
        kind: InfoType,
    ) -> Result<Option<BaseInfo>, InfoError> {
        let index = match self.0.name_index.get() {
            Some(maps) => maps.get(&group).and_then(|map| map.get(name)).copied(),
            None => {
                let maps = self.build_name_index()?;
                let maps = self.0.name_index.get_or_init(|| maps);
                maps.get(&group).and_then(|map| map.get(name)).copied()
            }
        };
        index.map(|i| self.member(group, i, kind)).transpose()
    }

    fn build_name_index(&self) -> Result<FxHashMap<MemberGroup, FxHashMap<String, u32>>, InfoError> {
        let layout = self.layout()?;
        let typelib = self.typelib()?;
        let mut maps = FxHashMap::default();
        for span in layout.spans() {
            let name_field = match span.group {
                MemberGroup::Methods => common::NAME,
                MemberGroup::Signals => signal::NAME,
                MemberGroup::VFuncs | MemberGroup::Fields | MemberGroup::Properties => 0,
                MemberGroup::Constants => common::NAME,
                MemberGroup::Values => value::NAME,
                _ => continue,
            };
            let mut map = FxHashMap::default();
            for i in 0..span.count {
                let member = layout.member_offset(span.group, i)?;
                let name = typelib.string(typelib.u32_field(member, name_field)?)?;
                map.entry(name.to_owned()).or_insert(i);
            }
            maps.insert(span.group, map);
        }
        Ok(maps)
    }
}

impl fmt::Debug for BaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("BaseInfo");
        s.field("kind", &self.kind());
        match &self.0.location {
            Location::Blob { typelib, offset } => {
                s.field("namespace", &typelib.namespace()).field("offset", offset)
            }
            Location::Unresolved { namespace, name } => {
                s.field("namespace", namespace).field("name", name)
            }
        };
        s.finish()
    }
}

// ============================================================================
// Typed wrappers
// ============================================================================

/// Defines a typed wrapper around [`BaseInfo`] accepting the listed kinds
macro_rules! info_wrapper {
    ($(#[$meta:meta])* $name:ident: $($kind:ident)|+) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name($crate::info::BaseInfo);

        impl $name {
            /// Untyped handle
            pub fn base(&self) -> &$crate::info::BaseInfo {
                &self.0
            }

            /// Convert into the untyped handle
            pub fn into_base(self) -> $crate::info::BaseInfo {
                self.0
            }

            #[allow(dead_code)]
            pub(crate) fn from_base_unchecked(base: $crate::info::BaseInfo) -> Self {
                Self(base)
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::info::BaseInfo;

            fn deref(&self) -> &$crate::info::BaseInfo {
                &self.0
            }
        }

        impl TryFrom<$crate::info::BaseInfo> for $name {
            type Error = $crate::InfoError;

            fn try_from(base: $crate::info::BaseInfo) -> Result<Self, $crate::InfoError> {
                match base.kind() {
                    $($crate::info::InfoType::$kind)|+ => Ok(Self(base)),
                    found => Err($crate::InfoError::WrongKind {
                        expected: stringify!($name),
                        found,
                    }),
                }
            }
        }

        impl From<$name> for $crate::info::BaseInfo {
            fn from(info: $name) -> $crate::info::BaseInfo {
                info.0
            }
        }
    };
}

pub(crate) use info_wrapper;

#[cfg(test)]
mod tests {
    use super::*;
    use gir_typelib::builder::*;
    use gir_typelib::TypeTag;

    fn typelib() -> Typelib {
        let bytes = TypelibBuilder::new("Test", "1.0")
            .entry(StructDef {
                name: "Point".into(),
                fields: vec![
                    FieldDef::new("x", TypeDef::basic(TypeTag::Int32), 0),
                    FieldDef::new("y", TypeDef::basic(TypeTag::Int32), 4),
                ],
                ..Default::default()
            })
            .build()
            .unwrap();
        Typelib::new(bytes).unwrap()
    }

    #[test]
    fn test_ref_count_releases_container_once() {
        let tl = typelib();
        let entry = tl.find_entry("Point").unwrap().unwrap();
        let point = BaseInfo::new(InfoType::Struct, None, tl.clone(), entry.offset);
        assert_eq!(point.ref_count(), 1);

        let field = point.member(MemberGroup::Fields, 1, InfoType::Field).unwrap();
        assert_eq!(point.ref_count(), 2);
        assert_eq!(field.ref_count(), 1);

        let extra: Vec<_> = (0..3).map(|_| field.clone()).collect();
        assert_eq!(field.ref_count(), 4);
        assert_eq!(point.ref_count(), 2);

        drop(extra);
        assert_eq!(field.ref_count(), 1);
        assert_eq!(point.ref_count(), 2);

        drop(field);
        assert_eq!(point.ref_count(), 1);
    }

    #[test]
    fn test_navigation_yields_distinct_handles_over_same_bytes() {
        let tl = typelib();
        let entry = tl.find_entry("Point").unwrap().unwrap();
        let point = BaseInfo::new(InfoType::Struct, None, tl, entry.offset);
        let a = point.member(MemberGroup::Fields, 0, InfoType::Field).unwrap();
        let b = point.member(MemberGroup::Fields, 0, InfoType::Field).unwrap();
        assert_eq!(a.ref_count(), 1);
        assert_eq!(b.ref_count(), 1);
        assert!(a.same_blob(&b));
        assert_eq!(a.name().unwrap(), "x");
        let c = point.member(MemberGroup::Fields, 1, InfoType::Field).unwrap();
        assert!(!a.same_blob(&c));
    }

    #[test]
    fn test_unresolved_only_knows_its_name() {
        let info = BaseInfo::unresolved("Gdk", "Window");
        assert_eq!(info.kind(), InfoType::Unresolved);
        assert!(info.is_unresolved());
        assert_eq!(info.name().unwrap(), "Window");
        assert_eq!(info.namespace().unwrap(), "Gdk");
        assert!(matches!(
            info.is_deprecated(),
            Err(InfoError::Unresolved { .. })
        ));
        assert!(matches!(
            info.annotation("x"),
            Err(InfoError::Unresolved { .. })
        ));
        assert!(info.typelib().is_err());
    }

    #[test]
    fn test_member_out_of_range_is_rejected() {
        let tl = typelib();
        let entry = tl.find_entry("Point").unwrap().unwrap();
        let point = BaseInfo::new(InfoType::Struct, None, tl, entry.offset);
        assert!(point.member(MemberGroup::Fields, 2, InfoType::Field).is_err());
        assert!(point.member(MemberGroup::Methods, 0, InfoType::Function).is_err());
    }
}
