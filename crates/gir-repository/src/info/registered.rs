//! Types registered with the runtime type system

use super::{info_wrapper, BaseInfo, EnumInfo, InterfaceInfo, ObjectInfo, StructInfo, UnionInfo};
use crate::InfoError;
use gir_typelib::blob::{common, registered};

info_wrapper!(
    /// Any registered type
    RegisteredTypeInfo: Struct | Boxed | Union | Enum | Flags | Object | Interface
);

/// Type-system registration of structs, unions, enums, objects and interfaces
pub trait RegisteredType {
    /// Untyped handle
    fn as_base(&self) -> &BaseInfo;

    /// Registered type name
    fn type_name(&self) -> Result<Option<&str>, InfoError> {
        let (typelib, offset) = self.as_base().blob()?;
        Ok(typelib.optional_string(typelib.u32_field(offset, registered::GTYPE_NAME)?)?)
    }

    /// Symbol of the function returning the registered type
    fn type_init(&self) -> Result<Option<&str>, InfoError> {
        let (typelib, offset) = self.as_base().blob()?;
        Ok(typelib.optional_string(typelib.u32_field(offset, registered::GTYPE_INIT)?)?)
    }

    /// Whether the type is registered at all
    fn is_registered(&self) -> Result<bool, InfoError> {
        let (typelib, offset) = self.as_base().blob()?;
        Ok(typelib.u16_field(offset, common::FLAGS)? & registered::UNREGISTERED == 0)
    }
}

macro_rules! impl_registered {
    ($($name:ty),*) => {
        $(
            impl RegisteredType for $name {
                fn as_base(&self) -> &BaseInfo {
                    self.base()
                }
            }
        )*
    };
}

impl_registered!(RegisteredTypeInfo, StructInfo, UnionInfo, EnumInfo, ObjectInfo, InterfaceInfo);
