//! Native call representation of typelib types
//!
//! Only the tag and the pointer flag matter: pointers, strings and
//! containers travel as `pointer`, numeric tags as the matching integer or
//! float type, enums and flags as `sint32`.

use super::InvokeError;
use crate::info::{InfoType, TypeInfo};
use crate::resolve::ModuleRegistry;
use gir_typelib::TypeTag;
use libffi::low::{ffi_type, types};
use std::os::raw::c_long;
use std::ptr::addr_of_mut;

/// ffi type of a value of `tag`; `interface` is the kind an interface tag refers to
pub(crate) fn for_tag(
    tag: TypeTag,
    pointer: bool,
    interface: Option<InfoType>,
) -> Result<*mut ffi_type, InvokeError> {
    if pointer {
        return Ok(addr_of_mut!(types::pointer));
    }
    let long_is_64 = std::mem::size_of::<c_long>() == 8;
    let size_is_64 = std::mem::size_of::<usize>() == 8;
    let ty = match tag {
        TypeTag::Void => addr_of_mut!(types::void),
        TypeTag::Boolean | TypeTag::Int32 | TypeTag::Int => addr_of_mut!(types::sint32),
        TypeTag::Int8 => addr_of_mut!(types::sint8),
        TypeTag::UInt8 => addr_of_mut!(types::uint8),
        TypeTag::Int16 => addr_of_mut!(types::sint16),
        TypeTag::UInt16 => addr_of_mut!(types::uint16),
        TypeTag::UInt32 | TypeTag::UInt => addr_of_mut!(types::uint32),
        TypeTag::Int64 => addr_of_mut!(types::sint64),
        TypeTag::UInt64 => addr_of_mut!(types::uint64),
        TypeTag::Long if long_is_64 => addr_of_mut!(types::sint64),
        TypeTag::Long => addr_of_mut!(types::sint32),
        TypeTag::ULong if long_is_64 => addr_of_mut!(types::uint64),
        TypeTag::ULong => addr_of_mut!(types::uint32),
        TypeTag::SSize if size_is_64 => addr_of_mut!(types::sint64),
        TypeTag::SSize => addr_of_mut!(types::sint32),
        TypeTag::Size if size_is_64 => addr_of_mut!(types::uint64),
        TypeTag::Size => addr_of_mut!(types::uint32),
        TypeTag::Float => addr_of_mut!(types::float),
        TypeTag::Double => addr_of_mut!(types::double),
        TypeTag::Utf8
        | TypeTag::Filename
        | TypeTag::Array
        | TypeTag::GList
        | TypeTag::GSList
        | TypeTag::GHash
        | TypeTag::Error => addr_of_mut!(types::pointer),
        TypeTag::Interface => match interface {
            Some(InfoType::Enum | InfoType::Flags) => addr_of_mut!(types::sint32),
            Some(InfoType::Callback) => addr_of_mut!(types::pointer),
            other => {
                return Err(InvokeError::CallConstruction(format!(
                    "Cannot pass {} by value",
                    other.map_or("an unresolved interface", InfoType::name)
                )))
            }
        },
    };
    Ok(ty)
}

/// ffi type of `ty`, resolving by-value interfaces through `registry`
pub(crate) fn for_type(
    ty: &TypeInfo,
    registry: &dyn ModuleRegistry,
) -> Result<*mut ffi_type, InvokeError> {
    let tag = ty.tag()?;
    let pointer = ty.is_pointer()?;
    let interface = if tag == TypeTag::Interface && !pointer {
        ty.interface(registry)?
            .map(|info| info.kind())
            .filter(|kind| *kind != InfoType::Unresolved)
    } else {
        None
    };
    for_tag(tag, pointer, interface)
}
