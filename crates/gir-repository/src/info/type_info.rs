//! Type descriptors
//!
//! A type info points either at a simple 4-byte slot (tag and pointer flag
//! inline, low 24 bits zero) or at a parametrized type blob. The low 24 bits
//! of the first word tell them apart: a parametrized blob always has its tag
//! in byte 0, so those bits are never zero.

use super::{info_wrapper, BaseInfo, InfoType};
use crate::resolve::{resolve_entry, ModuleRegistry};
use crate::InfoError;
use gir_typelib::blob::type_slot;
use gir_typelib::{offset_add, TypeSlot, TypeTag};

info_wrapper!(
    /// Type of an argument, field, property, constant or return value
    TypeInfo: Type
);

/// Decoded first word of a type
struct Head {
    tag: TypeTag,
    pointer: bool,
    /// Offset of the parametrized blob, if any
    param: Option<u32>,
}

impl TypeInfo {
    /// Type stored in the slot at `field` of the record at `base`, owned by
    /// `container`
    pub(crate) fn from_slot(
        container: &BaseInfo,
        base: u32,
        field: u32,
    ) -> Result<TypeInfo, InfoError> {
        let typelib = container.typelib()?;
        let slot = offset_add(base, field)?;
        let offset = match TypeSlot::decode(typelib.u32_at(slot)?) {
            TypeSlot::Simple { .. } => slot,
            TypeSlot::Param(offset) => offset,
        };
        Ok(TypeInfo(BaseInfo::new(
            InfoType::Type,
            Some(container.clone()),
            typelib.clone(),
            offset,
        )))
    }

    fn head(&self) -> Result<Head, InfoError> {
        let (typelib, offset) = self.blob()?;
        let (raw_tag, pointer, param) = match TypeSlot::decode(typelib.u32_at(offset)?) {
            TypeSlot::Simple { tag, pointer } => (tag, pointer, None),
            TypeSlot::Param(_) => {
                let byte = typelib.u8_at(offset)?;
                (
                    byte >> type_slot::PARAM_TAG_SHIFT,
                    byte & type_slot::PARAM_POINTER != 0,
                    Some(offset),
                )
            }
        };
        let tag = TypeTag::from_u8(raw_tag).ok_or(InfoError::InvalidTypeTag {
            value: raw_tag,
            offset,
        })?;
        Ok(Head {
            tag,
            pointer,
            param,
        })
    }

    pub fn tag(&self) -> Result<TypeTag, InfoError> {
        Ok(self.head()?.tag)
    }

    pub fn is_pointer(&self) -> Result<bool, InfoError> {
        Ok(self.head()?.pointer)
    }

    /// Number of parameter types (array element, list element, hash key and value)
    pub fn n_param_types(&self) -> Result<u32, InfoError> {
        let head = self.head()?;
        let Some(param) = head.param else {
            return Ok(0);
        };
        Ok(match head.tag {
            TypeTag::Array => 1,
            TypeTag::GList | TypeTag::GSList | TypeTag::GHash => {
                u32::from(self.typelib()?.u16_field(param, type_slot::N_TYPES)?)
            }
            _ => 0,
        })
    }

    /// Parameter type `n`, or `None` if the type has no such parameter
    pub fn param_type(&self, n: u32) -> Result<Option<TypeInfo>, InfoError> {
        if n >= self.n_param_types()? {
            return Ok(None);
        }
        let offset = self.offset()?;
        TypeInfo::from_slot(
            self,
            offset,
            type_slot::PARAM_TYPES + n * type_slot::SLOT_SIZE,
        )
        .map(Some)
    }

    /// Entity an interface type refers to
    pub fn interface(&self, registry: &dyn ModuleRegistry) -> Result<Option<BaseInfo>, InfoError> {
        let head = self.head()?;
        match (head.tag, head.param) {
            (TypeTag::Interface, Some(param)) => {
                let typelib = self.typelib()?;
                let index = typelib.u16_field(param, type_slot::INTERFACE)?;
                resolve_entry(registry, typelib, index).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn array_flags(&self) -> Result<Option<(u32, u8)>, InfoError> {
        let head = self.head()?;
        match (head.tag, head.param) {
            (TypeTag::Array, Some(param)) => Ok(Some((
                param,
                self.typelib()?.u8_field(param, type_slot::ARRAY_FLAGS)?,
            ))),
            _ => Ok(None),
        }
    }

    /// Index of the argument holding the array length
    pub fn array_length(&self) -> Result<Option<u16>, InfoError> {
        match self.array_flags()? {
            Some((param, flags)) if flags & type_slot::HAS_LENGTH != 0 => {
                Ok(Some(self.typelib()?.u16_field(param, type_slot::ARRAY_LENGTH)?))
            }
            _ => Ok(None),
        }
    }

    /// Fixed number of array elements
    pub fn array_fixed_size(&self) -> Result<Option<u16>, InfoError> {
        match self.array_flags()? {
            Some((param, flags)) if flags & type_slot::HAS_SIZE != 0 => {
                Ok(Some(self.typelib()?.u16_field(param, type_slot::ARRAY_LENGTH)?))
            }
            _ => Ok(None),
        }
    }

    /// Whether the array ends with a zero element
    pub fn is_zero_terminated(&self) -> Result<bool, InfoError> {
        Ok(matches!(
            self.array_flags()?,
            Some((_, flags)) if flags & type_slot::ZERO_TERMINATED != 0
        ))
    }

    /// Number of error domains of an error type
    pub fn n_error_domains(&self) -> Result<u32, InfoError> {
        let head = self.head()?;
        match (head.tag, head.param) {
            (TypeTag::Error, Some(param)) => Ok(u32::from(
                self.typelib()?.u16_field(param, type_slot::N_DOMAINS)?,
            )),
            _ => Ok(0),
        }
    }

    /// Error domain `n` of an error type
    pub fn error_domain(
        &self,
        registry: &dyn ModuleRegistry,
        n: u32,
    ) -> Result<BaseInfo, InfoError> {
        let count = self.n_error_domains()?;
        if n >= count {
            return Err(InfoError::IndexOutOfRange {
                what: "error domains",
                index: n,
                count,
            });
        }
        let typelib = self.typelib()?;
        let offset = self.offset()?;
        let index = typelib.u16_field(offset, type_slot::DOMAINS + n * 2)?;
        resolve_entry(registry, typelib, index)
    }
}
