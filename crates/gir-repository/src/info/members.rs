//! Properties and fields

use super::{info_wrapper, TypeInfo};
use crate::InfoError;
use gir_typelib::blob::{field, property};
use gir_typelib::{FieldFlags, PropertyFlags};

info_wrapper!(
    /// Property of an object or interface
    PropertyInfo: Property
);
info_wrapper!(
    /// Field of a struct, union or object
    FieldInfo: Field
);

impl PropertyInfo {
    pub fn flags(&self) -> Result<PropertyFlags, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(PropertyFlags::from_bits(typelib.u32_field(offset, property::FLAGS)?))
    }

    pub fn type_info(&self) -> Result<TypeInfo, InfoError> {
        let offset = self.offset()?;
        TypeInfo::from_slot(self, offset, property::TYPE)
    }
}

impl FieldInfo {
    pub fn flags(&self) -> Result<FieldFlags, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(FieldFlags::from_bits(typelib.u8_field(offset, field::FLAGS)?))
    }

    /// Width in bits of a bit field, 0 for a plain field
    pub fn size(&self) -> Result<u8, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.u8_field(offset, field::BITS)?)
    }

    /// Byte offset of the field inside its structure
    pub fn struct_offset(&self) -> Result<u16, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.u16_field(offset, field::STRUCT_OFFSET)?)
    }

    pub fn type_info(&self) -> Result<TypeInfo, InfoError> {
        let offset = self.offset()?;
        TypeInfo::from_slot(self, offset, field::TYPE)
    }
}
