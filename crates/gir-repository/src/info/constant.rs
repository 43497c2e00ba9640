//! Constants and error domains

use super::{info_wrapper, BaseInfo, TypeInfo};
use crate::resolve::{resolve_entry, ModuleRegistry};
use crate::InfoError;
use gir_typelib::blob::{constant, error_domain};
use gir_typelib::builder::ConstantValue;
use gir_typelib::TypeTag;

info_wrapper!(
    /// Named constant
    ConstantInfo: Constant
);
info_wrapper!(
    /// Error domain with its quark function and code enum
    ErrorDomainInfo: ErrorDomain
);

impl ConstantInfo {
    pub fn type_info(&self) -> Result<TypeInfo, InfoError> {
        let offset = self.offset()?;
        TypeInfo::from_slot(self, offset, constant::TYPE)
    }

    /// Raw stored value
    pub fn value_bytes(&self) -> Result<&[u8], InfoError> {
        let (typelib, offset) = self.blob()?;
        let size = typelib.u32_field(offset, constant::SIZE)?;
        let value = typelib.u32_field(offset, constant::OFFSET)?;
        Ok(typelib.bytes_at(value, size)?)
    }

    /// Decoded value
    pub fn value(&self) -> Result<ConstantValue, InfoError> {
        let tag = self.type_info()?.tag()?;
        let bytes = self.value_bytes()?;
        let too_short = || InfoError::UnsupportedConstant(tag);
        macro_rules! le {
            ($ty:ty) => {
                <$ty>::from_le_bytes(
                    bytes
                        .get(..std::mem::size_of::<$ty>())
                        .and_then(|b| b.try_into().ok())
                        .ok_or_else(too_short)?,
                )
            };
        }
        Ok(match tag {
            TypeTag::Boolean => ConstantValue::Boolean(le!(i32) != 0),
            TypeTag::Int8 => ConstantValue::Int8(le!(i8)),
            TypeTag::UInt8 => ConstantValue::UInt8(le!(u8)),
            TypeTag::Int16 => ConstantValue::Int16(le!(i16)),
            TypeTag::UInt16 => ConstantValue::UInt16(le!(u16)),
            TypeTag::Int32 | TypeTag::Int => ConstantValue::Int32(le!(i32)),
            TypeTag::UInt32 | TypeTag::UInt => ConstantValue::UInt32(le!(u32)),
            TypeTag::Int64 | TypeTag::Long | TypeTag::SSize => ConstantValue::Int64(le!(i64)),
            TypeTag::UInt64 | TypeTag::ULong | TypeTag::Size => ConstantValue::UInt64(le!(u64)),
            TypeTag::Float => ConstantValue::Float(le!(f32)),
            TypeTag::Double => ConstantValue::Double(le!(f64)),
            TypeTag::Utf8 | TypeTag::Filename => {
                let (typelib, offset) = self.blob()?;
                let value = typelib.u32_field(offset, constant::OFFSET)?;
                ConstantValue::Utf8(typelib.string(value)?.to_owned())
            }
            other => return Err(InfoError::UnsupportedConstant(other)),
        })
    }
}

impl ErrorDomainInfo {
    /// Symbol of the function returning the domain quark
    pub fn quark(&self) -> Result<&str, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.string(typelib.u32_field(offset, error_domain::GET_QUARK)?)?)
    }

    /// Enum listing the domain's error codes
    pub fn codes(&self, registry: &dyn ModuleRegistry) -> Result<BaseInfo, InfoError> {
        let (typelib, offset) = self.blob()?;
        let index = typelib.u16_field(offset, error_domain::ERROR_CODES)?;
        resolve_entry(registry, typelib, index)
    }
}
