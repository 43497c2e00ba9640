//! Enumerations and flags

use super::{info_wrapper, FunctionInfo, InfoType};
use crate::InfoError;
use gir_typelib::blob::{enum_blob, value};
use gir_typelib::{MemberGroup, TypeTag};

info_wrapper!(
    /// Enumeration or bit-flag set
    EnumInfo: Enum | Flags
);
info_wrapper!(
    /// One member of an enumeration
    ValueInfo: Value
);

impl EnumInfo {
    /// Whether this is a bit-flag set
    pub fn is_flags(&self) -> bool {
        self.kind() == InfoType::Flags
    }

    pub fn n_values(&self) -> Result<u32, InfoError> {
        self.member_count(MemberGroup::Values)
    }

    pub fn value(&self, n: u32) -> Result<ValueInfo, InfoError> {
        self.member(MemberGroup::Values, n, InfoType::Value)
            .map(ValueInfo)
    }

    pub fn values(&self) -> Result<Vec<ValueInfo>, InfoError> {
        (0..self.n_values()?).map(|n| self.value(n)).collect()
    }

    pub fn n_methods(&self) -> Result<u32, InfoError> {
        self.member_count(MemberGroup::Methods)
    }

    pub fn method(&self, n: u32) -> Result<FunctionInfo, InfoError> {
        self.member(MemberGroup::Methods, n, InfoType::Function)
            .map(FunctionInfo::from_base_unchecked)
    }

    pub fn methods(&self) -> Result<Vec<FunctionInfo>, InfoError> {
        (0..self.n_methods()?).map(|n| self.method(n)).collect()
    }

    pub fn find_method(&self, name: &str) -> Result<Option<FunctionInfo>, InfoError> {
        Ok(self
            .find_member(MemberGroup::Methods, name, InfoType::Function)?
            .map(FunctionInfo::from_base_unchecked))
    }

    /// Integer type the values are stored as
    pub fn storage_type(&self) -> Result<TypeTag, InfoError> {
        let (typelib, offset) = self.blob()?;
        let raw = typelib.u8_field(offset, enum_blob::STORAGE_TYPE)?;
        TypeTag::from_u8(raw).ok_or(InfoError::InvalidTypeTag { value: raw, offset })
    }
}

impl ValueInfo {
    /// Numeric value
    pub fn value(&self) -> Result<i64, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(i64::from(typelib.i32_field(offset, value::VALUE)?))
    }
}
