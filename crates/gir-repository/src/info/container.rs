//! Structs, unions, objects and interfaces
//!
//! Member access goes through the container's [`gir_typelib::ContainerLayout`];
//! name lookups scan a member group once and cache the name -> index map on
//! the handle, keeping the first match in canonical order.

use super::{
    info_wrapper, BaseInfo, ConstantInfo, FieldInfo, FunctionInfo, InfoType, PropertyInfo,
    SignalInfo, TypeInfo, VFuncInfo,
};
use crate::resolve::{resolve_entry, ModuleRegistry};
use crate::InfoError;
use gir_typelib::blob::{object, union_blob, common};
use gir_typelib::MemberGroup;

info_wrapper!(
    /// Struct or boxed type
    StructInfo: Struct | Boxed
);
info_wrapper!(
    /// Union, optionally discriminated
    UnionInfo: Union
);
info_wrapper!(
    /// Class
    ObjectInfo: Object
);
info_wrapper!(
    /// Interface
    InterfaceInfo: Interface
);

/// Count, indexed access and listing for one member group
macro_rules! members {
    ($group:ident, $kind:ident => $info:ident, $count:ident, $get:ident, $all:ident) => {
        pub fn $count(&self) -> Result<u32, InfoError> {
            self.member_count(MemberGroup::$group)
        }

        pub fn $get(&self, n: u32) -> Result<$info, InfoError> {
            self.member(MemberGroup::$group, n, InfoType::$kind)
                .map($info::from_base_unchecked)
        }

        pub fn $all(&self) -> Result<Vec<$info>, InfoError> {
            (0..self.$count()?).map(|n| self.$get(n)).collect()
        }
    };
    ($group:ident, $kind:ident => $info:ident, $count:ident, $get:ident, $all:ident, $find:ident) => {
        members!($group, $kind => $info, $count, $get, $all);

        /// First member with the given name
        pub fn $find(&self, name: &str) -> Result<Option<$info>, InfoError> {
            Ok(self
                .find_member(MemberGroup::$group, name, InfoType::$kind)?
                .map($info::from_base_unchecked))
        }
    };
}

impl StructInfo {
    /// Whether this is a registered boxed type
    pub fn is_boxed(&self) -> bool {
        self.kind() == InfoType::Boxed
    }

    members!(Fields, Field => FieldInfo, n_fields, field, fields);
    members!(Methods, Function => FunctionInfo, n_methods, method, methods, find_method);
}

impl UnionInfo {
    members!(Fields, Field => FieldInfo, n_fields, field, fields);
    members!(Methods, Function => FunctionInfo, n_methods, method, methods, find_method);

    pub fn is_discriminated(&self) -> Result<bool, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.u16_field(offset, common::FLAGS)? & union_blob::DISCRIMINATED != 0)
    }

    /// Byte offset of the discriminator inside the union
    pub fn discriminator_offset(&self) -> Result<Option<i32>, InfoError> {
        if !self.is_discriminated()? {
            return Ok(None);
        }
        let (typelib, offset) = self.blob()?;
        Ok(Some(typelib.i32_field(offset, union_blob::DISCRIMINATOR_OFFSET)?))
    }

    pub fn discriminator_type(&self) -> Result<Option<TypeInfo>, InfoError> {
        if !self.is_discriminated()? {
            return Ok(None);
        }
        let offset = self.offset()?;
        TypeInfo::from_slot(self, offset, union_blob::DISCRIMINATOR_TYPE).map(Some)
    }

    /// Discriminator value selecting field `n`
    pub fn discriminator(&self, n: u32) -> Result<ConstantInfo, InfoError> {
        self.member(MemberGroup::Discriminators, n, InfoType::Constant)
            .map(ConstantInfo::from_base_unchecked)
    }
}

impl ObjectInfo {
    /// Parent class
    pub fn parent(&self, registry: &dyn ModuleRegistry) -> Result<Option<BaseInfo>, InfoError> {
        let (typelib, offset) = self.blob()?;
        match typelib.u16_field(offset, object::PARENT)? {
            0 => Ok(None),
            index => resolve_entry(registry, typelib, index).map(Some),
        }
    }

    pub fn is_abstract(&self) -> Result<bool, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.u16_field(offset, common::FLAGS)? & object::ABSTRACT != 0)
    }

    pub fn n_interfaces(&self) -> Result<u32, InfoError> {
        self.member_count(MemberGroup::Interfaces)
    }

    /// Implemented interface `n`
    pub fn interface(&self, registry: &dyn ModuleRegistry, n: u32) -> Result<BaseInfo, InfoError> {
        let index = self.member_u16(MemberGroup::Interfaces, n)?;
        resolve_entry(registry, self.typelib()?, index)
    }

    members!(Fields, Field => FieldInfo, n_fields, field, fields);
    members!(Properties, Property => PropertyInfo, n_properties, property, properties, find_property);
    members!(Methods, Function => FunctionInfo, n_methods, method, methods, find_method);
    members!(Signals, Signal => SignalInfo, n_signals, signal, signals, find_signal);
    members!(VFuncs, VFunc => VFuncInfo, n_vfuncs, vfunc, vfuncs, find_vfunc);
    members!(Constants, Constant => ConstantInfo, n_constants, constant, constants);
}

impl InterfaceInfo {
    pub fn n_prerequisites(&self) -> Result<u32, InfoError> {
        self.member_count(MemberGroup::Prerequisites)
    }

    /// Prerequisite `n` (an interface or a class)
    pub fn prerequisite(
        &self,
        registry: &dyn ModuleRegistry,
        n: u32,
    ) -> Result<BaseInfo, InfoError> {
        let index = self.member_u16(MemberGroup::Prerequisites, n)?;
        resolve_entry(registry, self.typelib()?, index)
    }

    members!(Properties, Property => PropertyInfo, n_properties, property, properties, find_property);
    members!(Methods, Function => FunctionInfo, n_methods, method, methods, find_method);
    members!(Signals, Signal => SignalInfo, n_signals, signal, signals, find_signal);
    members!(VFuncs, VFunc => VFuncInfo, n_vfuncs, vfunc, vfuncs, find_vfunc);
    members!(Constants, Constant => ConstantInfo, n_constants, constant, constants);
}
