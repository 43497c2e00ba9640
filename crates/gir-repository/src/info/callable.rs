//! Functions, callbacks, signals, vfuncs and their arguments
//!
//! All four callable kinds share a signature record holding the return type,
//! return ownership and the argument list. Functions and vfuncs store the
//! signature offset at byte 12, callbacks and signals at byte 8.

use super::{info_wrapper, BaseInfo, InfoType, PropertyInfo, TypeInfo};
use crate::InfoError;
use gir_typelib::blob::{arg, callback, common, function, signal, signature, vfunc};
use gir_typelib::{
    element_offset, offset_add, Direction, FunctionFlags, MemberGroup, SignalFlags, Transfer,
    VFuncFlags,
};

info_wrapper!(
    /// Any callable: function, callback, signal or vfunc
    CallableInfo: Function | Callback | Signal | VFunc
);
info_wrapper!(
    /// Free function, method or constructor
    FunctionInfo: Function
);
info_wrapper!(
    /// Function pointer type
    CallbackInfo: Callback
);
info_wrapper!(
    /// Signal of an object or interface
    SignalInfo: Signal
);
info_wrapper!(
    /// Virtual function of an object or interface
    VFuncInfo: VFunc
);
info_wrapper!(
    /// Parameter of a callable
    ArgInfo: Arg
);

fn signature_offset(base: &BaseInfo) -> Result<u32, InfoError> {
    let field = match base.kind() {
        InfoType::Function => function::SIGNATURE,
        InfoType::VFunc => vfunc::SIGNATURE,
        InfoType::Callback => callback::SIGNATURE,
        InfoType::Signal => signal::SIGNATURE,
        found => {
            return Err(InfoError::WrongKind {
                expected: "callable",
                found,
            })
        }
    };
    let (typelib, offset) = base.blob()?;
    Ok(typelib.u32_field(offset, field)?)
}

/// Accessors shared by every callable kind
pub trait Callable {
    /// Untyped handle of the callable
    fn as_base(&self) -> &BaseInfo;

    /// Offset of the signature record
    fn signature_offset(&self) -> Result<u32, InfoError> {
        signature_offset(self.as_base())
    }

    /// Return type
    fn return_type(&self) -> Result<TypeInfo, InfoError> {
        let sig = self.signature_offset()?;
        TypeInfo::from_slot(self.as_base(), sig, signature::RETURN_TYPE)
    }

    /// Ownership of the return value passed to the caller
    fn caller_owns(&self) -> Result<Transfer, InfoError> {
        let flags = self.signature_flags()?;
        Ok(Transfer::from_bits(
            flags & signature::CALLER_OWNS_RETURN_VALUE != 0,
            flags & signature::CALLER_OWNS_RETURN_CONTAINER != 0,
        ))
    }

    /// Whether the return value may be NULL
    fn may_return_null(&self) -> Result<bool, InfoError> {
        Ok(self.signature_flags()? & signature::MAY_RETURN_NULL != 0)
    }

    #[doc(hidden)]
    fn signature_flags(&self) -> Result<u16, InfoError> {
        let sig = self.signature_offset()?;
        Ok(self.as_base().typelib()?.u16_field(sig, signature::FLAGS)?)
    }

    /// Number of declared parameters
    fn n_args(&self) -> Result<u32, InfoError> {
        let sig = self.signature_offset()?;
        Ok(u32::from(
            self.as_base().typelib()?.u16_field(sig, signature::N_ARGUMENTS)?,
        ))
    }

    /// Parameter `n`
    fn arg(&self, n: u32) -> Result<ArgInfo, InfoError> {
        let count = self.n_args()?;
        if n >= count {
            return Err(InfoError::IndexOutOfRange {
                what: "arguments",
                index: n,
                count,
            });
        }
        let base = self.as_base();
        let typelib = base.typelib()?;
        let sizes = &typelib.header().sizes;
        let first = offset_add(self.signature_offset()?, u32::from(sizes.signature))?;
        let offset = element_offset(first, n, u32::from(sizes.arg))?;
        Ok(ArgInfo(BaseInfo::new(
            InfoType::Arg,
            Some(base.clone()),
            typelib.clone(),
            offset,
        )))
    }

    /// All parameters in declaration order
    fn args(&self) -> Result<Vec<ArgInfo>, InfoError> {
        (0..self.n_args()?).map(|n| self.arg(n)).collect()
    }

    /// Whether calls take an implicit instance argument
    fn is_method(&self) -> Result<bool, InfoError> {
        let base = self.as_base();
        match base.kind() {
            InfoType::Function => {
                let (typelib, offset) = base.blob()?;
                Ok(FunctionFlags::from_bits(typelib.u16_field(offset, common::FLAGS)?).is_method)
            }
            InfoType::Signal | InfoType::VFunc => Ok(true),
            _ => Ok(false),
        }
    }

    /// Whether calls take a trailing error-output argument
    fn can_throw(&self) -> Result<bool, InfoError> {
        let base = self.as_base();
        let (typelib, offset) = base.blob()?;
        match base.kind() {
            InfoType::Function => {
                Ok(FunctionFlags::from_bits(typelib.u16_field(offset, common::FLAGS)?).throws)
            }
            InfoType::VFunc => {
                Ok(VFuncFlags::from_bits(typelib.u16_field(offset, vfunc::FLAGS)?).throws)
            }
            _ => Ok(false),
        }
    }
}

macro_rules! impl_callable {
    ($($name:ident),*) => {
        $(
            impl Callable for $name {
                fn as_base(&self) -> &BaseInfo {
                    &self.0
                }
            }
        )*
    };
}

impl_callable!(CallableInfo, FunctionInfo, CallbackInfo, SignalInfo, VFuncInfo);

impl From<FunctionInfo> for CallableInfo {
    fn from(info: FunctionInfo) -> Self {
        CallableInfo(info.0)
    }
}

// ============================================================================
// Functions
// ============================================================================

impl FunctionInfo {
    /// Exported symbol implementing the function
    pub fn symbol(&self) -> Result<&str, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.string(typelib.u32_field(offset, function::SYMBOL)?)?)
    }

    /// Function flags
    pub fn flags(&self) -> Result<FunctionFlags, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(FunctionFlags::from_bits(typelib.u16_field(offset, common::FLAGS)?))
    }

    fn index(&self) -> Result<u32, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(u32::from(typelib.u16_field(offset, function::INDEX)?))
    }

    fn container_with_members(&self) -> Option<&BaseInfo> {
        self.container()
            .filter(|c| matches!(c.kind(), InfoType::Object | InfoType::Interface))
    }

    /// Property this function gets or sets
    pub fn property(&self) -> Result<Option<PropertyInfo>, InfoError> {
        let flags = self.flags()?;
        if !(flags.is_getter || flags.is_setter) {
            return Ok(None);
        }
        match self.container_with_members() {
            Some(container) => Ok(Some(PropertyInfo::from_base_unchecked(container.member(
                MemberGroup::Properties,
                self.index()?,
                InfoType::Property,
            )?))),
            None => Ok(None),
        }
    }

    /// Virtual function this function invokes
    pub fn vfunc(&self) -> Result<Option<VFuncInfo>, InfoError> {
        if !self.flags()?.wraps_vfunc {
            return Ok(None);
        }
        match self.container_with_members() {
            Some(container) => Ok(Some(VFuncInfo(container.member(
                MemberGroup::VFuncs,
                self.index()?,
                InfoType::VFunc,
            )?))),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Signals and vfuncs
// ============================================================================

impl SignalInfo {
    fn raw_flags(&self) -> Result<u16, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.u16_field(offset, signal::FLAGS)?)
    }

    /// Emission flags
    pub fn flags(&self) -> Result<SignalFlags, InfoError> {
        Ok(SignalFlags::from_bits(self.raw_flags()?))
    }

    /// Whether a handler returning true stops emission
    pub fn true_stops_emit(&self) -> Result<bool, InfoError> {
        Ok(self.raw_flags()? & signal::TRUE_STOPS_EMIT != 0)
    }

    /// Class closure of the signal
    pub fn class_closure(&self) -> Result<Option<VFuncInfo>, InfoError> {
        if self.raw_flags()? & signal::HAS_CLASS_CLOSURE == 0 {
            return Ok(None);
        }
        let Some(container) = self.container() else {
            return Ok(None);
        };
        let (typelib, offset) = self.blob()?;
        let index = u32::from(typelib.u16_field(offset, signal::CLASS_CLOSURE)?);
        Ok(Some(VFuncInfo(container.member(
            MemberGroup::VFuncs,
            index,
            InfoType::VFunc,
        )?)))
    }
}

impl VFuncInfo {
    fn raw_flags(&self) -> Result<u16, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.u16_field(offset, vfunc::FLAGS)?)
    }

    /// Override requirements
    pub fn flags(&self) -> Result<VFuncFlags, InfoError> {
        Ok(VFuncFlags::from_bits(self.raw_flags()?))
    }

    /// Offset of the function pointer in the class structure
    pub fn struct_offset(&self) -> Result<u16, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.u16_field(offset, vfunc::STRUCT_OFFSET)?)
    }

    /// Signal this vfunc is the class closure of
    pub fn signal(&self) -> Result<Option<SignalInfo>, InfoError> {
        if self.raw_flags()? & vfunc::CLASS_CLOSURE == 0 {
            return Ok(None);
        }
        let Some(container) = self.container() else {
            return Ok(None);
        };
        let (typelib, offset) = self.blob()?;
        let index = u32::from(typelib.u16_field(offset, vfunc::SIGNAL)?);
        Ok(Some(SignalInfo(container.member(
            MemberGroup::Signals,
            index,
            InfoType::Signal,
        )?)))
    }

    /// Method that invokes this vfunc
    pub fn invoker(&self) -> Result<Option<FunctionInfo>, InfoError> {
        let (typelib, offset) = self.blob()?;
        let index = typelib.u16_field(offset, vfunc::INVOKER)?;
        if index == vfunc::NO_INVOKER {
            return Ok(None);
        }
        let Some(container) = self.container() else {
            return Ok(None);
        };
        Ok(Some(FunctionInfo(container.member(
            MemberGroup::Methods,
            u32::from(index),
            InfoType::Function,
        )?)))
    }
}

// ============================================================================
// Arguments
// ============================================================================

impl ArgInfo {
    fn flags(&self) -> Result<u32, InfoError> {
        let (typelib, offset) = self.blob()?;
        Ok(typelib.u32_field(offset, arg::FLAGS)?)
    }

    pub fn direction(&self) -> Result<Direction, InfoError> {
        Ok(Direction::from_arg_flags(self.flags()?))
    }

    /// Whether the parameter is the callable's real return value
    pub fn is_return_value(&self) -> Result<bool, InfoError> {
        Ok(self.flags()? & arg::RETURN_VALUE != 0)
    }

    /// Whether the caller allocates the memory an out parameter points to
    pub fn is_caller_allocates(&self) -> Result<bool, InfoError> {
        Ok(self.flags()? & arg::CALLER_ALLOCATES != 0)
    }

    pub fn is_optional(&self) -> Result<bool, InfoError> {
        Ok(self.flags()? & arg::OPTIONAL != 0)
    }

    pub fn may_be_null(&self) -> Result<bool, InfoError> {
        Ok(self.flags()? & arg::NULL_OK != 0)
    }

    /// Ownership passed along with the value
    pub fn ownership_transfer(&self) -> Result<Transfer, InfoError> {
        let flags = self.flags()?;
        Ok(Transfer::from_bits(
            flags & arg::TRANSFER_OWNERSHIP != 0,
            flags & arg::TRANSFER_CONTAINER != 0,
        ))
    }

    /// Parameter type
    pub fn type_info(&self) -> Result<TypeInfo, InfoError> {
        let offset = self.offset()?;
        TypeInfo::from_slot(self, offset, arg::TYPE)
    }
}
