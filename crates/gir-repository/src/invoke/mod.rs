//! Dynamic invocation
//!
//! Calls a native function described by a [`FunctionInfo`] with argument
//! values supplied at runtime. The argument vector is assembled from the
//! signature: an optional instance pointer first, then one native argument
//! per declared parameter, then an optional error-output pointer. Argument
//! count mismatches are reported before the call is made.

mod native_type;

use crate::info::{Callable, FunctionInfo};
use crate::loader::{LoadError, SymbolLoader};
use crate::resolve::ModuleRegistry;
use crate::InfoError;
use gir_typelib::Direction;
use libffi::low::{ffi_abi_FFI_DEFAULT_ABI, ffi_cif, ffi_type, prep_cif, types, CodePtr};
use std::ffi::{c_void, CStr};
use std::fmt;
use std::os::raw::{c_char, c_long, c_ulong};
use std::ptr::{addr_of_mut, null_mut};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that prevent an invocation from happening
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The exported symbol could not be resolved
    #[error("Could not locate {symbol}: {source}")]
    SymbolNotFound {
        /// Symbol of the function
        symbol: String,
        /// Loader error
        source: LoadError,
    },

    /// Too few or too many caller arguments for the signature
    #[error("{0}")]
    ArgumentMismatch(String),

    /// The native call descriptor could not be built
    #[error("Failed to construct call: {0}")]
    CallConstruction(String),

    /// Navigation error while reading the signature
    #[error(transparent)]
    Info(#[from] InfoError),
}

// ============================================================================
// Argument values
// ============================================================================

macro_rules! argument_fields {
    ($($field:ident: $ty:ty => $ctor:ident, $getter:ident;)*) => {
        /// One native argument or return value
        ///
        /// Eight bytes wide and always fully initialized, so any field can be
        /// read back regardless of which one was written.
        #[repr(C)]
        #[derive(Clone, Copy)]
        pub union Argument {
            $($field: $ty,)*
        }

        impl Argument {
            $(
                pub fn $ctor(value: $ty) -> Self {
                    let mut argument = Self::zeroed();
                    argument.$field = value;
                    argument
                }

                pub fn $getter(&self) -> $ty {
                    unsafe { self.$field }
                }
            )*
        }
    };
}

argument_fields! {
    v_int8: i8 => int8, as_int8;
    v_uint8: u8 => uint8, as_uint8;
    v_int16: i16 => int16, as_int16;
    v_uint16: u16 => uint16, as_uint16;
    v_int32: i32 => int32, as_int32;
    v_uint32: u32 => uint32, as_uint32;
    v_int64: i64 => int64, as_int64;
    v_uint64: u64 => uint64, as_uint64;
    v_float: f32 => float, as_float;
    v_double: f64 => double, as_double;
    v_long: c_long => long, as_long;
    v_ulong: c_ulong => ulong, as_ulong;
    v_ssize: isize => ssize, as_ssize;
    v_size: usize => size, as_size;
    v_pointer: *mut c_void => pointer, as_pointer;
}

impl Argument {
    /// All-zero value
    pub fn zeroed() -> Self {
        Argument { v_uint64: 0 }
    }

    /// Boolean stored as a 32-bit integer
    pub fn boolean(value: bool) -> Self {
        Self::int32(i32::from(value))
    }

    pub fn as_boolean(&self) -> bool {
        self.as_int32() != 0
    }
}

impl Default for Argument {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Argument({:#018x})", self.as_uint64())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Error record a throwing callee stores through its error-output argument
#[repr(C)]
#[derive(Debug)]
pub struct ErrorRecord {
    pub domain: u32,
    pub code: i32,
    pub message: *mut c_char,
}

/// Error reported by the callee itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (domain {domain}, code {code})")]
pub struct DomainError {
    pub domain: u32,
    pub code: i32,
    pub message: String,
}

impl DomainError {
    /// Copy of `record`; the record itself is not released
    ///
    /// # Safety
    ///
    /// `record.message` must be null or point to a NUL-terminated string.
    pub unsafe fn from_record(record: &ErrorRecord) -> Self {
        let message = if record.message.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(record.message) }
                .to_string_lossy()
                .into_owned()
        };
        DomainError {
            domain: record.domain,
            code: record.code,
            message,
        }
    }
}

/// Outcome of a call that happened
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Return value; all zero for `void`
    pub return_value: Argument,
    /// Error the callee reported, if it throws and did
    pub error: Option<DomainError>,
}

// ============================================================================
// Invoker
// ============================================================================

/// Where one native argument comes from
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Caller "in" value passed as is
    In(usize),
    /// Pointer to a caller "out" slot
    Out(usize),
    /// "in" value copied into an "out" slot, passed as a pointer to it
    InOut { input: usize, output: usize },
    /// Pointer to the local error-output slot
    Error,
}

fn mismatch(message: &str) -> InvokeError {
    InvokeError::ArgumentMismatch(message.to_string())
}

/// Releases an error record a callee handed to the caller
pub type ErrorRecordFree = unsafe extern "C" fn(*mut ErrorRecord);

/// Calls functions described by typelibs
pub struct Invoker<'a> {
    symbols: &'a dyn SymbolLoader,
    registry: &'a dyn ModuleRegistry,
    error_free: Option<ErrorRecordFree>,
}

impl<'a> Invoker<'a> {
    /// Invoker resolving symbols through `symbols` and interface types
    /// through `registry`
    pub fn new(symbols: &'a dyn SymbolLoader, registry: &'a dyn ModuleRegistry) -> Self {
        Invoker {
            symbols,
            registry,
            error_free: None,
        }
    }

    /// Release error records with `free` once they are copied
    ///
    /// A throwing callee transfers its error record to the caller. Without a
    /// release function the record is never freed.
    pub fn with_error_free(mut self, free: ErrorRecordFree) -> Self {
        self.error_free = Some(free);
        self
    }

    /// Call `function`
    ///
    /// An instance method takes its instance pointer from `in_args[0]`. Each
    /// "in" parameter consumes the next `in_args` value; each "out" parameter
    /// receives a pointer to the next `out_args` slot, which the callee
    /// writes through; an "inout" parameter consumes one of each, its "in"
    /// value is copied to the "out" slot before the call and the callee gets
    /// a pointer to that slot.
    ///
    /// # Safety
    ///
    /// The symbol must really have the signature the typelib describes, and
    /// every pointer passed in `in_args` must be valid for the callee.
    pub unsafe fn invoke(
        &self,
        function: &FunctionInfo,
        in_args: &[Argument],
        out_args: &mut [Argument],
    ) -> Result<Invocation, InvokeError> {
        let symbol = function.symbol()?;
        let address = self
            .symbols
            .symbol(symbol)
            .map_err(|source| InvokeError::SymbolNotFound {
                symbol: symbol.to_string(),
                source,
            })?;

        let flags = function.flags()?;
        let is_method = flags.is_method;
        let throws = flags.throws;
        let rtype = native_type::for_type(&function.return_type()?, self.registry)?;

        let n_args = function.n_args()? as usize;
        let n_invoke_args = n_args + usize::from(is_method) + usize::from(throws);
        let mut atypes: Vec<*mut ffi_type> = Vec::with_capacity(n_invoke_args);
        let mut plan: Vec<Slot> = Vec::with_capacity(n_invoke_args);
        let mut in_pos = 0;
        let mut out_pos = 0;

        if is_method {
            if in_args.is_empty() {
                return Err(mismatch("Too few \"in\" arguments (handling this)"));
            }
            atypes.push(addr_of_mut!(types::pointer));
            plan.push(Slot::In(0));
            in_pos += 1;
        }

        for arg in function.args()? {
            match arg.direction()? {
                Direction::In => {
                    if in_pos >= in_args.len() {
                        return Err(mismatch("Too few \"in\" arguments (handling in)"));
                    }
                    atypes.push(native_type::for_type(&arg.type_info()?, self.registry)?);
                    plan.push(Slot::In(in_pos));
                    in_pos += 1;
                }
                Direction::Out => {
                    if out_pos >= out_args.len() {
                        return Err(mismatch("Too few \"out\" arguments (handling out)"));
                    }
                    atypes.push(addr_of_mut!(types::pointer));
                    plan.push(Slot::Out(out_pos));
                    out_pos += 1;
                }
                Direction::InOut => {
                    if in_pos >= in_args.len() {
                        return Err(mismatch("Too few \"in\" arguments (handling inout)"));
                    }
                    if out_pos >= out_args.len() {
                        return Err(mismatch("Too few \"out\" arguments (handling inout)"));
                    }
                    atypes.push(addr_of_mut!(types::pointer));
                    plan.push(Slot::InOut {
                        input: in_pos,
                        output: out_pos,
                    });
                    in_pos += 1;
                    out_pos += 1;
                }
            }
        }

        if throws {
            atypes.push(addr_of_mut!(types::pointer));
            plan.push(Slot::Error);
        }

        if in_pos < in_args.len() {
            return Err(mismatch("Too many \"in\" arguments (at end)"));
        }
        if out_pos < out_args.len() {
            return Err(mismatch("Too many \"out\" arguments (at end)"));
        }

        let mut cif: ffi_cif = unsafe { std::mem::zeroed() };
        let prepared = unsafe {
            prep_cif(
                &mut cif,
                ffi_abi_FFI_DEFAULT_ABI,
                atypes.len(),
                rtype,
                if atypes.is_empty() {
                    null_mut()
                } else {
                    atypes.as_mut_ptr()
                },
            )
        };
        prepared.map_err(|e| InvokeError::CallConstruction(format!("{:?}", e)))?;

        for slot in &plan {
            if let Slot::InOut { input, output } = *slot {
                out_args[output] = in_args[input];
            }
        }

        let mut error_record: *mut ErrorRecord = null_mut();
        let error_address: *mut *mut ErrorRecord = &mut error_record;
        let out_base = out_args.as_mut_ptr();

        // Pointer values passed for out, inout and error slots
        let mut pointers: Vec<*mut c_void> = plan
            .iter()
            .map(|slot| match *slot {
                Slot::In(_) => null_mut(),
                Slot::Out(output) | Slot::InOut { output, .. } => {
                    out_base.wrapping_add(output).cast()
                }
                Slot::Error => error_address.cast(),
            })
            .collect();
        let mut values: Vec<*mut c_void> = plan
            .iter()
            .zip(pointers.iter_mut())
            .map(|(slot, pointer)| match *slot {
                Slot::In(input) => (&in_args[input] as *const Argument).cast_mut().cast(),
                _ => (pointer as *mut *mut c_void).cast(),
            })
            .collect();

        debug!(%symbol, n_invoke_args, is_method, throws, "Invoking");

        let mut return_value = Argument::zeroed();
        unsafe {
            libffi::raw::ffi_call(
                &mut cif,
                Some(*CodePtr::from_ptr(address).as_safe_fun()),
                (&mut return_value as *mut Argument).cast(),
                if values.is_empty() {
                    null_mut()
                } else {
                    values.as_mut_ptr()
                },
            );
        }

        let error = if error_record.is_null() {
            None
        } else {
            let error = unsafe { DomainError::from_record(&*error_record) };
            debug!(%symbol, domain = error.domain, code = error.code, "Callee reported an error");
            match self.error_free {
                Some(free) => unsafe { free(error_record) },
                None => warn!(%symbol, "Error record leaked, no release function set"),
            }
            Some(error)
        };

        Ok(Invocation {
            return_value,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<Argument>(), 8);
    }

    #[test]
    fn test_argument_reads_back_zero_extended() {
        let arg = Argument::uint8(0xab);
        assert_eq!(arg.as_uint8(), 0xab);
        assert_eq!(arg.as_uint64(), 0xab);
        assert!(Argument::boolean(true).as_boolean());
        assert!(!Argument::default().as_boolean());
        assert_eq!(Argument::double(1.5).as_double(), 1.5);
        assert!(Argument::zeroed().as_pointer().is_null());
    }

    #[test]
    fn test_domain_error_from_record() {
        let message = std::ffi::CString::new("boom").unwrap();
        let record = ErrorRecord {
            domain: 7,
            code: -2,
            message: message.as_ptr().cast_mut(),
        };
        let error = unsafe { DomainError::from_record(&record) };
        assert_eq!(
            error,
            DomainError {
                domain: 7,
                code: -2,
                message: "boom".into()
            }
        );
        assert_eq!(error.to_string(), "boom (domain 7, code -2)");
    }
}
