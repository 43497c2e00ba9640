//! Typelib repository and dynamic invocation
//!
//! This crate layers typed, reference-counted info objects over the raw
//! typelib buffers of [`gir_typelib`]:
//!
//! - [`info`]: info objects and member navigation
//! - [`resolve`]: directory-entry resolution through a [`ModuleRegistry`]
//! - [`Repository`]: loaded namespaces, search paths and shared libraries
//! - [`Invoker`]: calls native functions from their typelib description

#![warn(rust_2018_idioms)]

pub mod config;
mod error;
pub mod info;
pub mod invoke;
pub mod loader;
pub mod repository;
pub mod resolve;

pub use config::{ConfigError, RepositoryConfig};
pub use error::InfoError;
pub use info::{
    ArgInfo, BaseInfo, Callable, CallableInfo, CallbackInfo, ConstantInfo, EnumInfo,
    ErrorDomainInfo, FieldInfo, FunctionInfo, InfoType, InterfaceInfo, ObjectInfo, PropertyInfo,
    RegisteredType, RegisteredTypeInfo, SignalInfo, StructInfo, TypeInfo, UnionInfo, VFuncInfo,
    ValueInfo,
};
pub use invoke::{
    Argument, DomainError, ErrorRecord, ErrorRecordFree, Invocation, InvokeError, Invoker,
};
pub use loader::{Library, LibrarySet, LoadError, SymbolLoader, SymbolTable};
pub use repository::{Repository, RepositoryError};
pub use resolve::{resolve_entry, EmptyRegistry, ModuleRegistry};
