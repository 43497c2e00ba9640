//! Navigation errors

use crate::info::InfoType;
use gir_typelib::{ReadError, TypelibError};
use thiserror::Error;

/// Errors produced while navigating info objects
#[derive(Debug, Error)]
pub enum InfoError {
    /// Structural error in the underlying typelib
    #[error(transparent)]
    Typelib(#[from] TypelibError),

    /// Out-of-bounds or malformed read
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Blob access attempted on an unresolved cross-module reference
    #[error("Unresolved reference {namespace}.{name}")]
    Unresolved {
        /// Namespace of the missing entity
        namespace: String,
        /// Name of the missing entity
        name: String,
    },

    /// Conversion to a typed info of another kind
    #[error("Expected {expected} info, found {found:?}")]
    WrongKind {
        /// Requested wrapper
        expected: &'static str,
        /// Actual kind
        found: InfoType,
    },

    /// Name requested from a kind that has none
    #[error("{0:?} infos have no name")]
    NoName(InfoType),

    /// Index outside a signature, type parameter or domain list
    #[error("Index {index} out of range for {what} (count {count})")]
    IndexOutOfRange {
        /// What was indexed
        what: &'static str,
        /// Requested index
        index: u32,
        /// Number of elements
        count: u32,
    },

    /// Type tag that does not decode
    #[error("Invalid type tag {value} at offset {offset}")]
    InvalidTypeTag {
        /// Raw tag
        value: u8,
        /// Offset of the type
        offset: u32,
    },

    /// Constant whose type has no decodable value
    #[error("Constant of type {0} has no decodable value")]
    UnsupportedConstant(gir_typelib::TypeTag),
}
