//! Blob kinds, field offsets and flag bits
//!
//! Every record in a typelib has a fixed field layout. The record *size* is
//! read from the header (see [`crate::header::BlobSizes`]); the offsets of
//! fields inside a record are fixed and live here, one module per blob kind.

use std::fmt;

// ============================================================================
// Blob types
// ============================================================================

/// Kind code stored in directory entries and in the first u16 of top-level blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BlobType {
    /// Never valid in a well-formed typelib
    Invalid = 0,
    /// Free function
    Function = 1,
    /// Function pointer type
    Callback = 2,
    /// Plain structure
    Struct = 3,
    /// Registered boxed structure
    Boxed = 4,
    /// Enumeration
    Enum = 5,
    /// Bit-flag enumeration
    Flags = 6,
    /// Class
    Object = 7,
    /// Interface
    Interface = 8,
    /// Constant
    Constant = 9,
    /// Error domain
    ErrorDomain = 10,
    /// Union
    Union = 11,
}

impl BlobType {
    /// Decode a blob type from its on-disk value
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => BlobType::Invalid,
            1 => BlobType::Function,
            2 => BlobType::Callback,
            3 => BlobType::Struct,
            4 => BlobType::Boxed,
            5 => BlobType::Enum,
            6 => BlobType::Flags,
            7 => BlobType::Object,
            8 => BlobType::Interface,
            9 => BlobType::Constant,
            10 => BlobType::ErrorDomain,
            11 => BlobType::Union,
            _ => return None,
        })
    }

    /// Lowercase name, used in diagnostics and dumps
    pub fn name(self) -> &'static str {
        match self {
            BlobType::Invalid => "invalid",
            BlobType::Function => "function",
            BlobType::Callback => "callback",
            BlobType::Struct => "struct",
            BlobType::Boxed => "boxed",
            BlobType::Enum => "enum",
            BlobType::Flags => "flags",
            BlobType::Object => "object",
            BlobType::Interface => "interface",
            BlobType::Constant => "constant",
            BlobType::ErrorDomain => "error-domain",
            BlobType::Union => "union",
        }
    }

    /// Whether blobs of this kind start with the registered-type prefix
    pub fn is_registered_type(self) -> bool {
        matches!(
            self,
            BlobType::Struct
                | BlobType::Boxed
                | BlobType::Enum
                | BlobType::Flags
                | BlobType::Object
                | BlobType::Interface
                | BlobType::Union
        )
    }
}

impl fmt::Display for BlobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Type tags
// ============================================================================

/// Tag of a type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    /// No value
    Void = 0,
    /// 32-bit boolean
    Boolean = 1,
    /// Signed 8-bit
    Int8 = 2,
    /// Unsigned 8-bit
    UInt8 = 3,
    /// Signed 16-bit
    Int16 = 4,
    /// Unsigned 16-bit
    UInt16 = 5,
    /// Signed 32-bit
    Int32 = 6,
    /// Unsigned 32-bit
    UInt32 = 7,
    /// Signed 64-bit
    Int64 = 8,
    /// Unsigned 64-bit
    UInt64 = 9,
    /// C `int`
    Int = 10,
    /// C `unsigned int`
    UInt = 11,
    /// C `long`
    Long = 12,
    /// C `unsigned long`
    ULong = 13,
    /// C `ssize_t`
    SSize = 14,
    /// C `size_t`
    Size = 15,
    /// 32-bit float
    Float = 16,
    /// 64-bit float
    Double = 17,
    /// NUL-terminated UTF-8 string
    Utf8 = 18,
    /// NUL-terminated file name in the platform encoding
    Filename = 19,
    /// Array of an element type
    Array = 20,
    /// Reference to another entity through the directory
    Interface = 21,
    /// Doubly linked list
    GList = 22,
    /// Singly linked list
    GSList = 23,
    /// Hash table
    GHash = 24,
    /// Error with a list of possible domains
    Error = 25,
}

impl TypeTag {
    /// Decode a tag from its 5-bit on-disk value
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => TypeTag::Void,
            1 => TypeTag::Boolean,
            2 => TypeTag::Int8,
            3 => TypeTag::UInt8,
            4 => TypeTag::Int16,
            5 => TypeTag::UInt16,
            6 => TypeTag::Int32,
            7 => TypeTag::UInt32,
            8 => TypeTag::Int64,
            9 => TypeTag::UInt64,
            10 => TypeTag::Int,
            11 => TypeTag::UInt,
            12 => TypeTag::Long,
            13 => TypeTag::ULong,
            14 => TypeTag::SSize,
            15 => TypeTag::Size,
            16 => TypeTag::Float,
            17 => TypeTag::Double,
            18 => TypeTag::Utf8,
            19 => TypeTag::Filename,
            20 => TypeTag::Array,
            21 => TypeTag::Interface,
            22 => TypeTag::GList,
            23 => TypeTag::GSList,
            24 => TypeTag::GHash,
            25 => TypeTag::Error,
            _ => return None,
        })
    }

    /// Whether the tag fits in a simple type slot
    pub fn is_basic(self) -> bool {
        (self as u8) <= TypeTag::Filename as u8
    }

    /// Lowercase name, used in diagnostics and dumps
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Boolean => "gboolean",
            TypeTag::Int8 => "gint8",
            TypeTag::UInt8 => "guint8",
            TypeTag::Int16 => "gint16",
            TypeTag::UInt16 => "guint16",
            TypeTag::Int32 => "gint32",
            TypeTag::UInt32 => "guint32",
            TypeTag::Int64 => "gint64",
            TypeTag::UInt64 => "guint64",
            TypeTag::Int => "gint",
            TypeTag::UInt => "guint",
            TypeTag::Long => "glong",
            TypeTag::ULong => "gulong",
            TypeTag::SSize => "gssize",
            TypeTag::Size => "gsize",
            TypeTag::Float => "gfloat",
            TypeTag::Double => "gdouble",
            TypeTag::Utf8 => "utf8",
            TypeTag::Filename => "filename",
            TypeTag::Array => "array",
            TypeTag::Interface => "interface",
            TypeTag::GList => "GList",
            TypeTag::GSList => "GSList",
            TypeTag::GHash => "GHashTable",
            TypeTag::Error => "GError",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Type slots
// ============================================================================

/// Decoded 4-byte type slot
///
/// A slot whose low 24 bits are zero is a simple type; anything else is the
/// offset of a parametrized type blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSlot {
    /// Tag and pointer flag stored inline
    Simple {
        /// Raw 5-bit tag
        tag: u8,
        /// Pointer flag
        pointer: bool,
    },
    /// Offset of a parametrized type blob
    Param(u32),
}

impl TypeSlot {
    /// Decode a raw slot value
    pub fn decode(raw: u32) -> Self {
        if raw & type_slot::OFFSET_MASK == 0 {
            TypeSlot::Simple {
                tag: (raw >> type_slot::TAG_SHIFT) as u8,
                pointer: raw & type_slot::POINTER != 0,
            }
        } else {
            TypeSlot::Param(raw)
        }
    }

    /// Encode a simple slot
    pub fn simple(tag: TypeTag, pointer: bool) -> u32 {
        let mut raw = (tag as u32) << type_slot::TAG_SHIFT;
        if pointer {
            raw |= type_slot::POINTER;
        }
        raw
    }
}

// ============================================================================
// Field offsets and flag bits
// ============================================================================

/// Directory entry layout
pub mod entry {
    pub const BLOB_TYPE: u32 = 0;
    pub const FLAGS: u32 = 2;
    pub const NAME: u32 = 4;
    pub const OFFSET: u32 = 8;

    pub const LOCAL: u16 = 1 << 0;
}

/// Prefix shared by every top-level blob
pub mod common {
    pub const BLOB_TYPE: u32 = 0;
    pub const FLAGS: u32 = 2;
    pub const NAME: u32 = 4;

    pub const DEPRECATED: u16 = 1 << 0;
}

/// Registered-type prefix (struct, boxed, union, enum, flags, object, interface)
pub mod registered {
    pub const GTYPE_NAME: u32 = 8;
    pub const GTYPE_INIT: u32 = 12;

    pub const UNREGISTERED: u16 = 1 << 1;
}

pub mod function {
    pub const SYMBOL: u32 = 8;
    pub const SIGNATURE: u32 = 12;
    pub const INDEX: u32 = 16;

    pub const SETTER: u16 = 1 << 1;
    pub const GETTER: u16 = 1 << 2;
    pub const CONSTRUCTOR: u16 = 1 << 3;
    pub const WRAPS_VFUNC: u16 = 1 << 4;
    pub const THROWS: u16 = 1 << 5;
    pub const IS_STATIC: u16 = 1 << 6;
}

pub mod callback {
    pub const SIGNATURE: u32 = 8;
}

pub mod signal {
    pub const FLAGS: u32 = 0;
    pub const CLASS_CLOSURE: u32 = 2;
    pub const NAME: u32 = 4;
    pub const SIGNATURE: u32 = 8;

    pub const DEPRECATED: u16 = 1 << 0;
    pub const RUN_FIRST: u16 = 1 << 1;
    pub const RUN_LAST: u16 = 1 << 2;
    pub const RUN_CLEANUP: u16 = 1 << 3;
    pub const NO_RECURSE: u16 = 1 << 4;
    pub const DETAILED: u16 = 1 << 5;
    pub const ACTION: u16 = 1 << 6;
    pub const NO_HOOKS: u16 = 1 << 7;
    pub const HAS_CLASS_CLOSURE: u16 = 1 << 8;
    pub const TRUE_STOPS_EMIT: u16 = 1 << 9;
}

pub mod vfunc {
    pub const NAME: u32 = 0;
    pub const FLAGS: u32 = 4;
    pub const SIGNAL: u32 = 6;
    pub const STRUCT_OFFSET: u32 = 8;
    pub const INVOKER: u32 = 10;
    pub const SIGNATURE: u32 = 12;

    pub const MUST_CHAIN_UP: u16 = 1 << 0;
    pub const MUST_BE_IMPLEMENTED: u16 = 1 << 1;
    pub const MUST_NOT_BE_IMPLEMENTED: u16 = 1 << 2;
    pub const CLASS_CLOSURE: u16 = 1 << 3;
    pub const THROWS: u16 = 1 << 4;

    /// Invoker value meaning "no invoker"
    pub const NO_INVOKER: u16 = 0x3ff;
}

pub mod signature {
    pub const RETURN_TYPE: u32 = 0;
    pub const FLAGS: u32 = 4;
    pub const N_ARGUMENTS: u32 = 6;

    pub const MAY_RETURN_NULL: u16 = 1 << 0;
    pub const CALLER_OWNS_RETURN_VALUE: u16 = 1 << 1;
    pub const CALLER_OWNS_RETURN_CONTAINER: u16 = 1 << 2;
}

pub mod arg {
    pub const NAME: u32 = 0;
    pub const FLAGS: u32 = 4;
    pub const TYPE: u32 = 8;

    pub const IN: u32 = 1 << 0;
    pub const OUT: u32 = 1 << 1;
    pub const CALLER_ALLOCATES: u32 = 1 << 2;
    pub const OPTIONAL: u32 = 1 << 3;
    pub const NULL_OK: u32 = 1 << 4;
    pub const RETURN_VALUE: u32 = 1 << 5;
    pub const TRANSFER_OWNERSHIP: u32 = 1 << 6;
    pub const TRANSFER_CONTAINER: u32 = 1 << 7;
}

pub mod property {
    pub const NAME: u32 = 0;
    pub const FLAGS: u32 = 4;
    pub const TYPE: u32 = 8;

    pub const DEPRECATED: u32 = 1 << 0;
    pub const READABLE: u32 = 1 << 1;
    pub const WRITABLE: u32 = 1 << 2;
    pub const CONSTRUCT: u32 = 1 << 3;
    pub const CONSTRUCT_ONLY: u32 = 1 << 4;
}

pub mod field {
    pub const NAME: u32 = 0;
    pub const FLAGS: u32 = 4;
    pub const BITS: u32 = 5;
    pub const STRUCT_OFFSET: u32 = 6;
    pub const TYPE: u32 = 8;

    pub const READABLE: u8 = 1 << 0;
    pub const WRITABLE: u8 = 1 << 1;
}

pub mod value {
    pub const FLAGS: u32 = 0;
    pub const NAME: u32 = 4;
    pub const VALUE: u32 = 8;

    pub const DEPRECATED: u32 = 1 << 0;
}

pub mod constant {
    pub const TYPE: u32 = 8;
    pub const SIZE: u32 = 12;
    pub const OFFSET: u32 = 16;
}

pub mod error_domain {
    pub const GET_QUARK: u32 = 8;
    pub const ERROR_CODES: u32 = 12;
}

pub mod annotation {
    pub const OWNER: u32 = 0;
    pub const NAME: u32 = 4;
    pub const VALUE: u32 = 8;
}

pub mod struct_blob {
    pub const N_FIELDS: u32 = 16;
    pub const N_METHODS: u32 = 18;
}

pub mod union_blob {
    pub const N_FIELDS: u32 = 16;
    pub const N_FUNCTIONS: u32 = 18;
    pub const DISCRIMINATOR_OFFSET: u32 = 20;
    pub const DISCRIMINATOR_TYPE: u32 = 24;

    pub const DISCRIMINATED: u16 = 1 << 2;
}

pub mod enum_blob {
    pub const N_VALUES: u32 = 16;
    pub const N_METHODS: u32 = 18;
    pub const STORAGE_TYPE: u32 = 20;
}

pub mod object {
    pub const PARENT: u32 = 16;
    pub const N_INTERFACES: u32 = 18;
    pub const N_FIELDS: u32 = 20;
    pub const N_PROPERTIES: u32 = 22;
    pub const N_METHODS: u32 = 24;
    pub const N_SIGNALS: u32 = 26;
    pub const N_VFUNCS: u32 = 28;
    pub const N_CONSTANTS: u32 = 30;

    pub const ABSTRACT: u16 = 1 << 2;
}

pub mod interface {
    pub const N_PREREQUISITES: u32 = 16;
    pub const N_PROPERTIES: u32 = 18;
    pub const N_METHODS: u32 = 20;
    pub const N_SIGNALS: u32 = 22;
    pub const N_VFUNCS: u32 = 24;
    pub const N_CONSTANTS: u32 = 26;
}

/// Simple slots and parametrized type blobs
pub mod type_slot {
    pub const POINTER: u32 = 1 << 24;
    pub const TAG_SHIFT: u32 = 27;
    pub const OFFSET_MASK: u32 = 0x00ff_ffff;

    /// Pointer bit in byte 0 of a parametrized blob
    pub const PARAM_POINTER: u8 = 1 << 0;
    /// Tag shift in byte 0 of a parametrized blob
    pub const PARAM_TAG_SHIFT: u8 = 3;

    pub const ARRAY_FLAGS: u32 = 1;
    pub const ARRAY_LENGTH: u32 = 2;
    pub const ARRAY_ELEMENT: u32 = 4;
    pub const ARRAY_BLOB_SIZE: u32 = 8;
    pub const ZERO_TERMINATED: u8 = 1 << 0;
    pub const HAS_LENGTH: u8 = 1 << 1;
    pub const HAS_SIZE: u8 = 1 << 2;

    pub const N_TYPES: u32 = 2;
    pub const PARAM_TYPES: u32 = 4;

    pub const INTERFACE: u32 = 2;

    pub const N_DOMAINS: u32 = 2;
    pub const DOMAINS: u32 = 4;

    /// Size of one type slot
    pub const SLOT_SIZE: u32 = 4;
}

// ============================================================================
// Ownership and direction
// ============================================================================

/// Parameter direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Passed by value into the callee
    #[default]
    In,
    /// Written by the callee through a pointer
    Out,
    /// Read and written by the callee through a pointer
    InOut,
}

impl Direction {
    /// Decode from argument flag bits
    pub fn from_arg_flags(flags: u32) -> Self {
        match (flags & arg::IN != 0, flags & arg::OUT != 0) {
            (true, true) => Direction::InOut,
            (false, true) => Direction::Out,
            _ => Direction::In,
        }
    }

    /// Encode into argument flag bits
    pub fn arg_flags(self) -> u32 {
        match self {
            Direction::In => arg::IN,
            Direction::Out => arg::OUT,
            Direction::InOut => arg::IN | arg::OUT,
        }
    }
}

/// Ownership transfer of a value between caller and callee
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Transfer {
    /// Ownership stays with the callee
    #[default]
    Nothing,
    /// The container is transferred, its elements are not
    Container,
    /// The value and everything it holds is transferred
    Everything,
}

impl Transfer {
    /// Decode from a pair of "owns value" / "owns container" bits
    pub fn from_bits(owns_value: bool, owns_container: bool) -> Self {
        if owns_value {
            Transfer::Everything
        } else if owns_container {
            Transfer::Container
        } else {
            Transfer::Nothing
        }
    }
}

// ============================================================================
// Flag sets
// ============================================================================

/// Function flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionFlags {
    /// Takes an implicit instance argument
    pub is_method: bool,
    /// Constructs a new instance
    pub is_constructor: bool,
    /// Getter of a property
    pub is_getter: bool,
    /// Setter of a property
    pub is_setter: bool,
    /// Invokes a virtual function
    pub wraps_vfunc: bool,
    /// Has a trailing error-output argument
    pub throws: bool,
}

impl FunctionFlags {
    /// Decode from the function blob flags field
    pub fn from_bits(bits: u16) -> Self {
        let is_constructor = bits & function::CONSTRUCTOR != 0;
        Self {
            is_method: bits & function::IS_STATIC == 0 && !is_constructor,
            is_constructor,
            is_getter: bits & function::GETTER != 0,
            is_setter: bits & function::SETTER != 0,
            wraps_vfunc: bits & function::WRAPS_VFUNC != 0,
            throws: bits & function::THROWS != 0,
        }
    }

    /// Encode into the function blob flags field (without deprecation)
    pub fn bits(&self) -> u16 {
        let mut bits = 0;
        if !self.is_method {
            bits |= function::IS_STATIC;
        }
        if self.is_constructor {
            bits |= function::CONSTRUCTOR;
        }
        if self.is_getter {
            bits |= function::GETTER;
        }
        if self.is_setter {
            bits |= function::SETTER;
        }
        if self.wraps_vfunc {
            bits |= function::WRAPS_VFUNC;
        }
        if self.throws {
            bits |= function::THROWS;
        }
        bits
    }
}

/// Signal emission flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalFlags {
    pub run_first: bool,
    pub run_last: bool,
    pub run_cleanup: bool,
    pub no_recurse: bool,
    pub detailed: bool,
    pub action: bool,
    pub no_hooks: bool,
}

impl SignalFlags {
    /// Decode from the signal blob flags field
    pub fn from_bits(bits: u16) -> Self {
        Self {
            run_first: bits & signal::RUN_FIRST != 0,
            run_last: bits & signal::RUN_LAST != 0,
            run_cleanup: bits & signal::RUN_CLEANUP != 0,
            no_recurse: bits & signal::NO_RECURSE != 0,
            detailed: bits & signal::DETAILED != 0,
            action: bits & signal::ACTION != 0,
            no_hooks: bits & signal::NO_HOOKS != 0,
        }
    }

    /// Encode into the signal blob flags field
    pub fn bits(&self) -> u16 {
        [
            (self.run_first, signal::RUN_FIRST),
            (self.run_last, signal::RUN_LAST),
            (self.run_cleanup, signal::RUN_CLEANUP),
            (self.no_recurse, signal::NO_RECURSE),
            (self.detailed, signal::DETAILED),
            (self.action, signal::ACTION),
            (self.no_hooks, signal::NO_HOOKS),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }
}

/// Virtual function flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VFuncFlags {
    pub must_chain_up: bool,
    pub must_be_implemented: bool,
    pub must_not_be_implemented: bool,
    pub throws: bool,
}

impl VFuncFlags {
    /// Decode from the vfunc blob flags field
    pub fn from_bits(bits: u16) -> Self {
        Self {
            must_chain_up: bits & vfunc::MUST_CHAIN_UP != 0,
            must_be_implemented: bits & vfunc::MUST_BE_IMPLEMENTED != 0,
            must_not_be_implemented: bits & vfunc::MUST_NOT_BE_IMPLEMENTED != 0,
            throws: bits & vfunc::THROWS != 0,
        }
    }

    /// Encode into the vfunc blob flags field (without the class-closure bit)
    pub fn bits(&self) -> u16 {
        [
            (self.must_chain_up, vfunc::MUST_CHAIN_UP),
            (self.must_be_implemented, vfunc::MUST_BE_IMPLEMENTED),
            (self.must_not_be_implemented, vfunc::MUST_NOT_BE_IMPLEMENTED),
            (self.throws, vfunc::THROWS),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }
}

/// Property access flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyFlags {
    pub readable: bool,
    pub writable: bool,
    pub construct: bool,
    pub construct_only: bool,
}

impl PropertyFlags {
    /// Decode from the property blob flags field
    pub fn from_bits(bits: u32) -> Self {
        Self {
            readable: bits & property::READABLE != 0,
            writable: bits & property::WRITABLE != 0,
            construct: bits & property::CONSTRUCT != 0,
            construct_only: bits & property::CONSTRUCT_ONLY != 0,
        }
    }

    /// Encode into the property blob flags field (without deprecation)
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.readable {
            bits |= property::READABLE;
        }
        if self.writable {
            bits |= property::WRITABLE;
        }
        if self.construct {
            bits |= property::CONSTRUCT;
        }
        if self.construct_only {
            bits |= property::CONSTRUCT_ONLY;
        }
        bits
    }
}

/// Field access flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFlags {
    pub readable: bool,
    pub writable: bool,
}

impl FieldFlags {
    /// Decode from the field blob flags byte
    pub fn from_bits(bits: u8) -> Self {
        Self {
            readable: bits & field::READABLE != 0,
            writable: bits & field::WRITABLE != 0,
        }
    }

    /// Encode into the field blob flags byte
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.readable {
            bits |= field::READABLE;
        }
        if self.writable {
            bits |= field::WRITABLE;
        }
        bits
    }
}
