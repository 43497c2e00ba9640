//! In-memory node tree consumed by the builder
//!
//! Cross references (`parent`, `interfaces`, interface types, error domains)
//! are written as names: a bare `Name` refers to an entry of the namespace
//! being built, `Namespace.Name` to an entry of another namespace.

use crate::blob::{
    BlobType, Direction, FieldFlags, FunctionFlags, PropertyFlags, SignalFlags, Transfer,
    TypeTag, VFuncFlags,
};

/// Key/value annotations attached to a node
pub type Annotations = Vec<(String, String)>;

// ============================================================================
// Types
// ============================================================================

/// Length information of an array type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayLength {
    /// Neither a length argument nor a fixed size
    #[default]
    None,
    /// Index of the argument holding the length
    Argument(u16),
    /// Fixed number of elements
    Fixed(u16),
}

/// Type descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
    /// Tag that fits a simple slot
    Basic { tag: TypeTag, pointer: bool },
    Array {
        element: Box<TypeDef>,
        length: ArrayLength,
        zero_terminated: bool,
    },
    /// `GList` or `GSList` of an element type
    List { tag: TypeTag, element: Box<TypeDef> },
    Hash {
        key: Box<TypeDef>,
        value: Box<TypeDef>,
    },
    /// Reference to a named entry
    Interface { name: String, pointer: bool },
    /// Error with its possible domains
    Error { domains: Vec<String> },
}

impl Default for TypeDef {
    fn default() -> Self {
        TypeDef::Basic {
            tag: TypeTag::Void,
            pointer: false,
        }
    }
}

impl TypeDef {
    /// Basic type; strings are pointers, everything else is a value
    pub fn basic(tag: TypeTag) -> Self {
        TypeDef::Basic {
            tag,
            pointer: matches!(tag, TypeTag::Utf8 | TypeTag::Filename),
        }
    }

    /// Pointer to a basic type
    pub fn pointer(tag: TypeTag) -> Self {
        TypeDef::Basic { tag, pointer: true }
    }

    /// Pointer to a named entry (objects, boxed structs)
    pub fn interface(name: impl Into<String>) -> Self {
        TypeDef::Interface {
            name: name.into(),
            pointer: true,
        }
    }

    /// Named entry passed by value (enums, flags)
    pub fn interface_value(name: impl Into<String>) -> Self {
        TypeDef::Interface {
            name: name.into(),
            pointer: false,
        }
    }

    pub fn array(element: TypeDef, length: ArrayLength, zero_terminated: bool) -> Self {
        TypeDef::Array {
            element: Box::new(element),
            length,
            zero_terminated,
        }
    }

    pub fn list(element: TypeDef) -> Self {
        TypeDef::List {
            tag: TypeTag::GList,
            element: Box::new(element),
        }
    }

    pub fn slist(element: TypeDef) -> Self {
        TypeDef::List {
            tag: TypeTag::GSList,
            element: Box::new(element),
        }
    }

    pub fn hash(key: TypeDef, value: TypeDef) -> Self {
        TypeDef::Hash {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn error(domains: Vec<String>) -> Self {
        TypeDef::Error { domains }
    }
}

// ============================================================================
// Callables
// ============================================================================

/// Parameter of a callable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgDef {
    pub name: String,
    pub ty: TypeDef,
    pub direction: Direction,
    pub transfer: Transfer,
    pub caller_allocates: bool,
    pub optional: bool,
    pub may_be_null: bool,
    pub is_return_value: bool,
    pub annotations: Annotations,
}

impl ArgDef {
    pub fn new(name: impl Into<String>, ty: TypeDef, direction: Direction) -> Self {
        Self {
            name: name.into(),
            ty,
            direction,
            ..Default::default()
        }
    }
}

/// Return type and parameters shared by every callable kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureDef {
    pub return_type: TypeDef,
    pub return_transfer: Transfer,
    pub may_return_null: bool,
    pub args: Vec<ArgDef>,
}

impl SignatureDef {
    pub fn new(return_type: TypeDef, args: Vec<ArgDef>) -> Self {
        Self {
            return_type,
            args,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub symbol: String,
    pub flags: FunctionFlags,
    /// Property index for getters/setters, vfunc index when wrapping a vfunc
    pub index: u16,
    pub signature: SignatureDef,
    pub deprecated: bool,
    pub annotations: Annotations,
}

impl FunctionDef {
    /// Static function
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, signature: SignatureDef) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            signature,
            ..Default::default()
        }
    }

    /// Method taking an implicit instance argument
    pub fn method(
        name: impl Into<String>,
        symbol: impl Into<String>,
        signature: SignatureDef,
    ) -> Self {
        let mut def = Self::new(name, symbol, signature);
        def.flags.is_method = true;
        def
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackDef {
    pub name: String,
    pub signature: SignatureDef,
    pub deprecated: bool,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalDef {
    pub name: String,
    pub flags: SignalFlags,
    /// Index of the class-closure vfunc
    pub class_closure: Option<u16>,
    pub true_stops_emit: bool,
    pub signature: SignatureDef,
    pub deprecated: bool,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VFuncDef {
    pub name: String,
    pub flags: VFuncFlags,
    /// Index of the signal this vfunc is the class closure of
    pub signal: Option<u16>,
    /// Index of the method that invokes this vfunc
    pub invoker: Option<u16>,
    pub struct_offset: u16,
    pub signature: SignatureDef,
    pub annotations: Annotations,
}

// ============================================================================
// Members
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub flags: PropertyFlags,
    pub ty: TypeDef,
    pub deprecated: bool,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub flags: FieldFlags,
    /// Bit-field width, 0 for a regular field
    pub bits: u8,
    pub struct_offset: u16,
    pub ty: TypeDef,
    pub annotations: Annotations,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeDef, struct_offset: u16) -> Self {
        Self {
            name: name.into(),
            flags: FieldFlags {
                readable: true,
                writable: true,
            },
            ty,
            struct_offset,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueDef {
    pub name: String,
    pub value: i32,
    pub deprecated: bool,
    pub annotations: Annotations,
}

impl ValueDef {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
            ..Default::default()
        }
    }
}

/// Value of a constant
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Boolean(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Utf8(String),
}

impl Default for ConstantValue {
    fn default() -> Self {
        ConstantValue::Int32(0)
    }
}

impl ConstantValue {
    /// Tag of the type the value is stored as
    pub fn tag(&self) -> TypeTag {
        match self {
            ConstantValue::Boolean(_) => TypeTag::Boolean,
            ConstantValue::Int8(_) => TypeTag::Int8,
            ConstantValue::UInt8(_) => TypeTag::UInt8,
            ConstantValue::Int16(_) => TypeTag::Int16,
            ConstantValue::UInt16(_) => TypeTag::UInt16,
            ConstantValue::Int32(_) => TypeTag::Int32,
            ConstantValue::UInt32(_) => TypeTag::UInt32,
            ConstantValue::Int64(_) => TypeTag::Int64,
            ConstantValue::UInt64(_) => TypeTag::UInt64,
            ConstantValue::Float(_) => TypeTag::Float,
            ConstantValue::Double(_) => TypeTag::Double,
            ConstantValue::Utf8(_) => TypeTag::Utf8,
        }
    }

    /// Stored representation; booleans are 4 bytes, strings NUL terminated
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ConstantValue::Boolean(v) => i32::from(*v).to_le_bytes().to_vec(),
            ConstantValue::Int8(v) => v.to_le_bytes().to_vec(),
            ConstantValue::UInt8(v) => v.to_le_bytes().to_vec(),
            ConstantValue::Int16(v) => v.to_le_bytes().to_vec(),
            ConstantValue::UInt16(v) => v.to_le_bytes().to_vec(),
            ConstantValue::Int32(v) => v.to_le_bytes().to_vec(),
            ConstantValue::UInt32(v) => v.to_le_bytes().to_vec(),
            ConstantValue::Int64(v) => v.to_le_bytes().to_vec(),
            ConstantValue::UInt64(v) => v.to_le_bytes().to_vec(),
            ConstantValue::Float(v) => v.to_le_bytes().to_vec(),
            ConstantValue::Double(v) => v.to_le_bytes().to_vec(),
            ConstantValue::Utf8(v) => {
                let mut bytes = v.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantDef {
    pub name: String,
    pub value: ConstantValue,
    pub deprecated: bool,
    pub annotations: Annotations,
}

impl ConstantDef {
    pub fn new(name: impl Into<String>, value: ConstantValue) -> Self {
        Self {
            name: name.into(),
            value,
            ..Default::default()
        }
    }
}

// ============================================================================
// Top-level entries
// ============================================================================

/// Type-system registration of a type (`get_type` function and type name)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub type_name: String,
    pub type_init: String,
}

impl Registration {
    pub fn new(type_name: impl Into<String>, type_init: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            type_init: type_init.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub registration: Option<Registration>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<FunctionDef>,
    pub deprecated: bool,
    pub annotations: Annotations,
}

/// Discriminator of a discriminated union
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscriminatorDef {
    pub offset: i32,
    pub ty: TypeDef,
    /// One value per union field
    pub values: Vec<ConstantDef>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnionDef {
    pub name: String,
    pub registration: Option<Registration>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<FunctionDef>,
    pub discriminator: Option<DiscriminatorDef>,
    pub deprecated: bool,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub registration: Option<Registration>,
    /// Storage type; derived from the value range when unset
    pub storage_type: Option<TypeTag>,
    pub values: Vec<ValueDef>,
    pub methods: Vec<FunctionDef>,
    pub deprecated: bool,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDef {
    pub name: String,
    pub registration: Option<Registration>,
    pub parent: Option<String>,
    pub is_abstract: bool,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub properties: Vec<PropertyDef>,
    pub methods: Vec<FunctionDef>,
    pub signals: Vec<SignalDef>,
    pub vfuncs: Vec<VFuncDef>,
    pub constants: Vec<ConstantDef>,
    pub deprecated: bool,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceDef {
    pub name: String,
    pub registration: Option<Registration>,
    pub prerequisites: Vec<String>,
    pub properties: Vec<PropertyDef>,
    pub methods: Vec<FunctionDef>,
    pub signals: Vec<SignalDef>,
    pub vfuncs: Vec<VFuncDef>,
    pub constants: Vec<ConstantDef>,
    pub deprecated: bool,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDomainDef {
    pub name: String,
    /// Symbol of the quark function
    pub get_quark: String,
    /// Name of the enum listing the error codes
    pub codes: String,
    pub deprecated: bool,
    pub annotations: Annotations,
}

/// One top-level directory entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryDef {
    Function(FunctionDef),
    Callback(CallbackDef),
    Struct(StructDef),
    Boxed(StructDef),
    Union(UnionDef),
    Enum(EnumDef),
    Flags(EnumDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Constant(ConstantDef),
    ErrorDomain(ErrorDomainDef),
}

impl EntryDef {
    /// Entry name
    pub fn name(&self) -> &str {
        match self {
            EntryDef::Function(def) => &def.name,
            EntryDef::Callback(def) => &def.name,
            EntryDef::Struct(def) | EntryDef::Boxed(def) => &def.name,
            EntryDef::Union(def) => &def.name,
            EntryDef::Enum(def) | EntryDef::Flags(def) => &def.name,
            EntryDef::Object(def) => &def.name,
            EntryDef::Interface(def) => &def.name,
            EntryDef::Constant(def) => &def.name,
            EntryDef::ErrorDomain(def) => &def.name,
        }
    }

    /// Blob type written to the directory
    pub fn blob_type(&self) -> BlobType {
        match self {
            EntryDef::Function(_) => BlobType::Function,
            EntryDef::Callback(_) => BlobType::Callback,
            EntryDef::Struct(_) => BlobType::Struct,
            EntryDef::Boxed(_) => BlobType::Boxed,
            EntryDef::Union(_) => BlobType::Union,
            EntryDef::Enum(_) => BlobType::Enum,
            EntryDef::Flags(_) => BlobType::Flags,
            EntryDef::Object(_) => BlobType::Object,
            EntryDef::Interface(_) => BlobType::Interface,
            EntryDef::Constant(_) => BlobType::Constant,
            EntryDef::ErrorDomain(_) => BlobType::ErrorDomain,
        }
    }
}

macro_rules! impl_from_def {
    ($($def:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$def> for EntryDef {
                fn from(def: $def) -> Self {
                    EntryDef::$variant(def)
                }
            }
        )*
    };
}

impl_from_def! {
    FunctionDef => Function,
    CallbackDef => Callback,
    StructDef => Struct,
    UnionDef => Union,
    ObjectDef => Object,
    InterfaceDef => Interface,
    ConstantDef => Constant,
    ErrorDomainDef => ErrorDomain,
}
