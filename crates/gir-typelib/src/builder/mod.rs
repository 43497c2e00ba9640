//! Typelib builder
//!
//! Turns a node tree into typelib bytes. Top-level blobs are written first,
//! each immediately followed by its members in canonical order; signatures,
//! parametrized types and constant values are queued and appended after
//! them; the directory, annotation table and string table come last. Every
//! offset that is not known when a record is written is reserved and patched
//! once its target has been placed.

mod node;

pub use node::*;

use crate::blob::{
    self, arg, common, signal, signature, type_slot, vfunc, BlobType, TypeSlot, TypeTag,
};
use crate::header::{BlobSizes, Header, HEADER_SIZE, MAJOR_VERSION, MINOR_VERSION};
use crate::writer::BlobWriter;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while building a typelib
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A reference names no entry of this namespace
    #[error("Unknown reference '{0}'")]
    UnknownReference(String),

    /// Two entries share a name
    #[error("Duplicate entry '{0}'")]
    DuplicateEntry(String),

    /// A type descriptor cannot be encoded
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// A member group exceeds its 16-bit count
    #[error("Too many {what}: {count}")]
    TooMany {
        /// What overflowed
        what: &'static str,
        /// Number requested
        count: usize,
    },

    /// Discriminator values do not match the union's fields
    #[error("Union '{name}' has {fields} fields but {values} discriminator values")]
    DiscriminatorMismatch {
        /// Union name
        name: String,
        /// Number of fields
        fields: usize,
        /// Number of discriminator values
        values: usize,
    },

    /// A parametrized type landed beyond the 24-bit slot range
    #[error("Typelib too large: offset {0} does not fit a type slot")]
    TooLarge(usize),
}

fn count(what: &'static str, len: usize) -> Result<u16, BuildError> {
    u16::try_from(len).map_err(|_| BuildError::TooMany { what, count: len })
}

/// Builder of one namespace's typelib
#[derive(Debug, Clone, Default)]
pub struct TypelibBuilder {
    namespace: String,
    version: String,
    shared_library: Option<String>,
    dependencies: Vec<String>,
    entries: Vec<EntryDef>,
}

impl TypelibBuilder {
    /// Create a builder for `namespace` at `version`
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Set the shared libraries implementing the namespace (comma separated)
    pub fn shared_library(mut self, library: impl Into<String>) -> Self {
        self.shared_library = Some(library.into());
        self
    }

    /// Add a `Namespace-Version` dependency
    pub fn dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Append a top-level entry
    pub fn entry(mut self, entry: impl Into<EntryDef>) -> Self {
        self.entries.push(entry.into());
        self
    }

    /// Append a top-level entry in place
    pub fn push(&mut self, entry: impl Into<EntryDef>) -> &mut Self {
        self.entries.push(entry.into());
        self
    }

    /// Entries added so far
    pub fn entries(&self) -> &[EntryDef] {
        &self.entries
    }

    /// Encode the typelib
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        let mut emitter = Emitter::new(self)?;
        for entry in &self.entries {
            emitter.emit_entry(entry)?;
        }
        emitter.flush_pending()?;
        let bytes = emitter.finish(self)?;
        debug!(
            namespace = %self.namespace,
            entries = self.entries.len(),
            size = bytes.len(),
            "Built typelib"
        );
        Ok(bytes)
    }
}

// ============================================================================
// Emitter
// ============================================================================

enum Pending<'a> {
    Signature { site: usize, def: &'a SignatureDef },
    Type { site: usize, def: &'a TypeDef },
    Value { site: usize, bytes: Vec<u8> },
}

struct Emitter<'a> {
    namespace: &'a str,
    sizes: BlobSizes,
    writer: BlobWriter,
    local: FxHashMap<&'a str, u16>,
    local_offsets: Vec<u32>,
    non_local: Vec<(String, String)>,
    non_local_index: FxHashMap<(String, String), u16>,
    pending: VecDeque<Pending<'a>>,
    string_sites: Vec<(usize, &'a str)>,
    annotations: Vec<(u32, &'a str, &'a str)>,
}

impl<'a> Emitter<'a> {
    fn new(builder: &'a TypelibBuilder) -> Result<Self, BuildError> {
        let mut local = FxHashMap::default();
        for (i, entry) in builder.entries.iter().enumerate() {
            let index = count("entries", i + 1)?;
            if local.insert(entry.name(), index).is_some() {
                return Err(BuildError::DuplicateEntry(entry.name().to_owned()));
            }
        }
        let mut writer = BlobWriter::with_capacity(4096);
        writer.emit_zeros(HEADER_SIZE as usize);
        Ok(Self {
            namespace: &builder.namespace,
            sizes: BlobSizes::CURRENT,
            writer,
            local,
            local_offsets: Vec::with_capacity(builder.entries.len()),
            non_local: Vec::new(),
            non_local_index: FxHashMap::default(),
            pending: VecDeque::new(),
            string_sites: Vec::new(),
            annotations: Vec::new(),
        })
    }

    fn offset(&self) -> u32 {
        self.writer.offset() as u32
    }

    /// Directory index for a `Name` or `Namespace.Name` reference
    fn resolve(&mut self, reference: &str) -> Result<u16, BuildError> {
        match reference.split_once('.') {
            Some((namespace, name)) if namespace != self.namespace => {
                let key = (namespace.to_owned(), name.to_owned());
                if let Some(&index) = self.non_local_index.get(&key) {
                    return Ok(index);
                }
                let index = count("entries", self.local.len() + self.non_local.len() + 1)?;
                self.non_local.push(key.clone());
                self.non_local_index.insert(key, index);
                Ok(index)
            }
            Some((_, name)) => self.resolve_local(name),
            None => self.resolve_local(reference),
        }
    }

    fn resolve_local(&self, name: &str) -> Result<u16, BuildError> {
        self.local
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::UnknownReference(name.to_owned()))
    }

    fn string(&mut self, value: &'a str) {
        self.string_sites.push((self.writer.offset(), value));
        self.writer.emit_u32(0);
    }

    fn optional_string(&mut self, value: Option<&'a str>) {
        match value {
            Some(value) => self.string(value),
            None => self.writer.emit_u32(0),
        }
    }

    fn annotate(&mut self, owner: u32, annotations: &'a Annotations) {
        for (key, value) in annotations {
            self.annotations.push((owner, key.as_str(), value.as_str()));
        }
    }

    fn type_slot(&mut self, def: &'a TypeDef) -> Result<(), BuildError> {
        match def {
            TypeDef::Basic { tag, pointer } => {
                if !tag.is_basic() {
                    return Err(BuildError::InvalidType(format!(
                        "{tag} needs a parametrized descriptor"
                    )));
                }
                self.writer.emit_u32(TypeSlot::simple(*tag, *pointer));
            }
            _ => {
                self.pending.push_back(Pending::Type {
                    site: self.writer.offset(),
                    def,
                });
                self.writer.emit_u32(0);
            }
        }
        Ok(())
    }

    fn signature(&mut self, def: &'a SignatureDef) {
        self.pending.push_back(Pending::Signature {
            site: self.writer.offset(),
            def,
        });
        self.writer.emit_u32(0);
    }

    fn common_flags(deprecated: bool) -> u16 {
        if deprecated {
            common::DEPRECATED
        } else {
            0
        }
    }

    // ===== Top-level entries =====

    fn emit_entry(&mut self, entry: &'a EntryDef) -> Result<(), BuildError> {
        self.writer.align(4);
        self.local_offsets.push(self.offset());
        match entry {
            EntryDef::Function(def) => self.emit_function(def),
            EntryDef::Callback(def) => self.emit_callback(def),
            EntryDef::Struct(def) => self.emit_struct(BlobType::Struct, def),
            EntryDef::Boxed(def) => self.emit_struct(BlobType::Boxed, def),
            EntryDef::Union(def) => self.emit_union(def),
            EntryDef::Enum(def) => self.emit_enum(BlobType::Enum, def),
            EntryDef::Flags(def) => self.emit_enum(BlobType::Flags, def),
            EntryDef::Object(def) => self.emit_object(def),
            EntryDef::Interface(def) => self.emit_interface(def),
            EntryDef::Constant(def) => self.emit_constant(BlobType::Constant, def),
            EntryDef::ErrorDomain(def) => self.emit_error_domain(def),
        }
    }

    fn emit_registered_prefix(
        &mut self,
        blob_type: BlobType,
        extra_flags: u16,
        name: &'a str,
        registration: &'a Option<Registration>,
        deprecated: bool,
    ) {
        let mut flags = Self::common_flags(deprecated) | extra_flags;
        if registration.is_none() {
            flags |= blob::registered::UNREGISTERED;
        }
        self.writer.emit_u16(blob_type as u16);
        self.writer.emit_u16(flags);
        self.string(name);
        self.optional_string(registration.as_ref().map(|r| r.type_name.as_str()));
        self.optional_string(registration.as_ref().map(|r| r.type_init.as_str()));
    }

    fn emit_struct(&mut self, blob_type: BlobType, def: &'a StructDef) -> Result<(), BuildError> {
        let offset = self.offset();
        self.emit_registered_prefix(blob_type, 0, &def.name, &def.registration, def.deprecated);
        self.writer.emit_u16(count("fields", def.fields.len())?);
        self.writer.emit_u16(count("methods", def.methods.len())?);
        self.annotate(offset, &def.annotations);
        for field in &def.fields {
            self.emit_field(field)?;
        }
        for method in &def.methods {
            self.emit_function(method)?;
        }
        Ok(())
    }

    fn emit_union(&mut self, def: &'a UnionDef) -> Result<(), BuildError> {
        let offset = self.offset();
        let discriminated = if let Some(disc) = &def.discriminator {
            if disc.values.len() != def.fields.len() {
                return Err(BuildError::DiscriminatorMismatch {
                    name: def.name.clone(),
                    fields: def.fields.len(),
                    values: disc.values.len(),
                });
            }
            blob::union_blob::DISCRIMINATED
        } else {
            0
        };
        self.emit_registered_prefix(
            BlobType::Union,
            discriminated,
            &def.name,
            &def.registration,
            def.deprecated,
        );
        self.writer.emit_u16(count("fields", def.fields.len())?);
        self.writer.emit_u16(count("functions", def.methods.len())?);
        match &def.discriminator {
            Some(disc) => {
                self.writer.emit_i32(disc.offset);
                self.type_slot(&disc.ty)?;
            }
            None => {
                self.writer.emit_i32(0);
                self.writer.emit_u32(0);
            }
        }
        self.annotate(offset, &def.annotations);
        for field in &def.fields {
            self.emit_field(field)?;
        }
        for method in &def.methods {
            self.emit_function(method)?;
        }
        if let Some(disc) = &def.discriminator {
            for value in &disc.values {
                self.emit_constant(BlobType::Constant, value)?;
            }
        }
        Ok(())
    }

    fn emit_enum(&mut self, blob_type: BlobType, def: &'a EnumDef) -> Result<(), BuildError> {
        let offset = self.offset();
        self.emit_registered_prefix(blob_type, 0, &def.name, &def.registration, def.deprecated);
        self.writer.emit_u16(count("values", def.values.len())?);
        self.writer.emit_u16(count("methods", def.methods.len())?);
        let storage = def.storage_type.unwrap_or_else(|| {
            if def.values.iter().any(|v| v.value < 0) {
                TypeTag::Int32
            } else {
                TypeTag::UInt32
            }
        });
        self.writer.emit_u8(storage as u8);
        self.writer.emit_zeros(3);
        self.annotate(offset, &def.annotations);
        for value in &def.values {
            let value_offset = self.offset();
            self.writer.emit_u32(if value.deprecated {
                blob::value::DEPRECATED
            } else {
                0
            });
            self.string(&value.name);
            self.writer.emit_i32(value.value);
            self.annotate(value_offset, &value.annotations);
        }
        for method in &def.methods {
            self.emit_function(method)?;
        }
        Ok(())
    }

    fn emit_interface_refs(&mut self, names: &'a [String]) -> Result<(), BuildError> {
        for name in names {
            let index = self.resolve(name)?;
            self.writer.emit_u16(index);
        }
        if names.len() % 2 == 1 {
            self.writer.emit_u16(0);
        }
        Ok(())
    }

    fn emit_object(&mut self, def: &'a ObjectDef) -> Result<(), BuildError> {
        let offset = self.offset();
        let abstract_flag = if def.is_abstract {
            blob::object::ABSTRACT
        } else {
            0
        };
        self.emit_registered_prefix(
            BlobType::Object,
            abstract_flag,
            &def.name,
            &def.registration,
            def.deprecated,
        );
        let parent = match &def.parent {
            Some(parent) => self.resolve(parent)?,
            None => 0,
        };
        self.writer.emit_u16(parent);
        self.writer.emit_u16(count("interfaces", def.interfaces.len())?);
        self.writer.emit_u16(count("fields", def.fields.len())?);
        self.writer.emit_u16(count("properties", def.properties.len())?);
        self.writer.emit_u16(count("methods", def.methods.len())?);
        self.writer.emit_u16(count("signals", def.signals.len())?);
        self.writer.emit_u16(count("vfuncs", def.vfuncs.len())?);
        self.writer.emit_u16(count("constants", def.constants.len())?);
        self.writer.emit_zeros(4);
        self.annotate(offset, &def.annotations);

        self.emit_interface_refs(&def.interfaces)?;
        for field in &def.fields {
            self.emit_field(field)?;
        }
        self.emit_members(
            &def.properties,
            &def.methods,
            &def.signals,
            &def.vfuncs,
            &def.constants,
        )
    }

    fn emit_interface(&mut self, def: &'a InterfaceDef) -> Result<(), BuildError> {
        let offset = self.offset();
        self.emit_registered_prefix(
            BlobType::Interface,
            0,
            &def.name,
            &def.registration,
            def.deprecated,
        );
        self.writer.emit_u16(count("prerequisites", def.prerequisites.len())?);
        self.writer.emit_u16(count("properties", def.properties.len())?);
        self.writer.emit_u16(count("methods", def.methods.len())?);
        self.writer.emit_u16(count("signals", def.signals.len())?);
        self.writer.emit_u16(count("vfuncs", def.vfuncs.len())?);
        self.writer.emit_u16(count("constants", def.constants.len())?);
        self.writer.emit_zeros(4);
        self.annotate(offset, &def.annotations);

        self.emit_interface_refs(&def.prerequisites)?;
        self.emit_members(
            &def.properties,
            &def.methods,
            &def.signals,
            &def.vfuncs,
            &def.constants,
        )
    }

    fn emit_members(
        &mut self,
        properties: &'a [PropertyDef],
        methods: &'a [FunctionDef],
        signals: &'a [SignalDef],
        vfuncs: &'a [VFuncDef],
        constants: &'a [ConstantDef],
    ) -> Result<(), BuildError> {
        for property in properties {
            self.emit_property(property)?;
        }
        for method in methods {
            self.emit_function(method)?;
        }
        for signal in signals {
            self.emit_signal(signal);
        }
        for vfunc in vfuncs {
            self.emit_vfunc(vfunc);
        }
        for constant in constants {
            self.emit_constant(BlobType::Constant, constant)?;
        }
        Ok(())
    }

    fn emit_error_domain(&mut self, def: &'a ErrorDomainDef) -> Result<(), BuildError> {
        let offset = self.offset();
        self.writer.emit_u16(BlobType::ErrorDomain as u16);
        self.writer.emit_u16(Self::common_flags(def.deprecated));
        self.string(&def.name);
        self.string(&def.get_quark);
        let codes = self.resolve(&def.codes)?;
        self.writer.emit_u16(codes);
        self.writer.emit_u16(0);
        self.annotate(offset, &def.annotations);
        Ok(())
    }

    // ===== Members =====

    fn emit_function(&mut self, def: &'a FunctionDef) -> Result<(), BuildError> {
        let offset = self.offset();
        self.writer.emit_u16(BlobType::Function as u16);
        self.writer
            .emit_u16(def.flags.bits() | Self::common_flags(def.deprecated));
        self.string(&def.name);
        self.string(&def.symbol);
        self.signature(&def.signature);
        self.writer.emit_u16(def.index);
        self.writer.emit_u16(0);
        self.annotate(offset, &def.annotations);
        Ok(())
    }

    fn emit_callback(&mut self, def: &'a CallbackDef) -> Result<(), BuildError> {
        let offset = self.offset();
        self.writer.emit_u16(BlobType::Callback as u16);
        self.writer.emit_u16(Self::common_flags(def.deprecated));
        self.string(&def.name);
        self.signature(&def.signature);
        self.annotate(offset, &def.annotations);
        Ok(())
    }

    fn emit_signal(&mut self, def: &'a SignalDef) {
        let offset = self.offset();
        let mut flags = def.flags.bits();
        if def.deprecated {
            flags |= signal::DEPRECATED;
        }
        if def.class_closure.is_some() {
            flags |= signal::HAS_CLASS_CLOSURE;
        }
        if def.true_stops_emit {
            flags |= signal::TRUE_STOPS_EMIT;
        }
        self.writer.emit_u16(flags);
        self.writer.emit_u16(def.class_closure.unwrap_or(0));
        self.string(&def.name);
        self.signature(&def.signature);
        self.annotate(offset, &def.annotations);
    }

    fn emit_vfunc(&mut self, def: &'a VFuncDef) {
        let offset = self.offset();
        let mut flags = def.flags.bits();
        if def.signal.is_some() {
            flags |= vfunc::CLASS_CLOSURE;
        }
        self.string(&def.name);
        self.writer.emit_u16(flags);
        self.writer.emit_u16(def.signal.unwrap_or(0));
        self.writer.emit_u16(def.struct_offset);
        self.writer.emit_u16(def.invoker.unwrap_or(vfunc::NO_INVOKER));
        self.signature(&def.signature);
        self.annotate(offset, &def.annotations);
    }

    fn emit_property(&mut self, def: &'a PropertyDef) -> Result<(), BuildError> {
        let offset = self.offset();
        let mut flags = def.flags.bits();
        if def.deprecated {
            flags |= blob::property::DEPRECATED;
        }
        self.string(&def.name);
        self.writer.emit_u32(flags);
        self.type_slot(&def.ty)?;
        self.annotate(offset, &def.annotations);
        Ok(())
    }

    fn emit_field(&mut self, def: &'a FieldDef) -> Result<(), BuildError> {
        let offset = self.offset();
        self.string(&def.name);
        self.writer.emit_u8(def.flags.bits());
        self.writer.emit_u8(def.bits);
        self.writer.emit_u16(def.struct_offset);
        self.type_slot(&def.ty)?;
        self.annotate(offset, &def.annotations);
        Ok(())
    }

    fn emit_constant(&mut self, blob_type: BlobType, def: &'a ConstantDef) -> Result<(), BuildError> {
        let offset = self.offset();
        let bytes = def.value.to_bytes();
        self.writer.emit_u16(blob_type as u16);
        self.writer.emit_u16(Self::common_flags(def.deprecated));
        self.string(&def.name);
        self.writer.emit_u32(TypeSlot::simple(
            def.value.tag(),
            def.value.tag() == TypeTag::Utf8,
        ));
        self.writer.emit_u32(bytes.len() as u32);
        self.pending.push_back(Pending::Value {
            site: self.writer.offset(),
            bytes,
        });
        self.writer.emit_u32(0);
        self.annotate(offset, &def.annotations);
        Ok(())
    }

    // ===== Deferred data =====

    fn flush_pending(&mut self) -> Result<(), BuildError> {
        while let Some(pending) = self.pending.pop_front() {
            self.writer.align(4);
            let offset = self.offset();
            match pending {
                Pending::Signature { site, def } => {
                    self.emit_signature_blob(def)?;
                    self.writer.patch_u32_at(site, offset);
                }
                Pending::Type { site, def } => {
                    if offset & type_slot::OFFSET_MASK != offset {
                        return Err(BuildError::TooLarge(offset as usize));
                    }
                    self.emit_type_blob(def)?;
                    self.writer.patch_u32_at(site, offset);
                }
                Pending::Value { site, bytes } => {
                    self.writer.emit_bytes(&bytes);
                    self.writer.patch_u32_at(site, offset);
                }
            }
        }
        Ok(())
    }

    fn emit_signature_blob(&mut self, def: &'a SignatureDef) -> Result<(), BuildError> {
        self.type_slot(&def.return_type)?;
        let mut flags = 0;
        if def.may_return_null {
            flags |= signature::MAY_RETURN_NULL;
        }
        match def.return_transfer {
            blob::Transfer::Everything => flags |= signature::CALLER_OWNS_RETURN_VALUE,
            blob::Transfer::Container => flags |= signature::CALLER_OWNS_RETURN_CONTAINER,
            blob::Transfer::Nothing => {}
        }
        self.writer.emit_u16(flags);
        self.writer.emit_u16(count("arguments", def.args.len())?);
        for arg_def in &def.args {
            let offset = self.offset();
            let mut flags = arg_def.direction.arg_flags();
            for (set, bit) in [
                (arg_def.caller_allocates, arg::CALLER_ALLOCATES),
                (arg_def.optional, arg::OPTIONAL),
                (arg_def.may_be_null, arg::NULL_OK),
                (arg_def.is_return_value, arg::RETURN_VALUE),
            ] {
                if set {
                    flags |= bit;
                }
            }
            match arg_def.transfer {
                blob::Transfer::Everything => flags |= arg::TRANSFER_OWNERSHIP,
                blob::Transfer::Container => flags |= arg::TRANSFER_CONTAINER,
                blob::Transfer::Nothing => {}
            }
            self.string(&arg_def.name);
            self.writer.emit_u32(flags);
            self.type_slot(&arg_def.ty)?;
            self.annotate(offset, &arg_def.annotations);
        }
        Ok(())
    }

    fn emit_type_blob(&mut self, def: &'a TypeDef) -> Result<(), BuildError> {
        let head = |tag: TypeTag, pointer: bool| -> u8 {
            let mut byte = (tag as u8) << type_slot::PARAM_TAG_SHIFT;
            if pointer {
                byte |= type_slot::PARAM_POINTER;
            }
            byte
        };
        match def {
            TypeDef::Basic { tag, .. } => {
                return Err(BuildError::InvalidType(format!(
                    "{tag} cannot be parametrized"
                )));
            }
            TypeDef::Array {
                element,
                length,
                zero_terminated,
            } => {
                let mut flags = 0;
                if *zero_terminated {
                    flags |= type_slot::ZERO_TERMINATED;
                }
                let length = match length {
                    ArrayLength::None => 0,
                    ArrayLength::Argument(index) => {
                        flags |= type_slot::HAS_LENGTH;
                        *index
                    }
                    ArrayLength::Fixed(size) => {
                        flags |= type_slot::HAS_SIZE;
                        *size
                    }
                };
                self.writer.emit_u8(head(TypeTag::Array, true));
                self.writer.emit_u8(flags);
                self.writer.emit_u16(length);
                self.type_slot(element)?;
            }
            TypeDef::List { tag, element } => {
                if !matches!(tag, TypeTag::GList | TypeTag::GSList) {
                    return Err(BuildError::InvalidType(format!("{tag} is not a list")));
                }
                self.writer.emit_u8(head(*tag, true));
                self.writer.emit_u8(0);
                self.writer.emit_u16(1);
                self.type_slot(element)?;
            }
            TypeDef::Hash { key, value } => {
                self.writer.emit_u8(head(TypeTag::GHash, true));
                self.writer.emit_u8(0);
                self.writer.emit_u16(2);
                self.type_slot(key)?;
                self.type_slot(value)?;
            }
            TypeDef::Interface { name, pointer } => {
                let index = self.resolve(name)?;
                self.writer.emit_u8(head(TypeTag::Interface, *pointer));
                self.writer.emit_u8(0);
                self.writer.emit_u16(index);
            }
            TypeDef::Error { domains } => {
                self.writer.emit_u8(head(TypeTag::Error, true));
                self.writer.emit_u8(0);
                self.writer.emit_u16(count("error domains", domains.len())?);
                for domain in domains {
                    let index = self.resolve(domain)?;
                    self.writer.emit_u16(index);
                }
            }
        }
        Ok(())
    }

    // ===== Tables =====

    fn finish(mut self, builder: &'a TypelibBuilder) -> Result<Vec<u8>, BuildError> {
        // Directory
        self.writer.align(4);
        let directory = self.offset();
        let local_offsets = std::mem::take(&mut self.local_offsets);
        for (entry, offset) in builder.entries.iter().zip(local_offsets) {
            self.writer.emit_u16(entry.blob_type() as u16);
            self.writer.emit_u16(blob::entry::LOCAL);
            self.string(entry.name());
            self.writer.emit_u32(offset);
        }
        let non_local = std::mem::take(&mut self.non_local);
        let mut non_local_sites = Vec::with_capacity(non_local.len());
        for _ in &non_local {
            // Blob type of a foreign entry is not known here
            self.writer.emit_u16(BlobType::Invalid as u16);
            self.writer.emit_u16(0);
            let name_site = self.writer.offset();
            self.writer.emit_u32(0);
            let namespace_site = self.writer.offset();
            self.writer.emit_u32(0);
            non_local_sites.push((name_site, namespace_site));
        }
        let n_entries = count("entries", builder.entries.len() + non_local.len())?;
        let n_local_entries = count("entries", builder.entries.len())?;

        // Annotations, sorted by owner descending; stable within an owner
        let mut annotations = std::mem::take(&mut self.annotations);
        annotations.sort_by(|a, b| b.0.cmp(&a.0));
        let annotation_table = self.offset();
        for &(owner, key, value) in &annotations {
            self.writer.emit_u32(owner);
            self.string(key);
            self.string(value);
        }

        // Strings
        let dependencies = builder.dependencies.join("|");
        let mut interned: FxHashMap<String, u32> = FxHashMap::default();
        let mut intern = |writer: &mut BlobWriter, value: &str| -> u32 {
            if let Some(&offset) = interned.get(value) {
                return offset;
            }
            let offset = writer.offset() as u32;
            writer.emit_cstr(value);
            interned.insert(value.to_owned(), offset);
            offset
        };
        let namespace = intern(&mut self.writer, &builder.namespace);
        let nsversion = intern(&mut self.writer, &builder.version);
        let shared_library = match &builder.shared_library {
            Some(library) => intern(&mut self.writer, library),
            None => 0,
        };
        let dependencies = if dependencies.is_empty() {
            0
        } else {
            intern(&mut self.writer, &dependencies)
        };
        for ((namespace_name, name), (name_site, namespace_site)) in
            non_local.iter().zip(non_local_sites)
        {
            let name_offset = intern(&mut self.writer, name);
            let namespace_offset = intern(&mut self.writer, namespace_name);
            self.writer.patch_u32_at(name_site, name_offset);
            self.writer.patch_u32_at(namespace_site, namespace_offset);
        }
        for (site, value) in std::mem::take(&mut self.string_sites) {
            let offset = intern(&mut self.writer, value);
            self.writer.patch_u32_at(site, offset);
        }
        self.writer.align(4);

        let header = Header {
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            n_entries,
            n_local_entries,
            directory,
            n_annotations: annotations.len() as u32,
            annotations: annotation_table,
            dependencies,
            size: self.offset(),
            namespace,
            nsversion,
            shared_library,
            sizes: self.sizes,
        };
        let mut header_writer = BlobWriter::with_capacity(HEADER_SIZE as usize);
        header.write(&mut header_writer);
        let mut bytes = self.writer.into_bytes();
        bytes[..HEADER_SIZE as usize].copy_from_slice(header_writer.buffer());
        Ok(bytes)
    }
}
