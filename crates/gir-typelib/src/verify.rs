//! Structural verification of typelibs
//!
//! Walks every directory entry and the records reachable from it, checking
//! that offsets stay inside the buffer, blob types match the directory,
//! names resolve, type descriptors decode and the annotation table is
//! ordered. A typelib that passes can be navigated without hitting a
//! format error.

use crate::blob::{
    self, callback, common, constant, function, signal, signature, type_slot, vfunc, BlobType,
    TypeSlot, TypeTag,
};
use crate::layout::{ContainerKind, ContainerLayout, MemberGroup};
use crate::reader::{element_offset, offset_add, ReadError};
use crate::{Typelib, TypelibError};
use thiserror::Error;
use tracing::debug;

/// Parametrized types nest at most this deep
const MAX_TYPE_DEPTH: u32 = 16;

/// Verification errors
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Header or directory error
    #[error(transparent)]
    Typelib(#[from] TypelibError),

    /// Out-of-bounds or malformed read
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Blob at a directory offset has a different type than the entry
    #[error("Entry {index}: directory says {expected} but blob has type {found}")]
    BlobTypeMismatch {
        /// 1-based directory index
        index: u16,
        /// Type in the directory
        expected: BlobType,
        /// Raw type at the blob
        found: u16,
    },

    /// Entry with an empty name
    #[error("Entry {0} has an empty name")]
    EmptyName(u16),

    /// Record extends beyond the typelib
    #[error("Record at offset {offset} of {len} bytes extends beyond typelib of {size} bytes")]
    RecordOutOfBounds {
        /// Record offset
        offset: u32,
        /// Record length
        len: u32,
        /// Typelib size
        size: u32,
    },

    /// Invalid type tag in a slot or parametrized blob
    #[error("Invalid type tag {tag} at offset {offset}")]
    InvalidTypeTag {
        /// Raw tag
        tag: u8,
        /// Offset of the slot or blob
        offset: u32,
    },

    /// Parametrized type with the wrong number of parameters
    #[error("Type at offset {offset} has {found} parameter types, expected {expected}")]
    ParamCount {
        /// Offset of the blob
        offset: u32,
        /// Expected count
        expected: u16,
        /// Actual count
        found: u16,
    },

    /// Directory index outside the directory
    #[error("Directory index {index} at offset {offset} out of range (1..={count})")]
    InvalidIndex {
        /// Offset the index was read from
        offset: u32,
        /// Index found
        index: u16,
        /// Number of entries
        count: u16,
    },

    /// Type descriptors nest too deeply (or form a cycle)
    #[error("Type at offset {0} nests too deeply")]
    TypeTooDeep(u32),

    /// Annotation table is not sorted by owner, descending
    #[error("Annotation {0} is out of order")]
    AnnotationsUnsorted(u32),
}

/// Verify a typelib
pub fn verify_typelib(typelib: &Typelib) -> Result<(), VerifyError> {
    let verifier = Verifier { typelib };
    for index in 1..=typelib.n_entries() {
        verifier.verify_entry(index)?;
    }
    verifier.verify_annotations()?;
    debug!(namespace = %typelib.namespace(), "Typelib verified");
    Ok(())
}

struct Verifier<'a> {
    typelib: &'a Typelib,
}

impl Verifier<'_> {
    fn size(&self) -> u32 {
        self.typelib.header().size
    }

    fn check_record(&self, offset: u32, len: u16) -> Result<(), VerifyError> {
        let len = u32::from(len);
        match offset.checked_add(len) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(VerifyError::RecordOutOfBounds {
                offset,
                len,
                size: self.size(),
            }),
        }
    }

    fn check_index(&self, offset: u32, index: u16) -> Result<(), VerifyError> {
        let count = self.typelib.n_entries();
        if index == 0 || index > count {
            return Err(VerifyError::InvalidIndex {
                offset,
                index,
                count,
            });
        }
        Ok(())
    }

    fn verify_entry(&self, index: u16) -> Result<(), VerifyError> {
        let entry = self.typelib.dir_entry(index)?;
        if entry.name(self.typelib)?.is_empty() {
            return Err(VerifyError::EmptyName(index));
        }
        if !entry.local {
            entry.namespace(self.typelib)?;
            return Ok(());
        }

        let found = self.typelib.u16_field(entry.offset, common::BLOB_TYPE)?;
        if found != entry.blob_type as u16 {
            return Err(VerifyError::BlobTypeMismatch {
                index,
                expected: entry.blob_type,
                found,
            });
        }

        let sizes = &self.typelib.header().sizes;
        match entry.blob_type {
            BlobType::Function => self.verify_function(entry.offset),
            BlobType::Callback => {
                self.check_record(entry.offset, sizes.callback)?;
                self.verify_signature(self.typelib.u32_field(entry.offset, callback::SIGNATURE)?)
            }
            BlobType::Constant => self.verify_constant(entry.offset),
            BlobType::ErrorDomain => {
                self.check_record(entry.offset, sizes.error_domain)?;
                self.typelib
                    .string(self.typelib.u32_field(entry.offset, blob::error_domain::GET_QUARK)?)?;
                let codes = self.typelib.u16_field(entry.offset, blob::error_domain::ERROR_CODES)?;
                let at = offset_add(entry.offset, blob::error_domain::ERROR_CODES)?;
                self.check_index(at, codes)
            }
            BlobType::Invalid => Err(VerifyError::BlobTypeMismatch {
                index,
                expected: entry.blob_type,
                found,
            }),
            container => match ContainerKind::from_blob_type(container) {
                Some(kind) => self.verify_container(kind, entry.offset),
                None => Ok(()),
            },
        }
    }

    fn verify_container(&self, kind: ContainerKind, offset: u32) -> Result<(), VerifyError> {
        let layout = ContainerLayout::read(self.typelib, kind, offset)?;
        let end = layout.end()?;
        if end > self.size() {
            return Err(VerifyError::RecordOutOfBounds {
                offset,
                len: end - offset,
                size: self.size(),
            });
        }
        let tl = self.typelib;
        tl.optional_string(tl.u32_field(offset, blob::registered::GTYPE_NAME)?)?;
        tl.optional_string(tl.u32_field(offset, blob::registered::GTYPE_INIT)?)?;

        if kind == ContainerKind::Object {
            let parent = tl.u16_field(offset, blob::object::PARENT)?;
            if parent != 0 {
                self.check_index(offset_add(offset, blob::object::PARENT)?, parent)?;
            }
        }
        if kind == ContainerKind::Union
            && tl.u16_field(offset, common::FLAGS)? & blob::union_blob::DISCRIMINATED != 0
        {
            let slot = offset_add(offset, blob::union_blob::DISCRIMINATOR_TYPE)?;
            self.verify_type_slot(slot, 0)?;
        }

        for span in layout.spans() {
            for i in 0..span.count {
                let member = layout.member_offset(span.group, i)?;
                match span.group {
                    MemberGroup::Interfaces | MemberGroup::Prerequisites => {
                        self.check_index(member, tl.u16_at(member)?)?;
                    }
                    MemberGroup::Fields => {
                        tl.string(tl.u32_field(member, blob::field::NAME)?)?;
                        self.verify_type_slot(offset_add(member, blob::field::TYPE)?, 0)?;
                    }
                    MemberGroup::Properties => {
                        tl.string(tl.u32_field(member, blob::property::NAME)?)?;
                        self.verify_type_slot(offset_add(member, blob::property::TYPE)?, 0)?;
                    }
                    MemberGroup::Methods => self.verify_function(member)?,
                    MemberGroup::Signals => {
                        tl.string(tl.u32_field(member, signal::NAME)?)?;
                        self.verify_signature(tl.u32_field(member, signal::SIGNATURE)?)?;
                    }
                    MemberGroup::VFuncs => {
                        tl.string(tl.u32_field(member, vfunc::NAME)?)?;
                        self.verify_signature(tl.u32_field(member, vfunc::SIGNATURE)?)?;
                    }
                    MemberGroup::Constants | MemberGroup::Discriminators => {
                        self.verify_constant(member)?;
                    }
                    MemberGroup::Values => {
                        tl.string(tl.u32_field(member, blob::value::NAME)?)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn verify_function(&self, offset: u32) -> Result<(), VerifyError> {
        self.check_record(offset, self.typelib.header().sizes.function)?;
        let tl = self.typelib;
        tl.string(tl.u32_field(offset, common::NAME)?)?;
        tl.string(tl.u32_field(offset, function::SYMBOL)?)?;
        self.verify_signature(tl.u32_field(offset, function::SIGNATURE)?)
    }

    fn verify_constant(&self, offset: u32) -> Result<(), VerifyError> {
        self.check_record(offset, self.typelib.header().sizes.constant)?;
        let tl = self.typelib;
        tl.string(tl.u32_field(offset, common::NAME)?)?;
        self.verify_type_slot(offset_add(offset, constant::TYPE)?, 0)?;
        let size = tl.u32_field(offset, constant::SIZE)?;
        let value = tl.u32_field(offset, constant::OFFSET)?;
        tl.bytes_at(value, size)?;
        Ok(())
    }

    fn verify_signature(&self, offset: u32) -> Result<(), VerifyError> {
        let sizes = &self.typelib.header().sizes;
        self.check_record(offset, sizes.signature)?;
        self.verify_type_slot(offset_add(offset, signature::RETURN_TYPE)?, 0)?;
        let n_args = u32::from(self.typelib.u16_field(offset, signature::N_ARGUMENTS)?);
        let first = offset_add(offset, u32::from(sizes.signature))?;
        for i in 0..n_args {
            let arg = element_offset(first, i, u32::from(sizes.arg))?;
            self.check_record(arg, sizes.arg)?;
            self.typelib
                .string(self.typelib.u32_field(arg, blob::arg::NAME)?)?;
            self.verify_type_slot(offset_add(arg, blob::arg::TYPE)?, 0)?;
        }
        Ok(())
    }

    /// Verify the type slot stored at `slot`
    fn verify_type_slot(&self, slot: u32, depth: u32) -> Result<(), VerifyError> {
        if depth > MAX_TYPE_DEPTH {
            return Err(VerifyError::TypeTooDeep(slot));
        }
        let tl = self.typelib;
        match TypeSlot::decode(tl.u32_at(slot)?) {
            TypeSlot::Simple { tag, .. } => match TypeTag::from_u8(tag) {
                Some(t) if t.is_basic() => Ok(()),
                _ => Err(VerifyError::InvalidTypeTag { tag, offset: slot }),
            },
            TypeSlot::Param(offset) => {
                let raw = tl.u8_at(offset)? >> type_slot::PARAM_TAG_SHIFT;
                let tag = TypeTag::from_u8(raw)
                    .ok_or(VerifyError::InvalidTypeTag { tag: raw, offset })?;
                match tag {
                    TypeTag::Array => {
                        let element = offset_add(offset, type_slot::ARRAY_ELEMENT)?;
                        self.verify_type_slot(element, depth + 1)
                    }
                    TypeTag::GList | TypeTag::GSList | TypeTag::GHash => {
                        let expected = if tag == TypeTag::GHash { 2 } else { 1 };
                        let found = tl.u16_field(offset, type_slot::N_TYPES)?;
                        if found != expected {
                            return Err(VerifyError::ParamCount {
                                offset,
                                expected,
                                found,
                            });
                        }
                        for i in 0..u32::from(found) {
                            let param = type_slot::PARAM_TYPES + i * type_slot::SLOT_SIZE;
                            self.verify_type_slot(offset_add(offset, param)?, depth + 1)?;
                        }
                        Ok(())
                    }
                    TypeTag::Interface => {
                        let index = tl.u16_field(offset, type_slot::INTERFACE)?;
                        self.check_index(offset_add(offset, type_slot::INTERFACE)?, index)
                    }
                    TypeTag::Error => {
                        let n = u32::from(tl.u16_field(offset, type_slot::N_DOMAINS)?);
                        for i in 0..n {
                            let at = offset_add(offset, type_slot::DOMAINS + i * 2)?;
                            self.check_index(at, tl.u16_at(at)?)?;
                        }
                        Ok(())
                    }
                    _ => Err(VerifyError::InvalidTypeTag { tag: raw, offset }),
                }
            }
        }
    }

    fn verify_annotations(&self) -> Result<(), VerifyError> {
        let header = self.typelib.header();
        let record = u32::from(header.sizes.annotation);
        let mut previous = None;
        for i in 0..header.n_annotations {
            let offset = element_offset(header.annotations, i, record)?;
            self.check_record(offset, header.sizes.annotation)?;
            let owner = self.typelib.u32_field(offset, blob::annotation::OWNER)?;
            self.typelib
                .string(self.typelib.u32_field(offset, blob::annotation::NAME)?)?;
            self.typelib
                .string(self.typelib.u32_field(offset, blob::annotation::VALUE)?)?;
            if previous.is_some_and(|prev| owner > prev) {
                return Err(VerifyError::AnnotationsUnsorted(i));
            }
            previous = Some(owner);
        }
        Ok(())
    }
}
