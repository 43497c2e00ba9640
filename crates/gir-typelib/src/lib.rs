//! Typelib binary metadata format
//!
//! A typelib describes the types, functions, signals and properties of one
//! namespace of a native library as a single pointer-free buffer. Records
//! ("blobs") refer to each other only through byte offsets and 1-based
//! directory indices, so the buffer can be mapped or shared as-is.
//!
//! This crate provides the layout constants, a bounds-checked reader, the
//! container member arithmetic, annotation lookup, a structural verifier and
//! a builder that writes typelibs from an in-memory node tree.

#![warn(rust_2018_idioms)]

pub mod annotations;
pub mod blob;
pub mod builder;
pub mod header;
pub mod layout;
pub mod reader;
pub mod typelib;
pub mod verify;
pub mod writer;

pub use annotations::Annotation;
pub use blob::{
    BlobType, Direction, FieldFlags, FunctionFlags, PropertyFlags, SignalFlags, Transfer,
    TypeSlot, TypeTag, VFuncFlags,
};
pub use builder::{BuildError, TypelibBuilder};
pub use header::{BlobSizes, Header, HEADER_SIZE};
pub use layout::{ContainerKind, ContainerLayout, MemberGroup};
pub use reader::{element_offset, offset_add, BlobReader, ReadError};
pub use typelib::{DirEntry, Typelib, TypelibError};
pub use verify::{verify_typelib, VerifyError};
pub use writer::BlobWriter;
