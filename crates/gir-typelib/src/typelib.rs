//! Loaded typelib buffer
//!
//! A [`Typelib`] owns one immutable metadata buffer and its parsed header.
//! It is cheap to clone (reference counted) and safe to share between
//! threads; nothing ever writes to the bytes after load.

use crate::blob::{entry, BlobType};
use crate::header::{Header, HEADER_SIZE};
use crate::layout::MemberGroup;
use crate::reader::{element_offset, offset_add, BlobReader, ReadError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading or navigating a typelib
#[derive(Debug, Error)]
pub enum TypelibError {
    /// Out-of-bounds or malformed read
    #[error(transparent)]
    Read(#[from] ReadError),

    /// IO error while reading a typelib file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffer does not start with the typelib magic
    #[error("Invalid magic number")]
    InvalidMagic,

    /// Unsupported format version
    #[error("Unsupported typelib version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found
        major: u8,
        /// Minor version found
        minor: u8,
    },

    /// Buffer is shorter than the header claims
    #[error("Typelib truncated: header declares {declared} bytes, buffer has {actual}")]
    Truncated {
        /// Size declared by the header
        declared: u32,
        /// Actual buffer length
        actual: usize,
    },

    /// A blob record size in the header is below what this reader needs
    #[error("Header declares {blob} blob size {found}, at least {required} required")]
    BlobSizeTooSmall {
        /// Blob kind
        blob: &'static str,
        /// Size in the header
        found: u16,
        /// Minimum accepted size
        required: u16,
    },

    /// Directory counts are inconsistent
    #[error("Directory has {n_local_entries} local entries but only {n_entries} entries")]
    InvalidDirectory {
        /// Total entries
        n_entries: u16,
        /// Local entries
        n_local_entries: u16,
    },

    /// Directory index outside `1..=n_entries`
    #[error("Directory index {index} out of range (1..={count})")]
    DirectoryIndexOutOfRange {
        /// Requested 1-based index
        index: u16,
        /// Number of entries
        count: u16,
    },

    /// Unknown blob type code
    #[error("Invalid blob type {value} at offset {offset}")]
    InvalidBlobType {
        /// Raw value
        value: u16,
        /// Offset the value was read from
        offset: u32,
    },

    /// Unknown type tag
    #[error("Invalid type tag {value} at offset {offset}")]
    InvalidTypeTag {
        /// Raw value
        value: u8,
        /// Offset of the type slot or blob
        offset: u32,
    },

    /// Blob offset outside the typelib
    #[error("Blob offset {offset} outside typelib of {size} bytes")]
    InvalidOffset {
        /// Offending offset
        offset: u32,
        /// Declared typelib size
        size: u32,
    },

    /// Member index outside its group
    #[error("Index {index} out of range for {group} (count {count})")]
    MemberIndexOutOfRange {
        /// Member group
        group: MemberGroup,
        /// Requested index
        index: u32,
        /// Number of members in the group
        count: u32,
    },

    /// Container has no such member group
    #[error("Container has no {0}")]
    NoSuchGroup(MemberGroup),
}

/// One directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// 1-based directory index
    pub index: u16,
    pub blob_type: BlobType,
    /// Whether the entry is defined in this typelib
    pub local: bool,
    /// Name string offset
    pub name: u32,
    /// Blob offset when local, namespace string offset otherwise
    pub offset: u32,
}

impl DirEntry {
    /// Entry name
    pub fn name<'a>(&self, typelib: &'a Typelib) -> Result<&'a str, ReadError> {
        typelib.string(self.name)
    }

    /// Namespace the entry lives in
    pub fn namespace<'a>(&self, typelib: &'a Typelib) -> Result<&'a str, ReadError> {
        if self.local {
            Ok(typelib.namespace())
        } else {
            typelib.string(self.offset)
        }
    }
}

struct TypelibInner {
    data: Box<[u8]>,
    header: Header,
    namespace: String,
    nsversion: String,
}

/// Shared, immutable typelib buffer
#[derive(Clone)]
pub struct Typelib {
    inner: Arc<TypelibInner>,
}

impl Typelib {
    /// Validate the header and take ownership of `data`
    pub fn new(data: Vec<u8>) -> Result<Self, TypelibError> {
        let header = Header::parse(&data)?;
        let reader = BlobReader::new(&data);
        let namespace = reader.cstr_at(header.namespace as usize)?.to_owned();
        let nsversion = reader.cstr_at(header.nsversion as usize)?.to_owned();
        debug!(
            namespace = %namespace,
            version = %nsversion,
            entries = header.n_entries,
            size = header.size,
            "Loaded typelib"
        );
        Ok(Self {
            inner: Arc::new(TypelibInner {
                data: data.into_boxed_slice(),
                header,
                namespace,
                nsversion,
            }),
        })
    }

    /// Read and load a typelib file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TypelibError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading typelib file");
        Self::new(std::fs::read(path)?)
    }

    /// Parsed header
    pub fn header(&self) -> &Header {
        &self.inner.header
    }

    /// Raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.inner.data
    }

    /// Reader over the raw bytes
    pub fn reader(&self) -> BlobReader<'_> {
        BlobReader::new(&self.inner.data)
    }

    /// Whether two handles share the same buffer
    pub fn ptr_eq(&self, other: &Typelib) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ===== Reads =====

    /// Read a byte at `offset`
    pub fn u8_at(&self, offset: u32) -> Result<u8, ReadError> {
        self.reader().u8_at(offset as usize)
    }

    /// Read a u16 at `offset`
    pub fn u16_at(&self, offset: u32) -> Result<u16, ReadError> {
        self.reader().u16_at(offset as usize)
    }

    /// Read a u32 at `offset`
    pub fn u32_at(&self, offset: u32) -> Result<u32, ReadError> {
        self.reader().u32_at(offset as usize)
    }

    /// Read an i32 at `offset`
    pub fn i32_at(&self, offset: u32) -> Result<i32, ReadError> {
        self.reader().i32_at(offset as usize)
    }

    /// Read the byte at `field` of the record at `base`
    pub fn u8_field(&self, base: u32, field: u32) -> Result<u8, ReadError> {
        self.u8_at(offset_add(base, field)?)
    }

    /// Read the u16 at `field` of the record at `base`
    pub fn u16_field(&self, base: u32, field: u32) -> Result<u16, ReadError> {
        self.u16_at(offset_add(base, field)?)
    }

    /// Read the u32 at `field` of the record at `base`
    pub fn u32_field(&self, base: u32, field: u32) -> Result<u32, ReadError> {
        self.u32_at(offset_add(base, field)?)
    }

    /// Read the i32 at `field` of the record at `base`
    pub fn i32_field(&self, base: u32, field: u32) -> Result<i32, ReadError> {
        self.i32_at(offset_add(base, field)?)
    }

    /// Borrow `len` bytes at `offset`
    pub fn bytes_at(&self, offset: u32, len: u32) -> Result<&[u8], ReadError> {
        self.reader().bytes_at(offset as usize, len as usize)
    }

    /// String at a string-table offset
    pub fn string(&self, offset: u32) -> Result<&str, ReadError> {
        self.reader().cstr_at(offset as usize)
    }

    /// String at `offset`, or `None` when the offset is 0
    pub fn optional_string(&self, offset: u32) -> Result<Option<&str>, ReadError> {
        if offset == 0 {
            Ok(None)
        } else {
            self.string(offset).map(Some)
        }
    }

    // ===== Namespace =====

    /// Namespace described by this typelib
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Namespace version
    pub fn nsversion(&self) -> &str {
        &self.inner.nsversion
    }

    /// Shared libraries implementing the namespace, comma separated
    pub fn shared_library(&self) -> Result<Option<&str>, ReadError> {
        self.optional_string(self.header().shared_library)
    }

    /// `Namespace-Version` strings this typelib depends on
    pub fn dependencies(&self) -> Result<Vec<&str>, ReadError> {
        Ok(self
            .optional_string(self.header().dependencies)?
            .map(|deps| deps.split('|').filter(|dep| !dep.is_empty()).collect())
            .unwrap_or_default())
    }

    // ===== Directory =====

    /// Total number of directory entries
    pub fn n_entries(&self) -> u16 {
        self.header().n_entries
    }

    /// Number of entries defined in this typelib
    pub fn n_local_entries(&self) -> u16 {
        self.header().n_local_entries
    }

    /// Directory entry by 1-based index
    pub fn dir_entry(&self, index: u16) -> Result<DirEntry, TypelibError> {
        let header = self.header();
        if index == 0 || index > header.n_entries {
            return Err(TypelibError::DirectoryIndexOutOfRange {
                index,
                count: header.n_entries,
            });
        }
        let base = element_offset(
            header.directory,
            u32::from(index - 1),
            u32::from(header.sizes.entry),
        )?;
        let raw_type = self.u16_field(base, entry::BLOB_TYPE)?;
        let blob_type = BlobType::from_u16(raw_type).ok_or(TypelibError::InvalidBlobType {
            value: raw_type,
            offset: base,
        })?;
        let local = self.u16_field(base, entry::FLAGS)? & entry::LOCAL != 0;
        let offset = self.u32_field(base, entry::OFFSET)?;
        if local && (offset < HEADER_SIZE || offset >= header.size) {
            return Err(TypelibError::InvalidOffset {
                offset,
                size: header.size,
            });
        }
        Ok(DirEntry {
            index,
            blob_type,
            local,
            name: self.u32_field(base, entry::NAME)?,
            offset,
        })
    }

    /// Local directory entry by name
    pub fn find_entry(&self, name: &str) -> Result<Option<DirEntry>, TypelibError> {
        for index in 1..=self.n_local_entries() {
            let entry = self.dir_entry(index)?;
            if entry.name(self)? == name {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Local directory entry whose blob starts at `offset`
    pub fn find_entry_by_offset(&self, offset: u32) -> Result<Option<DirEntry>, TypelibError> {
        for index in 1..=self.n_local_entries() {
            let entry = self.dir_entry(index)?;
            if entry.offset == offset {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for Typelib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typelib")
            .field("namespace", &self.namespace())
            .field("version", &self.nsversion())
            .field("size", &self.header().size)
            .finish()
    }
}
