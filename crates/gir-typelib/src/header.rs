//! Typelib header
//!
//! The header sits at offset 0 and carries every constant the rest of the
//! reader needs: table locations, namespace strings and the record size of
//! each blob kind. Offsets inside blobs are fixed, but record sizes are
//! always taken from here.

use crate::reader::BlobReader;
use crate::writer::BlobWriter;
use crate::TypelibError;

/// Magic bytes at the start of every typelib
pub const MAGIC: &[u8; 16] = b"GOBJ\nMETADATA\r\n\x1a";

/// Major format version understood by this reader
pub const MAJOR_VERSION: u8 = 2;

/// Minor format version written by the builder
pub const MINOR_VERSION: u8 = 0;

/// Size of the fixed header record
pub const HEADER_SIZE: u32 = 112;

/// Record size of each blob kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobSizes {
    pub entry: u16,
    pub function: u16,
    pub callback: u16,
    pub signal: u16,
    pub vfunc: u16,
    pub arg: u16,
    pub property: u16,
    pub field: u16,
    pub value: u16,
    pub annotation: u16,
    pub constant: u16,
    pub error_domain: u16,
    pub signature: u16,
    pub enum_blob: u16,
    pub struct_blob: u16,
    pub object: u16,
    pub interface: u16,
    pub union_blob: u16,
}

impl BlobSizes {
    /// Sizes written by this version of the builder, and the minimum a
    /// reader accepts
    pub const CURRENT: BlobSizes = BlobSizes {
        entry: 12,
        function: 20,
        callback: 12,
        signal: 12,
        vfunc: 16,
        arg: 12,
        property: 12,
        field: 12,
        value: 12,
        annotation: 12,
        constant: 20,
        error_domain: 16,
        signature: 8,
        enum_blob: 24,
        struct_blob: 20,
        object: 36,
        interface: 32,
        union_blob: 28,
    };

    fn fields(&self) -> [(&'static str, u16); 18] {
        [
            ("entry", self.entry),
            ("function", self.function),
            ("callback", self.callback),
            ("signal", self.signal),
            ("vfunc", self.vfunc),
            ("arg", self.arg),
            ("property", self.property),
            ("field", self.field),
            ("value", self.value),
            ("annotation", self.annotation),
            ("constant", self.constant),
            ("error_domain", self.error_domain),
            ("signature", self.signature),
            ("enum", self.enum_blob),
            ("struct", self.struct_blob),
            ("object", self.object),
            ("interface", self.interface),
            ("union", self.union_blob),
        ]
    }

    fn check_minimums(&self) -> Result<(), TypelibError> {
        let minimums = BlobSizes::CURRENT.fields();
        for ((blob, found), (_, required)) in self.fields().into_iter().zip(minimums) {
            if found < required {
                return Err(TypelibError::BlobSizeTooSmall {
                    blob,
                    found,
                    required,
                });
            }
        }
        Ok(())
    }
}

/// Parsed typelib header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub major_version: u8,
    pub minor_version: u8,
    pub n_entries: u16,
    pub n_local_entries: u16,
    pub directory: u32,
    pub n_annotations: u32,
    pub annotations: u32,
    pub dependencies: u32,
    pub size: u32,
    pub namespace: u32,
    pub nsversion: u32,
    pub shared_library: u32,
    pub sizes: BlobSizes,
}

impl Header {
    /// Parse and validate the header at the start of `data`
    pub fn parse(data: &[u8]) -> Result<Self, TypelibError> {
        if data.len() < HEADER_SIZE as usize {
            return Err(TypelibError::Truncated {
                declared: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let mut reader = BlobReader::new(data);
        if reader.read_bytes(MAGIC.len())? != MAGIC {
            return Err(TypelibError::InvalidMagic);
        }
        let major_version = reader.read_u8()?;
        let minor_version = reader.read_u8()?;
        if major_version != MAJOR_VERSION {
            return Err(TypelibError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }
        let _reserved = reader.read_u16()?;

        let n_entries = reader.read_u16()?;
        let n_local_entries = reader.read_u16()?;
        let directory = reader.read_u32()?;
        let n_annotations = reader.read_u32()?;
        let annotations = reader.read_u32()?;
        let dependencies = reader.read_u32()?;
        let size = reader.read_u32()?;
        let namespace = reader.read_u32()?;
        let nsversion = reader.read_u32()?;
        let shared_library = reader.read_u32()?;

        let sizes = BlobSizes {
            entry: reader.read_u16()?,
            function: reader.read_u16()?,
            callback: reader.read_u16()?,
            signal: reader.read_u16()?,
            vfunc: reader.read_u16()?,
            arg: reader.read_u16()?,
            property: reader.read_u16()?,
            field: reader.read_u16()?,
            value: reader.read_u16()?,
            annotation: reader.read_u16()?,
            constant: reader.read_u16()?,
            error_domain: reader.read_u16()?,
            signature: reader.read_u16()?,
            enum_blob: reader.read_u16()?,
            struct_blob: reader.read_u16()?,
            object: reader.read_u16()?,
            interface: reader.read_u16()?,
            union_blob: reader.read_u16()?,
        };
        sizes.check_minimums()?;

        if size as usize > data.len() {
            return Err(TypelibError::Truncated {
                declared: size,
                actual: data.len(),
            });
        }
        if n_local_entries > n_entries {
            return Err(TypelibError::InvalidDirectory {
                n_entries,
                n_local_entries,
            });
        }

        Ok(Self {
            major_version,
            minor_version,
            n_entries,
            n_local_entries,
            directory,
            n_annotations,
            annotations,
            dependencies,
            size,
            namespace,
            nsversion,
            shared_library,
            sizes,
        })
    }

    /// Encode the header into the first [`HEADER_SIZE`] bytes of `writer`
    pub fn write(&self, writer: &mut BlobWriter) {
        let start = writer.offset();
        writer.emit_bytes(MAGIC);
        writer.emit_u8(self.major_version);
        writer.emit_u8(self.minor_version);
        writer.emit_u16(0);
        writer.emit_u16(self.n_entries);
        writer.emit_u16(self.n_local_entries);
        writer.emit_u32(self.directory);
        writer.emit_u32(self.n_annotations);
        writer.emit_u32(self.annotations);
        writer.emit_u32(self.dependencies);
        writer.emit_u32(self.size);
        writer.emit_u32(self.namespace);
        writer.emit_u32(self.nsversion);
        writer.emit_u32(self.shared_library);
        for (_, size) in self.sizes.fields() {
            writer.emit_u16(size);
        }
        let written = writer.offset() - start;
        writer.emit_zeros(HEADER_SIZE as usize - written);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            n_entries: 3,
            n_local_entries: 2,
            directory: HEADER_SIZE,
            n_annotations: 0,
            annotations: 0,
            dependencies: 0,
            size: HEADER_SIZE,
            namespace: 0,
            nsversion: 0,
            shared_library: 0,
            sizes: BlobSizes::CURRENT,
        }
    }

    #[test]
    fn test_header_encode_decode() {
        let header = sample();
        let mut writer = BlobWriter::new();
        header.write(&mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE as usize);
        assert_eq!(&bytes[..16], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[56], bytes[57]]), 12);
        assert_eq!(u16::from_le_bytes([bytes[90], bytes[91]]), 28);
        assert_eq!(Header::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut writer = BlobWriter::new();
        sample().write(&mut writer);
        let mut bytes = writer.into_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            Header::parse(&bytes),
            Err(TypelibError::InvalidMagic)
        ));
    }

    #[test]
    fn test_header_rejects_small_blob_size() {
        let mut header = sample();
        header.sizes.object = 20;
        let mut writer = BlobWriter::new();
        header.write(&mut writer);
        assert!(matches!(
            Header::parse(writer.buffer()),
            Err(TypelibError::BlobSizeTooSmall { blob: "object", .. })
        ));
    }

    #[test]
    fn test_header_rejects_truncation() {
        assert!(matches!(
            Header::parse(&[0u8; 40]),
            Err(TypelibError::Truncated { .. })
        ));
        let mut header = sample();
        header.size = 4096;
        let mut writer = BlobWriter::new();
        header.write(&mut writer);
        assert!(matches!(
            Header::parse(writer.buffer()),
            Err(TypelibError::Truncated { declared: 4096, .. })
        ));
    }
}
