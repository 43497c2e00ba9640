//! Little-endian emission into a growable typelib buffer

/// Buffer writer used by the typelib builder
///
/// Appends values at the end and patches previously reserved slots once
/// their final offsets are known.
#[derive(Debug, Default)]
pub struct BlobWriter {
    pub(crate) buffer: Vec<u8>,
}

impl BlobWriter {
    /// Create a new empty writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new writer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Current contents
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Current offset (length of the buffer)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Basic Emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 16-bit unsigned integer (little-endian)
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit unsigned integer (little-endian)
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit signed integer (little-endian)
    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit raw bytes
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a string followed by a NUL terminator
    pub fn emit_cstr(&mut self, value: &str) {
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.push(0);
    }

    /// Emit `count` zero bytes
    pub fn emit_zeros(&mut self, count: usize) {
        self.buffer.resize(self.buffer.len() + count, 0);
    }

    /// Pad with zeros until the offset is a multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        let rem = self.buffer.len() % alignment;
        if rem != 0 {
            self.emit_zeros(alignment - rem);
        }
    }

    // ===== Patching =====

    /// Overwrite a byte at `offset`
    pub fn patch_u8_at(&mut self, offset: usize, value: u8) {
        self.buffer[offset] = value;
    }

    /// Overwrite a u16 at `offset`
    pub fn patch_u16_at(&mut self, offset: usize, value: u16) {
        self.buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Overwrite a u32 at `offset`
    pub fn patch_u32_at(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}
