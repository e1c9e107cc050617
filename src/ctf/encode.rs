//! Byte-exact packet encoding.
//!
//! All offsets are relative to the start of the packet, which is where CTF
//! readers compute alignment from. Padding bytes are always zero.

use crate::ctf::event::FieldValue;
use crate::ctf::types::{ByteOrder, FieldDecl, FieldSet, IntegerDecl};
use crate::error::{Result, TraceError};

/// Growable buffer holding one packet.
#[derive(Debug)]
pub struct PacketEncoder {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl PacketEncoder {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    /// Current offset in bytes.
    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    /// Zero-pad up to the next multiple of `bits` (a multiple of 8).
    pub fn align(&mut self, bits: u32) {
        let bytes = (bits / 8).max(1) as usize;
        let padded = self.buf.len().next_multiple_of(bytes);
        self.buf.resize(padded, 0);
    }

    /// Write the low `width` bits of `raw` in the packet byte order.
    fn put(&mut self, raw: u64, width: u32) {
        let size = (width / 8) as usize;
        match self.order {
            ByteOrder::Little => self.buf.extend_from_slice(&raw.to_le_bytes()[..size]),
            ByteOrder::Big => self.buf.extend_from_slice(&raw.to_be_bytes()[8 - size..]),
        }
    }

    /// Write an already range-checked integer; returns the offset it landed at.
    pub fn write_integer(&mut self, decl: &IntegerDecl, value: &FieldValue) -> Result<usize> {
        // Two's complement truncation to the declared width
        let raw = match value {
            FieldValue::Unsigned(v) => *v,
            FieldValue::Signed(v) => *v as u64,
            _ => return Err(mismatch("integer", "an integer")),
        };
        self.align(decl.alignment());
        let offset = self.offset();
        self.put(raw, decl.width());
        Ok(offset)
    }

    pub fn write_string(&mut self, value: &str) {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_field(&mut self, decl: &FieldDecl, value: &FieldValue) -> Result<()> {
        match (decl, value) {
            (FieldDecl::Integer(int), _) => {
                self.write_integer(int, value)?;
            }
            (FieldDecl::String, FieldValue::String(s)) => self.write_string(s),
            (FieldDecl::String, _) => return Err(mismatch("string", "a string")),
            (FieldDecl::Sequence { element, .. }, FieldValue::Sequence(items)) => {
                self.align(element.alignment());
                for item in items {
                    self.write_field(element, item)?;
                }
            }
            (FieldDecl::Sequence { .. }, _) => return Err(mismatch("sequence", "a sequence")),
        }
        Ok(())
    }

    /// Write a structure; returns the offset of each member.
    pub fn write_struct(&mut self, set: &FieldSet, values: &[FieldValue]) -> Result<Vec<usize>> {
        if values.len() != set.len() {
            return Err(mismatch(set.scope(), "one value per declared field"));
        }
        self.align(set.alignment());
        set.iter()
            .zip(values)
            .map(|((name, decl), value)| {
                self.align(decl.alignment());
                let offset = self.offset();
                self.write_field(decl, value).map_err(|e| match e {
                    TraceError::TypeMismatch { expected, .. } => mismatch(name, expected),
                    other => other,
                })?;
                Ok(offset)
            })
            .collect()
    }

    /// Overwrite a 64-bit integer previously written at `offset`.
    pub fn patch_u64(&mut self, offset: usize, value: u64) {
        let bytes = match self.order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        self.buf[offset..offset + 8].copy_from_slice(&bytes);
    }

    /// Zero-pad the packet to a multiple of `bytes`.
    pub fn pad_to(&mut self, bytes: usize) {
        if bytes > 1 {
            let padded = self.buf.len().next_multiple_of(bytes);
            self.buf.resize(padded, 0);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn mismatch(field: &str, expected: &'static str) -> TraceError {
    TraceError::TypeMismatch {
        field: field.to_string(),
        expected,
    }
}
