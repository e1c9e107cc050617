//! Field declarations: the type system of the trace schema.
//!
//! A declaration describes how one field is laid out on the wire. Declarations
//! are plain values; once added to a [`FieldSet`] they are never modified.

use serde::{Deserialize, Serialize};

use crate::ctf::constants::is_identifier;
use crate::error::{Result, TraceError};

/// Byte order of every integer in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Spelling used in TSDL (`le` / `be`).
    pub fn tsdl(self) -> &'static str {
        match self {
            ByteOrder::Little => "le",
            ByteOrder::Big => "be",
        }
    }
}

/// Preferred display base of an integer. Has no effect on the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayBase {
    Binary,
    Octal,
    #[default]
    Decimal,
    Hexadecimal,
}

impl DisplayBase {
    pub fn radix(self) -> u32 {
        match self {
            DisplayBase::Binary => 2,
            DisplayBase::Octal => 8,
            DisplayBase::Decimal => 10,
            DisplayBase::Hexadecimal => 16,
        }
    }
}

/// A fixed-width integer declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerDecl {
    width: u32,
    signed: bool,
    base: DisplayBase,
    /// Alignment in bits.
    alignment: u32,
    /// Name of the clock this integer is a timestamp of, if any.
    clock: Option<String>,
}

impl IntegerDecl {
    /// Create an integer of `width` bits (8, 16, 32 or 64), naturally aligned.
    pub fn new(width: u32, signed: bool) -> Result<Self> {
        if !matches!(width, 8 | 16 | 32 | 64) {
            return Err(TraceError::UnsupportedWidth(width));
        }
        Ok(Self {
            width,
            signed,
            base: DisplayBase::Decimal,
            alignment: width,
            clock: None,
        })
    }

    pub fn unsigned(width: u32) -> Result<Self> {
        Self::new(width, false)
    }

    pub fn signed(width: u32) -> Result<Self> {
        Self::new(width, true)
    }

    pub fn with_base(mut self, base: DisplayBase) -> Self {
        self.base = base;
        self
    }

    /// Set the alignment in bits. Only byte-multiple powers of two are supported.
    pub fn with_alignment(mut self, bits: u32) -> Result<Self> {
        if bits < 8 || !bits.is_power_of_two() {
            return Err(TraceError::InvalidAlignment(bits));
        }
        self.alignment = bits;
        Ok(self)
    }

    /// Mark this integer as a value of the named clock.
    pub fn mapped_to_clock(mut self, clock: impl Into<String>) -> Self {
        self.clock = Some(clock.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn base(&self) -> DisplayBase {
        self.base
    }

    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    pub fn clock(&self) -> Option<&str> {
        self.clock.as_deref()
    }

    /// Width in bytes.
    pub fn size_bytes(&self) -> usize {
        (self.width / 8) as usize
    }

    /// Whether `value` is representable by this declaration.
    pub fn fits(&self, value: i128) -> bool {
        let (min, max) = if self.signed {
            let half = 1i128 << (self.width - 1);
            (-half, half - 1)
        } else {
            (0, (1i128 << self.width) - 1)
        };
        (min..=max).contains(&value)
    }

    /// Reject values that do not fit, naming `field` in the error.
    pub fn check(&self, field: &str, value: i128) -> Result<()> {
        if self.fits(value) {
            Ok(())
        } else {
            Err(TraceError::ValueOutOfRange {
                field: field.to_string(),
                value,
                width: self.width,
                signed: self.signed,
            })
        }
    }
}

/// The declaration of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDecl {
    Integer(IntegerDecl),
    /// UTF-8 bytes followed by a NUL terminator.
    String,
    /// A run-time sized list whose length is carried by an earlier integer
    /// field of the same field set.
    Sequence {
        element: Box<FieldDecl>,
        length_field: String,
    },
}

impl FieldDecl {
    pub fn integer(decl: IntegerDecl) -> Self {
        FieldDecl::Integer(decl)
    }

    pub fn string() -> Self {
        FieldDecl::String
    }

    pub fn sequence(element: FieldDecl, length_field: impl Into<String>) -> Self {
        FieldDecl::Sequence {
            element: Box::new(element),
            length_field: length_field.into(),
        }
    }

    /// Alignment in bits of the first byte of this field.
    pub fn alignment(&self) -> u32 {
        match self {
            FieldDecl::Integer(int) => int.alignment(),
            FieldDecl::String => 8,
            FieldDecl::Sequence { element, .. } => element.alignment(),
        }
    }

    pub fn as_integer(&self) -> Option<&IntegerDecl> {
        match self {
            FieldDecl::Integer(int) => Some(int),
            _ => None,
        }
    }
}

impl From<IntegerDecl> for FieldDecl {
    fn from(decl: IntegerDecl) -> Self {
        FieldDecl::Integer(decl)
    }
}

/// An ordered set of named field declarations (a TSDL structure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    scope: String,
    fields: Vec<(String, FieldDecl)>,
}

impl FieldSet {
    /// Create an empty set. `scope` names the set in error messages.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            fields: Vec::new(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Append a field. Sequences must reference an integer field that is
    /// already part of this set, and their elements cannot be sequences.
    pub fn add(&mut self, name: &str, decl: FieldDecl) -> Result<()> {
        if !is_identifier(name) {
            return Err(TraceError::InvalidIdentifier(name.to_string()));
        }
        if self.index_of(name).is_some() {
            return Err(TraceError::DuplicateField {
                scope: self.scope.clone(),
                name: name.to_string(),
            });
        }
        if let FieldDecl::Sequence {
            element,
            length_field,
        } = &decl
        {
            // A nested sequence would need one length per element.
            if let FieldDecl::Sequence {
                length_field: inner,
                ..
            } = element.as_ref()
            {
                return Err(TraceError::UnknownLengthField {
                    sequence: name.to_string(),
                    length_field: inner.clone(),
                });
            }
            let is_integer = self
                .get(length_field)
                .is_some_and(|len| len.as_integer().is_some());
            if !is_integer {
                return Err(TraceError::UnknownLengthField {
                    sequence: name.to_string(),
                    length_field: length_field.clone(),
                });
            }
        }
        self.fields.push((name.to_string(), decl));
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// Look up a field, failing with a lookup error naming this set.
    pub fn lookup(&self, name: &str) -> Result<(usize, &FieldDecl)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, (n, _))| n == name)
            .map(|(i, (_, d))| (i, d))
            .ok_or_else(|| TraceError::UnknownField {
                scope: self.scope.clone(),
                name: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDecl)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Alignment in bits of the structure: the largest member alignment,
    /// or 8 for an empty structure.
    pub fn alignment(&self) -> u32 {
        self.fields
            .iter()
            .map(|(_, d)| d.alignment())
            .max()
            .unwrap_or(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_integer_defaults() {
        let int = IntegerDecl::unsigned(32).unwrap();
        assert_eq!(int.width(), 32);
        assert!(!int.is_signed());
        assert_eq!(int.base(), DisplayBase::Decimal);
        assert_eq!(int.alignment(), 32);
        assert_eq!(int.size_bytes(), 4);
    }

    #[test]
    fn test_unsupported_width() {
        let err = IntegerDecl::unsigned(12).unwrap_err();
        assert!(matches!(err, TraceError::UnsupportedWidth(12)));
        assert_eq!(err.kind(), ErrorKind::Definition);
    }

    #[test]
    fn test_alignment_validation() {
        let int = IntegerDecl::unsigned(64).unwrap();
        assert_eq!(int.clone().with_alignment(8).unwrap().alignment(), 8);
        assert!(int.clone().with_alignment(4).is_err());
        assert!(int.with_alignment(24).is_err());
    }

    #[test]
    fn test_fits_boundaries() {
        let u8_decl = IntegerDecl::unsigned(8).unwrap();
        assert!(u8_decl.fits(0));
        assert!(u8_decl.fits(255));
        assert!(!u8_decl.fits(256));
        assert!(!u8_decl.fits(-1));

        let i32_decl = IntegerDecl::signed(32).unwrap();
        assert!(i32_decl.fits(i32::MIN as i128));
        assert!(i32_decl.fits(i32::MAX as i128));
        assert!(!i32_decl.fits(i32::MAX as i128 + 1));

        let u64_decl = IntegerDecl::unsigned(64).unwrap();
        assert!(u64_decl.fits(u64::MAX as i128));
        assert!(!u64_decl.fits(-1));
    }

    #[test]
    fn test_sequence_requires_declared_length() {
        let u8_decl = IntegerDecl::unsigned(8).unwrap();
        let mut set = FieldSet::new("event.fields");
        let err = set
            .add(
                "_build_id",
                FieldDecl::sequence(u8_decl.clone().into(), "__build_id_length"),
            )
            .unwrap_err();
        assert!(matches!(err, TraceError::UnknownLengthField { .. }));

        set.add(
            "__build_id_length",
            IntegerDecl::unsigned(64).unwrap().into(),
        )
        .unwrap();
        set.add(
            "_build_id",
            FieldDecl::sequence(u8_decl.into(), "__build_id_length"),
        )
        .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_sequence_length_must_be_integer() {
        let mut set = FieldSet::new("event.fields");
        set.add("_path", FieldDecl::string()).unwrap();
        let err = set
            .add(
                "_seq",
                FieldDecl::sequence(IntegerDecl::unsigned(8).unwrap().into(), "_path"),
            )
            .unwrap_err();
        assert!(matches!(err, TraceError::UnknownLengthField { .. }));
    }

    #[test]
    fn test_nested_sequence_rejected() {
        let u8_decl = IntegerDecl::unsigned(8).unwrap();
        let mut set = FieldSet::new("event.fields");
        set.add("n", IntegerDecl::unsigned(32).unwrap().into())
            .unwrap();

        let inner = FieldDecl::sequence(u8_decl.clone().into(), "does_not_exist");
        let err = set
            .add("seq", FieldDecl::sequence(inner, "n"))
            .unwrap_err();
        assert!(matches!(
            err,
            TraceError::UnknownLengthField { ref length_field, .. } if length_field == "does_not_exist"
        ));
        assert_eq!(err.kind(), ErrorKind::Definition);

        // Even an inner length that names a real field is per element
        let inner = FieldDecl::sequence(u8_decl.into(), "n");
        assert!(set.add("seq", FieldDecl::sequence(inner, "n")).is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        let mut set = FieldSet::new("stream.event.context");
        set.add("_vpid", IntegerDecl::signed(32).unwrap().into())
            .unwrap();
        assert!(matches!(
            set.add("_vpid", FieldDecl::string()),
            Err(TraceError::DuplicateField { .. })
        ));
        assert!(matches!(
            set.add("bad name", FieldDecl::string()),
            Err(TraceError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            set.add("struct", FieldDecl::string()),
            Err(TraceError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_struct_alignment() {
        let mut set = FieldSet::new("s");
        assert_eq!(set.alignment(), 8);
        set.add("a", IntegerDecl::unsigned(8).unwrap().into())
            .unwrap();
        set.add("b", IntegerDecl::unsigned(32).unwrap().into())
            .unwrap();
        assert_eq!(set.alignment(), 32);
        assert_eq!(set.lookup("b").unwrap().0, 1);
        assert!(set.lookup("c").is_err());
    }
}
