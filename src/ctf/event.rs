//! Field values and event construction.
//!
//! An [`Event`] is built through an [`EventBuilder`] that borrows the schema and
//! validates each value as it is set, so a finished event is always encodable.
//! A failed setter leaves the builder unchanged; nothing reaches a stream until
//! [`crate::ctf::Writer::append_event`] is called with a finished event.

use crate::ctf::schema::{EventClass, EventClassId, StreamClass};
use crate::ctf::types::{FieldDecl, FieldSet};
use crate::error::{Result, TraceError};

/// A concrete value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    String(String),
    Sequence(Vec<FieldValue>),
}

impl FieldValue {
    /// The value as a wide integer, if it is one.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            FieldValue::Unsigned(v) => Some(*v as i128),
            FieldValue::Signed(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Zero value for a declaration, used for packet context defaults.
    pub fn zero(decl: &FieldDecl) -> Self {
        match decl {
            FieldDecl::Integer(int) if int.is_signed() => FieldValue::Signed(0),
            FieldDecl::Integer(_) => FieldValue::Unsigned(0),
            FieldDecl::String => FieldValue::String(String::new()),
            FieldDecl::Sequence { .. } => FieldValue::Sequence(Vec::new()),
        }
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                FieldValue::Unsigned(v as u64)
            }
        })*
    };
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                FieldValue::Signed(v as i64)
            }
        })*
    };
}

impl_from_unsigned!(u8, u16, u32, u64, usize);
impl_from_signed!(i8, i16, i32, i64);

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Unsigned(u64::from(v))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        FieldValue::Sequence(v.iter().map(|b| FieldValue::Unsigned(u64::from(*b))).collect())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::from(v.as_slice())
    }
}

/// Check `value` against `decl`, recursing into sequence elements.
///
/// Sequence lengths are checked by the caller, which knows the sibling
/// length field.
pub(crate) fn validate_value(field: &str, decl: &FieldDecl, value: &FieldValue) -> Result<()> {
    match (decl, value) {
        (FieldDecl::Integer(int), FieldValue::Unsigned(_) | FieldValue::Signed(_)) => {
            // as_i128 is always Some for integer variants
            int.check(field, value.as_i128().unwrap_or_default())
        }
        (FieldDecl::Integer(_), _) => Err(TraceError::TypeMismatch {
            field: field.to_string(),
            expected: "an integer",
        }),
        (FieldDecl::String, FieldValue::String(s)) => {
            if s.contains('\0') {
                Err(TraceError::InteriorNul {
                    field: field.to_string(),
                })
            } else {
                Ok(())
            }
        }
        (FieldDecl::String, _) => Err(TraceError::TypeMismatch {
            field: field.to_string(),
            expected: "a string",
        }),
        (FieldDecl::Sequence { element, .. }, FieldValue::Sequence(items)) => {
            for (i, item) in items.iter().enumerate() {
                validate_value(&format!("{field}[{i}]"), element, item)?;
            }
            Ok(())
        }
        (FieldDecl::Sequence { .. }, _) => Err(TraceError::TypeMismatch {
            field: field.to_string(),
            expected: "a sequence",
        }),
    }
}

/// Check a complete list of values against `set`: one value per field, each
/// valid for its declaration, and every sequence as long as its length field
/// says.
pub(crate) fn validate_values(set: &FieldSet, values: &[FieldValue]) -> Result<()> {
    if values.len() != set.len() {
        return Err(TraceError::TypeMismatch {
            field: set.scope().to_string(),
            expected: "one value per declared field",
        });
    }
    for ((name, decl), value) in set.iter().zip(values) {
        validate_value(name, decl, value)?;
        let (FieldDecl::Sequence { length_field, .. }, FieldValue::Sequence(items)) =
            (decl, value)
        else {
            continue;
        };
        let declared = set
            .index_of(length_field)
            .and_then(|i| values[i].as_i128())
            .ok_or_else(|| TraceError::LengthNotSet {
                field: name.to_string(),
                length_field: length_field.clone(),
            })?;
        if declared != items.len() as i128 {
            return Err(TraceError::SequenceLengthMismatch {
                field: name.to_string(),
                declared: u64::try_from(declared).unwrap_or_default(),
                actual: items.len(),
            });
        }
    }
    Ok(())
}

/// Set `value` into slot `name` of `values`, enforcing the sequence rules of
/// the field set: a sequence can only be set once its length field holds a
/// value, and must have exactly that many elements.
pub(crate) fn set_in(
    set: &FieldSet,
    values: &mut [Option<FieldValue>],
    name: &str,
    value: FieldValue,
) -> Result<()> {
    let (index, decl) = set.lookup(name)?;
    validate_value(name, decl, &value)?;

    match decl {
        FieldDecl::Sequence { length_field, .. } => {
            let declared = set
                .index_of(length_field)
                .and_then(|i| values[i].as_ref())
                .and_then(FieldValue::as_i128)
                .ok_or_else(|| TraceError::LengthNotSet {
                    field: name.to_string(),
                    length_field: length_field.clone(),
                })?;
            let actual = match &value {
                FieldValue::Sequence(items) => items.len(),
                _ => 0,
            };
            if declared != actual as i128 {
                return Err(TraceError::SequenceLengthMismatch {
                    field: name.to_string(),
                    declared: u64::try_from(declared).unwrap_or_default(),
                    actual,
                });
            }
        }
        FieldDecl::Integer(_) => {
            // Changing a length after its sequence was set must keep them in agreement.
            let new_len = value.as_i128().unwrap_or_default();
            for (seq_name, seq_decl) in set.iter() {
                let FieldDecl::Sequence { length_field, .. } = seq_decl else {
                    continue;
                };
                if length_field != name {
                    continue;
                }
                let seq_index = set.index_of(seq_name).unwrap_or(index);
                if let Some(FieldValue::Sequence(items)) = &values[seq_index] {
                    if items.len() as i128 != new_len {
                        return Err(TraceError::SequenceLengthMismatch {
                            field: seq_name.to_string(),
                            declared: u64::try_from(new_len).unwrap_or_default(),
                            actual: items.len(),
                        });
                    }
                }
            }
        }
        FieldDecl::String => {}
    }

    values[index] = Some(value);
    Ok(())
}

/// Unwrap every slot, failing on the first field that was never set.
pub(crate) fn collect_values(
    set: &FieldSet,
    values: Vec<Option<FieldValue>>,
) -> Result<Vec<FieldValue>> {
    set.iter()
        .zip(values)
        .map(|((name, _), value)| {
            value.ok_or_else(|| TraceError::MissingValue {
                field: format!("{}.{name}", set.scope()),
            })
        })
        .collect()
}

/// A fully populated event, ready to be appended to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub(crate) class: EventClassId,
    pub(crate) context: Vec<FieldValue>,
    pub(crate) payload: Vec<FieldValue>,
}

impl Event {
    pub fn class(&self) -> EventClassId {
        self.class
    }

    pub fn context(&self) -> &[FieldValue] {
        &self.context
    }

    pub fn payload(&self) -> &[FieldValue] {
        &self.payload
    }
}

/// Populates the event context and payload of one event.
pub struct EventBuilder<'a> {
    stream_class: &'a StreamClass,
    class: &'a EventClass,
    handle: EventClassId,
    context: Vec<Option<FieldValue>>,
    payload: Vec<Option<FieldValue>>,
}

impl<'a> EventBuilder<'a> {
    pub(crate) fn new(stream_class: &'a StreamClass, handle: EventClassId) -> Result<Self> {
        let class = stream_class.event_class(handle)?;
        Ok(Self {
            stream_class,
            class,
            handle,
            context: vec![None; stream_class.event_context().len()],
            payload: vec![None; class.payload().len()],
        })
    }

    pub fn class(&self) -> &EventClass {
        self.class
    }

    pub fn set_context(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        set_in(
            self.stream_class.event_context(),
            &mut self.context,
            name,
            value.into(),
        )
    }

    pub fn set_payload(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        set_in(self.class.payload(), &mut self.payload, name, value.into())
    }

    /// Finish the event. Every context and payload field must have been set.
    pub fn build(self) -> Result<Event> {
        Ok(Event {
            class: self.handle,
            context: collect_values(self.stream_class.event_context(), self.context)?,
            payload: collect_values(self.class.payload(), self.payload)?,
        })
    }
}
