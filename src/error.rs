//! Error types for trace definition, encoding and output.
//!
//! Every failure is fatal for the operation that raised it and leaves previously
//! appended events and previously written files untouched.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Broad category of a [`TraceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The schema was misused (frozen, duplicate names, bad references).
    Definition,
    /// A value could not be encoded according to its declaration.
    Encoding,
    /// A partition, field or event class could not be found.
    Lookup,
    /// The output location could not be created or written.
    Resource,
    /// The writer was used after it was finalized.
    State,
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("schema is frozen: cannot {action} after the first stream was created")]
    SchemaFrozen { action: &'static str },

    #[error("event class '{0}' is already defined")]
    DuplicateEventClass(String),

    #[error("{scope}: field '{name}' is already defined")]
    DuplicateField { scope: String, name: String },

    #[error("'{0}' is not a valid field identifier")]
    InvalidIdentifier(String),

    #[error("sequence '{sequence}' references '{length_field}', which is not an integer field declared before it")]
    UnknownLengthField {
        sequence: String,
        length_field: String,
    },

    #[error("unsupported integer width {0} (expected 8, 16, 32 or 64)")]
    UnsupportedWidth(u32),

    #[error("invalid alignment {0} bits (expected a power of two, at least 8)")]
    InvalidAlignment(u32),

    #[error("partition field '{0}' must be an unsigned integer in the packet context")]
    InvalidPartitionField(String),

    #[error("no partition field was declared on the stream class")]
    MissingPartitionField,

    #[error("partition {0} already has a stream")]
    DuplicatePartition(u32),

    #[error("invalid hexadecimal identifier '{input}': {source}")]
    InvalidHex {
        input: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("{field}: sequence length is {declared} but {actual} elements were given")]
    SequenceLengthMismatch {
        field: String,
        declared: u64,
        actual: usize,
    },

    #[error("{field}: length field '{length_field}' must be set before the sequence")]
    LengthNotSet { field: String, length_field: String },

    #[error("{field}: value {value} does not fit a {width}-bit {} integer", signedness(.signed))]
    ValueOutOfRange {
        field: String,
        value: i128,
        width: u32,
        signed: bool,
    },

    #[error("{field}: expected {expected} value")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("{field}: strings cannot contain NUL bytes")]
    InteriorNul { field: String },

    #[error("{field}: no value was set")]
    MissingValue { field: String },

    #[error("no stream exists for partition {0}")]
    UnknownPartition(u32),

    #[error("{scope}: no field named '{name}'")]
    UnknownField { scope: String, name: String },

    #[error("event class handle {0} does not belong to this writer")]
    UnknownEventClass(usize),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("output path exists but is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("trace was already flushed")]
    AlreadyFlushed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn signedness(signed: &bool) -> &'static str {
    if *signed {
        "signed"
    } else {
        "unsigned"
    }
}

impl TraceError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraceError::SchemaFrozen { .. }
            | TraceError::DuplicateEventClass(_)
            | TraceError::DuplicateField { .. }
            | TraceError::InvalidIdentifier(_)
            | TraceError::UnknownLengthField { .. }
            | TraceError::UnsupportedWidth(_)
            | TraceError::InvalidAlignment(_)
            | TraceError::InvalidPartitionField(_)
            | TraceError::MissingPartitionField
            | TraceError::DuplicatePartition(_)
            | TraceError::InvalidConfig(_) => ErrorKind::Definition,
            TraceError::InvalidHex { .. }
            | TraceError::SequenceLengthMismatch { .. }
            | TraceError::LengthNotSet { .. }
            | TraceError::ValueOutOfRange { .. }
            | TraceError::TypeMismatch { .. }
            | TraceError::InteriorNul { .. }
            | TraceError::MissingValue { .. } => ErrorKind::Encoding,
            TraceError::UnknownPartition(_)
            | TraceError::UnknownField { .. }
            | TraceError::UnknownEventClass(_) => ErrorKind::Lookup,
            TraceError::Io { .. }
            | TraceError::NotADirectory(_)
            | TraceError::ConfigParse { .. } => ErrorKind::Resource,
            TraceError::AlreadyFlushed => ErrorKind::State,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TraceError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            TraceError::DuplicatePartition(1).kind(),
            ErrorKind::Definition
        );
        assert_eq!(
            TraceError::MissingValue {
                field: "x".to_string()
            }
            .kind(),
            ErrorKind::Encoding
        );
        assert_eq!(TraceError::UnknownPartition(3).kind(), ErrorKind::Lookup);
        assert_eq!(
            TraceError::NotADirectory(PathBuf::from("/tmp")).kind(),
            ErrorKind::Resource
        );
        assert_eq!(TraceError::AlreadyFlushed.kind(), ErrorKind::State);
    }

    #[test]
    fn test_out_of_range_message() {
        let err = TraceError::ValueOutOfRange {
            field: "_is_pic".to_string(),
            value: 256,
            width: 8,
            signed: false,
        };
        assert_eq!(
            err.to_string(),
            "_is_pic: value 256 does not fit a 8-bit unsigned integer"
        );
    }
}
