//! Shared constants for CTF encoding.
//!
//! Values that appear both in the TSDL metadata and in the binary packets live
//! here so the two artifacts cannot drift apart.

use std::sync::LazyLock;

use regex::Regex;

/// Magic number at the start of every packet header.
pub const CTF_MAGIC: u32 = 0xC1FC_1FC1;

/// CTF version written to the metadata.
pub const CTF_MAJOR: u32 = 1;
pub const CTF_MINOR: u32 = 8;

/// First line of a plain-text metadata file.
pub const METADATA_SIGNATURE: &str = "/* CTF 1.8 */";

/// File name of the schema artifact inside the trace directory.
pub const METADATA_FILE_NAME: &str = "metadata";

/// Default clock frequency: one tick per nanosecond.
pub const DEFAULT_CLOCK_FREQUENCY: u64 = 1_000_000_000;

/// Default packet alignment in bytes. Packets are zero-padded up to this size.
pub const DEFAULT_PACKET_ALIGNMENT: usize = 4096;

/// Packet context fields every stream class carries, in declaration order.
/// They are filled by the writer at flush time.
pub const TIMESTAMP_BEGIN: &str = "timestamp_begin";
pub const TIMESTAMP_END: &str = "timestamp_end";
pub const CONTENT_SIZE: &str = "content_size";
pub const PACKET_SIZE: &str = "packet_size";
pub const EVENTS_DISCARDED: &str = "events_discarded";

pub const BUILTIN_PACKET_CONTEXT: [&str; 5] = [
    TIMESTAMP_BEGIN,
    TIMESTAMP_END,
    CONTENT_SIZE,
    PACKET_SIZE,
    EVENTS_DISCARDED,
];

/// Identifiers accepted for field and clock names.
/// TSDL identifiers follow C rules: a letter or underscore, then letters,
/// digits or underscores.
pub static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier regex pattern")
});

/// TSDL keywords. They match [`IDENTIFIER_RE`] but cannot name anything.
pub const RESERVED_KEYWORDS: [&str; 30] = [
    "align",
    "callsite",
    "char",
    "clock",
    "const",
    "double",
    "enum",
    "env",
    "event",
    "float",
    "floating_point",
    "int",
    "integer",
    "long",
    "short",
    "signed",
    "stream",
    "string",
    "struct",
    "trace",
    "typealias",
    "typedef",
    "unsigned",
    "variant",
    "void",
    "_Bool",
    "_Complex",
    "_Imaginary",
    "true",
    "false",
];

/// Whether `name` can be used as a TSDL identifier.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name) && !RESERVED_KEYWORDS.contains(&name)
}
