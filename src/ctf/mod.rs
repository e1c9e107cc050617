//! Common Trace Format (CTF 1.8) writer.
//!
//! Produces a trace directory holding a plain-text TSDL `metadata` file and one
//! single-packet binary stream file per partition.

pub mod clock;
pub mod constants;
pub mod encode;
pub mod event;
pub mod metadata;
pub mod schema;
pub mod stream;
pub mod types;
pub mod writer;

pub use clock::Clock;
pub use event::{Event, EventBuilder, FieldValue};
pub use metadata::EnvValue;
pub use schema::{EventClass, EventClassId, StreamClass};
pub use stream::{RecordedEvent, Stream};
pub use types::{ByteOrder, DisplayBase, FieldDecl, FieldSet, IntegerDecl};
pub use writer::Writer;
