//! synthtrace library: a schema-driven CTF 1.8 trace writer.
//!
//! The [`ctf`] module defines typed event records, groups them into
//! per-partition streams sharing one clock, and writes the TSDL metadata and
//! binary packets of a trace directory. The [`debuginfo`] module builds on it
//! to generate LTTng-UST style traces carrying `lttng_ust_statedump` events.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use synthtrace::debuginfo::{BinInfo, DebugInfoTraceWriter};
//!
//! let mut tw = DebugInfoTraceWriter::new(Path::new("./trace"), 1)?;
//! tw.write_statedump_start(1, 0, 1337)?;
//! tw.write_bin_info(2, 0, 1337, &BinInfo::new(0x400000, 0x10000, "/tmp/foo"))?;
//! tw.write_statedump_end(3, 0, 1337)?;
//! tw.write_dummy_event(4, 0, 1337, 0x400100)?;
//! tw.flush()?;
//! # Ok::<(), synthtrace::TraceError>(())
//! ```

pub mod config;
pub mod ctf;
pub mod debuginfo;
pub mod error;

pub use config::TraceConfig;
pub use error::{ErrorKind, Result, TraceError};
