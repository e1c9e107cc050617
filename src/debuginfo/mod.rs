//! Writer for synthetic LTTng-UST debug-info traces.
//!
//! [`DebugInfoTraceWriter`] wraps a CTF [`Writer`] configured to look like an
//! `lttng-ust` 2.8 trace, with one stream per CPU and one typed `write_*`
//! operation per `lttng_ust_statedump` event class. Consumers resolve
//! instruction pointers against the binaries reported between a
//! `statedump:start` and `statedump:end` pair.
//!
//! Every `write_*` call takes a time in milliseconds, the CPU whose stream
//! receives the event and the vpid of the process it describes. Calls are
//! all-or-nothing: the event is fully built and validated before the clock
//! moves or anything is appended.

pub mod fixtures;

use std::path::Path;

use crate::config::TraceConfig;
use crate::ctf::types::{DisplayBase, FieldDecl, IntegerDecl};
use crate::ctf::{EventBuilder, EventClassId, Writer};
use crate::error::{Result, TraceError};

pub const STREAM_CLASS_NAME: &str = "test_stream";
pub const CLOCK_NAME: &str = "A_clock";
pub const CLOCK_DESCRIPTION: &str = "Simple clock";

pub const CPU_ID_FIELD: &str = "cpu_id";
pub const IP_FIELD: &str = "_ip";
pub const VPID_FIELD: &str = "_vpid";

pub const DUMMY_EVENT: &str = "dummy_event";
pub const STATEDUMP_BIN_INFO: &str = "lttng_ust_statedump:bin_info";
pub const STATEDUMP_BUILD_ID: &str = "lttng_ust_statedump:build_id";
pub const STATEDUMP_DEBUG_LINK: &str = "lttng_ust_statedump:debug_link";
pub const STATEDUMP_END: &str = "lttng_ust_statedump:end";
pub const STATEDUMP_START: &str = "lttng_ust_statedump:start";

const MS_PER_SECOND: u128 = 1000;

/// Decode a textual build id ("aabb...") into raw bytes.
///
/// Two hex digits make one byte, so the result is half as long as the input.
pub fn decode_build_id(build_id: &str) -> Result<Vec<u8>> {
    hex::decode(build_id).map_err(|source| TraceError::InvalidHex {
        input: build_id.to_string(),
        source,
    })
}

/// A binary loaded in a process address space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinInfo {
    pub baddr: u64,
    pub memsz: u64,
    pub path: String,
    pub is_pic: bool,
    pub has_build_id: bool,
    pub has_debug_link: bool,
}

impl BinInfo {
    pub fn new(baddr: u64, memsz: u64, path: impl Into<String>) -> Self {
        Self {
            baddr,
            memsz,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_build_id(mut self) -> Self {
        self.has_build_id = true;
        self
    }

    pub fn with_debug_link(mut self) -> Self {
        self.has_debug_link = true;
        self
    }
}

/// Handles of the registered event classes.
#[derive(Debug, Clone, Copy)]
struct EventClasses {
    dummy_event: EventClassId,
    bin_info: EventClassId,
    build_id: EventClassId,
    debug_link: EventClassId,
    statedump_end: EventClassId,
    statedump_start: EventClassId,
}

/// Base types shared by the schema, all byte aligned.
struct BaseTypes {
    uint8: IntegerDecl,
    int32: IntegerDecl,
    uint32: IntegerDecl,
    uint64: IntegerDecl,
    uint64_hex: IntegerDecl,
}

impl BaseTypes {
    fn new() -> Result<Self> {
        let uint64 = IntegerDecl::unsigned(64)?.with_alignment(8)?;
        Ok(Self {
            uint8: IntegerDecl::unsigned(8)?.with_alignment(8)?,
            int32: IntegerDecl::signed(32)?.with_alignment(8)?,
            uint32: IntegerDecl::unsigned(32)?.with_alignment(8)?,
            uint64_hex: uint64.clone().with_base(DisplayBase::Hexadecimal),
            uint64,
        })
    }
}

/// Register every event class of the family. Ids follow the order below.
fn define_event_classes(writer: &mut Writer, types: &BaseTypes) -> Result<EventClasses> {
    let dummy_event = writer.define_event_class(DUMMY_EVENT)?;

    let bin_info = writer.define_event_class(STATEDUMP_BIN_INFO)?;
    writer.add_payload_field(bin_info, "_baddr", types.uint64_hex.clone().into())?;
    writer.add_payload_field(bin_info, "_memsz", types.uint64_hex.clone().into())?;
    writer.add_payload_field(bin_info, "_path", FieldDecl::string())?;
    writer.add_payload_field(bin_info, "_is_pic", types.uint8.clone().into())?;
    writer.add_payload_field(bin_info, "_has_build_id", types.uint8.clone().into())?;
    writer.add_payload_field(bin_info, "_has_debug_link", types.uint8.clone().into())?;

    let build_id = writer.define_event_class(STATEDUMP_BUILD_ID)?;
    writer.add_payload_field(build_id, "_baddr", types.uint64_hex.clone().into())?;
    writer.add_payload_field(build_id, "__build_id_length", types.uint64.clone().into())?;
    writer.add_payload_field(
        build_id,
        "_build_id",
        FieldDecl::sequence(types.uint8.clone().into(), "__build_id_length"),
    )?;

    let debug_link = writer.define_event_class(STATEDUMP_DEBUG_LINK)?;
    writer.add_payload_field(debug_link, "_baddr", types.uint64_hex.clone().into())?;
    writer.add_payload_field(debug_link, "_crc", types.uint32.clone().into())?;
    writer.add_payload_field(debug_link, "_filename", FieldDecl::string())?;

    let statedump_end = writer.define_event_class(STATEDUMP_END)?;
    let statedump_start = writer.define_event_class(STATEDUMP_START)?;

    Ok(EventClasses {
        dummy_event,
        bin_info,
        build_id,
        debug_link,
        statedump_end,
        statedump_start,
    })
}

/// Generates an LTTng-UST style trace with debug-info statedump events.
///
/// # Thread Safety
///
/// This type is NOT thread-safe. Use from a single thread.
pub struct DebugInfoTraceWriter {
    writer: Writer,
    events: EventClasses,
}

impl DebugInfoTraceWriter {
    /// Create a writer for `trace_path` with one stream per CPU in `0..num_cpus`.
    pub fn new(trace_path: &Path, num_cpus: u32) -> Result<Self> {
        Self::with_config(trace_path, num_cpus, TraceConfig::default())
    }

    pub fn with_config(trace_path: &Path, num_cpus: u32, config: TraceConfig) -> Result<Self> {
        let mut writer = Writer::create(trace_path, STREAM_CLASS_NAME, CLOCK_NAME, config)?;
        writer.clock_mut().set_description(CLOCK_DESCRIPTION);

        writer.add_environment_field("domain", "ust")?;
        writer.add_environment_field("tracer_name", "lttng-ust")?;
        writer.add_environment_field("tracer_major", 2i64)?;
        writer.add_environment_field("tracer_minor", 8i64)?;

        let types = BaseTypes::new()?;
        writer.add_packet_context_field(CPU_ID_FIELD, types.uint32.clone().into())?;
        writer.set_partition_field(CPU_ID_FIELD)?;
        writer.add_event_context_field(IP_FIELD, types.uint64_hex.clone().into())?;
        writer.add_event_context_field(VPID_FIELD, types.int32.clone().into())?;

        let events = define_event_classes(&mut writer, &types)?;

        for cpu_id in 0..num_cpus {
            writer.create_stream(cpu_id)?;
        }

        Ok(Self { writer, events })
    }

    /// The underlying CTF writer.
    pub fn writer(&self) -> &Writer {
        &self.writer
    }

    pub fn metadata(&self) -> String {
        self.writer.metadata()
    }

    /// Convert milliseconds to clock ticks.
    fn ticks(&self, time_ms: u64) -> Result<u64> {
        let frequency = u128::from(self.writer.clock().frequency());
        let ticks = u128::from(time_ms) * frequency / MS_PER_SECOND;
        u64::try_from(ticks).map_err(|_| TraceError::ValueOutOfRange {
            field: "timestamp".to_string(),
            value: ticks as i128,
            width: 64,
            signed: false,
        })
    }

    fn write_event<F>(
        &mut self,
        class: EventClassId,
        time_ms: u64,
        cpu_id: u32,
        vpid: i32,
        ip: u64,
        fill: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut EventBuilder<'_>) -> Result<()>,
    {
        self.writer.stream(cpu_id)?;
        let ticks = self.ticks(time_ms)?;

        let mut builder = self.writer.new_event(class)?;
        builder.set_context(IP_FIELD, ip)?;
        builder.set_context(VPID_FIELD, vpid)?;
        fill(&mut builder)?;
        let event = builder.build()?;

        self.writer.advance_clock(ticks)?;
        self.writer.append_event(cpu_id, event)
    }

    pub fn write_statedump_start(&mut self, time_ms: u64, cpu_id: u32, vpid: i32) -> Result<()> {
        let class = self.events.statedump_start;
        self.write_event(class, time_ms, cpu_id, vpid, 0, |_| Ok(()))
    }

    pub fn write_bin_info(
        &mut self,
        time_ms: u64,
        cpu_id: u32,
        vpid: i32,
        bin: &BinInfo,
    ) -> Result<()> {
        let class = self.events.bin_info;
        self.write_event(class, time_ms, cpu_id, vpid, 0, |event| {
            event.set_payload("_baddr", bin.baddr)?;
            event.set_payload("_memsz", bin.memsz)?;
            event.set_payload("_path", bin.path.as_str())?;
            event.set_payload("_is_pic", bin.is_pic)?;
            event.set_payload("_has_build_id", bin.has_build_id)?;
            event.set_payload("_has_debug_link", bin.has_debug_link)
        })
    }

    /// Write a `build_id` event. `build_id` is the hex text of the id.
    pub fn write_build_id(
        &mut self,
        time_ms: u64,
        cpu_id: u32,
        vpid: i32,
        baddr: u64,
        build_id: &str,
    ) -> Result<()> {
        let bytes = decode_build_id(build_id)?;
        let class = self.events.build_id;
        self.write_event(class, time_ms, cpu_id, vpid, 0, |event| {
            event.set_payload("_baddr", baddr)?;
            event.set_payload("__build_id_length", bytes.len())?;
            event.set_payload("_build_id", bytes)
        })
    }

    pub fn write_debug_link(
        &mut self,
        time_ms: u64,
        cpu_id: u32,
        vpid: i32,
        baddr: u64,
        crc: u32,
        filename: &str,
    ) -> Result<()> {
        let class = self.events.debug_link;
        self.write_event(class, time_ms, cpu_id, vpid, 0, |event| {
            event.set_payload("_baddr", baddr)?;
            event.set_payload("_crc", crc)?;
            event.set_payload("_filename", filename)
        })
    }

    pub fn write_statedump_end(&mut self, time_ms: u64, cpu_id: u32, vpid: i32) -> Result<()> {
        let class = self.events.statedump_end;
        self.write_event(class, time_ms, cpu_id, vpid, 0, |_| Ok(()))
    }

    /// Write a marker event whose context carries `ip`.
    pub fn write_dummy_event(&mut self, time_ms: u64, cpu_id: u32, vpid: i32, ip: u64) -> Result<()> {
        let class = self.events.dummy_event;
        self.write_event(class, time_ms, cpu_id, vpid, ip, |_| Ok(()))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }
}
