//! The trace writer.
//!
//! A [`Writer`] owns everything that ends up in one trace directory: the clock,
//! the stream class schema, the environment, and one [`Stream`] per partition.
//! Usage follows three phases:
//!
//! 1. Define the schema (context fields, partition field, event classes).
//! 2. Create streams, which freezes the schema, then append events.
//! 3. [`Writer::flush`] exactly once, which writes `metadata` and one data file
//!    per stream.
//!
//! # Thread Safety
//!
//! `Writer` is NOT thread-safe. The clock is shared by every stream and is
//! set before each append, so concurrent producers must serialize all writer
//! calls behind a single `Mutex<Writer>`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::config::TraceConfig;
use crate::ctf::clock::Clock;
use crate::ctf::constants::{is_identifier, METADATA_FILE_NAME};
use crate::ctf::event::{validate_values, Event, EventBuilder, FieldValue};
use crate::ctf::metadata::{EnvValue, Metadata};
use crate::ctf::schema::{EventClassId, StreamClass};
use crate::ctf::stream::{RecordedEvent, Stream};
use crate::ctf::types::FieldDecl;
use crate::error::{Result, TraceError};

pub struct Writer {
    output_dir: PathBuf,
    config: TraceConfig,
    uuid: Uuid,
    clock: Clock,
    stream_class: StreamClass,
    env: Vec<(String, EnvValue)>,
    /// Keyed by partition so flush writes streams in partition order.
    streams: BTreeMap<u32, Stream>,
    flushed: bool,
}

impl Writer {
    /// Create a writer targeting `output_dir`.
    ///
    /// The directory is created if it does not exist. Nothing is written to it
    /// until [`Writer::flush`].
    pub fn create(
        output_dir: &Path,
        stream_class_name: &str,
        clock_name: &str,
        config: TraceConfig,
    ) -> Result<Self> {
        config.validate()?;

        if !output_dir.exists() {
            fs::create_dir_all(output_dir).map_err(|e| TraceError::io(output_dir, e))?;
        } else if !output_dir.is_dir() {
            return Err(TraceError::NotADirectory(output_dir.to_path_buf()));
        }

        let mut clock = Clock::new(clock_name)?;
        clock.set_frequency(config.clock_frequency);
        let stream_class = StreamClass::new(stream_class_name, clock.name())?;
        let uuid = config.trace_uuid.unwrap_or_else(Uuid::new_v4);

        debug!(
            "Created trace writer for {} (uuid {})",
            output_dir.display(),
            uuid
        );

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            config,
            uuid,
            clock,
            stream_class,
            env: Vec::new(),
            streams: BTreeMap::new(),
            flushed: false,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.flushed {
            Err(TraceError::AlreadyFlushed)
        } else {
            Ok(())
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Set the clock to an absolute value. Appended events take this timestamp.
    pub fn advance_clock(&mut self, value: u64) -> Result<()> {
        self.ensure_open()?;
        self.clock.advance_to(value);
        Ok(())
    }

    pub fn stream_class(&self) -> &StreamClass {
        &self.stream_class
    }

    /// Add or replace an entry of the metadata `env` block.
    pub fn add_environment_field(&mut self, key: &str, value: impl Into<EnvValue>) -> Result<()> {
        self.ensure_open()?;
        if !is_identifier(key) {
            return Err(TraceError::InvalidIdentifier(key.to_string()));
        }
        let value = value.into();
        match self.env.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.env.push((key.to_string(), value)),
        }
        Ok(())
    }

    pub fn environment(&self) -> &[(String, EnvValue)] {
        &self.env
    }

    pub fn add_packet_context_field(&mut self, name: &str, decl: FieldDecl) -> Result<()> {
        self.ensure_open()?;
        self.stream_class.add_packet_context_field(name, decl)
    }

    pub fn add_event_context_field(&mut self, name: &str, decl: FieldDecl) -> Result<()> {
        self.ensure_open()?;
        self.stream_class.add_event_context_field(name, decl)
    }

    pub fn set_partition_field(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.stream_class.set_partition_field(name)
    }

    pub fn define_event_class(&mut self, name: &str) -> Result<EventClassId> {
        self.ensure_open()?;
        self.stream_class.define_event_class(name)
    }

    pub fn add_payload_field(
        &mut self,
        class: EventClassId,
        name: &str,
        decl: FieldDecl,
    ) -> Result<()> {
        self.ensure_open()?;
        self.stream_class.add_payload_field(class, name, decl)
    }

    /// Create the stream of `partition`. The first stream freezes the schema.
    pub fn create_stream(&mut self, partition: u32) -> Result<()> {
        self.ensure_open()?;
        if self.streams.contains_key(&partition) {
            return Err(TraceError::DuplicatePartition(partition));
        }
        let stream = Stream::new(&self.stream_class, partition)?;
        if !self.stream_class.is_frozen() {
            debug!("Freezing schema of stream class {}", self.stream_class.name());
            self.stream_class.freeze();
        }
        debug!("Created stream {}", stream.file_name());
        self.streams.insert(partition, stream);
        Ok(())
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    pub fn stream(&self, partition: u32) -> Result<&Stream> {
        self.streams
            .get(&partition)
            .ok_or(TraceError::UnknownPartition(partition))
    }

    /// Override a user-defined packet context field of one stream.
    pub fn set_packet_context(
        &mut self,
        partition: u32,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<()> {
        self.ensure_open()?;
        let stream = self
            .streams
            .get_mut(&partition)
            .ok_or(TraceError::UnknownPartition(partition))?;
        stream.set_packet_context(&self.stream_class, name, value.into())
    }

    /// Start an event of class `class`.
    pub fn new_event(&self, class: EventClassId) -> Result<EventBuilder<'_>> {
        self.ensure_open()?;
        EventBuilder::new(&self.stream_class, class)
    }

    /// Append a finished event to the stream of `partition`, timestamped with
    /// the current clock value.
    ///
    /// The event's values are checked against this writer's declarations, so
    /// an event built by another writer is only accepted if it is valid here.
    pub fn append_event(&mut self, partition: u32, event: Event) -> Result<()> {
        self.ensure_open()?;
        let class = self.stream_class.event_class(event.class)?;
        if event.context.len() != self.stream_class.event_context().len()
            || event.payload.len() != class.payload().len()
        {
            return Err(TraceError::UnknownEventClass(event.class.index()));
        }
        validate_values(self.stream_class.event_context(), &event.context)?;
        validate_values(class.payload(), &event.payload)?;
        let stream = self
            .streams
            .get_mut(&partition)
            .ok_or(TraceError::UnknownPartition(partition))?;

        let timestamp = self.clock.time();
        trace!(
            "Appending {} to {} at {}",
            class.name(),
            stream.file_name(),
            timestamp
        );
        stream.push(RecordedEvent {
            class: event.class,
            timestamp,
            context: event.context,
            payload: event.payload,
        });
        Ok(())
    }

    /// Render the TSDL metadata. Deterministic for a given writer state.
    pub fn metadata(&self) -> String {
        Metadata {
            uuid: &self.uuid,
            byte_order: self.config.byte_order,
            env: &self.env,
            clock: &self.clock,
            stream_class: &self.stream_class,
        }
        .to_string()
    }

    /// Write `metadata` and one data file per stream, in partition order.
    ///
    /// The writer is finalized by the first call, even if it fails; any later
    /// call on it returns [`TraceError::AlreadyFlushed`].
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flushed = true;

        let metadata_path = self.output_dir.join(METADATA_FILE_NAME);
        write_file(&metadata_path, self.metadata().as_bytes())?;

        let uuid = *self.uuid.as_bytes();
        let mut total_events = 0;
        for stream in self.streams.values() {
            let packet = stream.encode(
                &self.stream_class,
                &uuid,
                self.config.byte_order,
                self.config.packet_alignment,
            )?;
            write_file(&self.output_dir.join(stream.file_name()), &packet)?;
            total_events += stream.events().len();
        }

        info!(
            "Wrote trace to {}: {} streams, {} events",
            self.output_dir.display(),
            self.streams.len(),
            total_events
        );
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(path).map_err(|e| TraceError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(bytes)
        .and_then(|_| writer.flush())
        .map_err(|e| TraceError::io(path, e))
}
