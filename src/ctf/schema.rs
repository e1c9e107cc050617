//! Stream and event classes.
//!
//! A [`StreamClass`] is the schema shared by every stream of the trace: its
//! packet context, its per-event context and the set of event classes that may
//! appear in it. The schema can only grow while no stream exists; the first
//! stream freezes it.

use crate::ctf::constants::BUILTIN_PACKET_CONTEXT;
use crate::ctf::types::{FieldDecl, FieldSet, IntegerDecl};
use crate::error::{Result, TraceError};

/// Handle to an event class registered on a stream class.
///
/// Handles are only meaningful for the writer that returned them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventClassId(pub(crate) usize);

impl EventClassId {
    /// Numeric id written in every event header.
    pub fn index(self) -> usize {
        self.0
    }
}

/// The schema of one kind of event record.
#[derive(Debug, Clone)]
pub struct EventClass {
    name: String,
    id: u32,
    payload: FieldSet,
}

impl EventClass {
    fn new(name: &str, id: u32) -> Self {
        Self {
            name: name.to_string(),
            id,
            payload: FieldSet::new(format!("{name}.fields")),
        }
    }

    /// Wire-level record type name, e.g. `lttng_ust_statedump:bin_info`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn payload(&self) -> &FieldSet {
        &self.payload
    }
}

#[derive(Debug, Clone)]
pub struct StreamClass {
    name: String,
    id: u32,
    clock: String,
    packet_context: FieldSet,
    event_header: FieldSet,
    event_context: FieldSet,
    partition_field: Option<String>,
    event_classes: Vec<EventClass>,
    frozen: bool,
}

impl StreamClass {
    /// Create a stream class timestamped by the clock named `clock`.
    ///
    /// The packet context starts with the fields the writer fills itself
    /// (`timestamp_begin`, `timestamp_end`, `content_size`, `packet_size`,
    /// `events_discarded`); the event header carries the event id and its
    /// timestamp.
    pub fn new(name: &str, clock: &str) -> Result<Self> {
        let u64_decl = IntegerDecl::unsigned(64)?.with_alignment(8)?;
        let timestamp = u64_decl.clone().mapped_to_clock(clock);

        let mut packet_context = FieldSet::new("stream.packet.context");
        for field in BUILTIN_PACKET_CONTEXT {
            let decl = if field.starts_with("timestamp_") {
                timestamp.clone()
            } else {
                u64_decl.clone()
            };
            packet_context.add(field, decl.into())?;
        }

        let mut event_header = FieldSet::new("stream.event.header");
        event_header.add("id", IntegerDecl::unsigned(32)?.with_alignment(8)?.into())?;
        event_header.add("timestamp", timestamp.into())?;

        Ok(Self {
            name: name.to_string(),
            id: 0,
            clock: clock.to_string(),
            packet_context,
            event_header,
            event_context: FieldSet::new("stream.event.context"),
            partition_field: None,
            event_classes: Vec::new(),
            frozen: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn clock(&self) -> &str {
        &self.clock
    }

    pub fn packet_context(&self) -> &FieldSet {
        &self.packet_context
    }

    pub fn event_header(&self) -> &FieldSet {
        &self.event_header
    }

    pub fn event_context(&self) -> &FieldSet {
        &self.event_context
    }

    pub fn partition_field(&self) -> Option<&str> {
        self.partition_field.as_deref()
    }

    pub fn event_classes(&self) -> &[EventClass] {
        &self.event_classes
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    fn ensure_mutable(&self, action: &'static str) -> Result<()> {
        if self.frozen {
            Err(TraceError::SchemaFrozen { action })
        } else {
            Ok(())
        }
    }

    pub fn add_packet_context_field(&mut self, name: &str, decl: FieldDecl) -> Result<()> {
        self.ensure_mutable("add a packet context field")?;
        self.packet_context.add(name, decl)
    }

    pub fn add_event_context_field(&mut self, name: &str, decl: FieldDecl) -> Result<()> {
        self.ensure_mutable("add an event context field")?;
        self.event_context.add(name, decl)
    }

    /// Choose the packet context field that receives each stream's partition key.
    pub fn set_partition_field(&mut self, name: &str) -> Result<()> {
        self.ensure_mutable("set the partition field")?;
        let is_unsigned = self
            .packet_context
            .get(name)
            .and_then(FieldDecl::as_integer)
            .is_some_and(|int| !int.is_signed());
        if !is_unsigned || BUILTIN_PACKET_CONTEXT.contains(&name) {
            return Err(TraceError::InvalidPartitionField(name.to_string()));
        }
        self.partition_field = Some(name.to_string());
        Ok(())
    }

    pub fn define_event_class(&mut self, name: &str) -> Result<EventClassId> {
        self.ensure_mutable("define an event class")?;
        if self.event_classes.iter().any(|ec| ec.name == name) {
            return Err(TraceError::DuplicateEventClass(name.to_string()));
        }
        let index = self.event_classes.len();
        self.event_classes.push(EventClass::new(name, index as u32));
        Ok(EventClassId(index))
    }

    pub fn add_payload_field(
        &mut self,
        class: EventClassId,
        name: &str,
        decl: FieldDecl,
    ) -> Result<()> {
        self.ensure_mutable("add a payload field")?;
        let event_class = self
            .event_classes
            .get_mut(class.0)
            .ok_or(TraceError::UnknownEventClass(class.0))?;
        event_class.payload.add(name, decl)
    }

    pub fn event_class(&self, class: EventClassId) -> Result<&EventClass> {
        self.event_classes
            .get(class.0)
            .ok_or(TraceError::UnknownEventClass(class.0))
    }

    /// Whether `name` is a packet context field the writer fills itself.
    pub fn is_builtin_packet_field(name: &str) -> bool {
        BUILTIN_PACKET_CONTEXT.contains(&name)
    }
}
