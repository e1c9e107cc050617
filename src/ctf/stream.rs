//! Per-partition streams.
//!
//! A stream holds the packet context values of one partition and the events
//! appended to it, in append order. Events are kept as validated values and
//! only turned into bytes when the trace is flushed, because their padding
//! depends on where they land in the packet.

use crate::ctf::constants::{
    CONTENT_SIZE, CTF_MAGIC, EVENTS_DISCARDED, PACKET_SIZE, TIMESTAMP_BEGIN, TIMESTAMP_END,
};
use crate::ctf::encode::PacketEncoder;
use crate::ctf::event::{set_in, FieldValue};
use crate::ctf::schema::{EventClassId, StreamClass};
use crate::ctf::types::{ByteOrder, FieldDecl, IntegerDecl};
use crate::error::{Result, TraceError};

/// An event as stored in a stream buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub class: EventClassId,
    pub timestamp: u64,
    pub context: Vec<FieldValue>,
    pub payload: Vec<FieldValue>,
}

#[derive(Debug)]
pub struct Stream {
    partition: u32,
    file_name: String,
    packet_context: Vec<Option<FieldValue>>,
    events: Vec<RecordedEvent>,
}

impl Stream {
    /// Create the stream of `partition`, writing the key into the stream
    /// class's partition field. Other user fields start at zero.
    pub(crate) fn new(stream_class: &StreamClass, partition: u32) -> Result<Self> {
        let partition_field = stream_class
            .partition_field()
            .ok_or(TraceError::MissingPartitionField)?;
        if let Some(int) = stream_class
            .packet_context()
            .get(partition_field)
            .and_then(FieldDecl::as_integer)
        {
            int.check(partition_field, i128::from(partition))?;
        }

        let packet_context = stream_class
            .packet_context()
            .iter()
            .map(|(name, decl)| {
                if name == partition_field {
                    Some(FieldValue::Unsigned(u64::from(partition)))
                } else {
                    Some(FieldValue::zero(decl))
                }
            })
            .collect();

        Ok(Self {
            partition,
            file_name: format!("{}_{}", stream_class.name(), partition),
            packet_context,
            events: Vec::new(),
        })
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Name of the data file inside the trace directory.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn packet_context_value(
        &self,
        stream_class: &StreamClass,
        name: &str,
    ) -> Option<&FieldValue> {
        stream_class
            .packet_context()
            .index_of(name)
            .and_then(|i| self.packet_context[i].as_ref())
    }

    /// Override a user-defined packet context field.
    pub(crate) fn set_packet_context(
        &mut self,
        stream_class: &StreamClass,
        name: &str,
        value: FieldValue,
    ) -> Result<()> {
        if StreamClass::is_builtin_packet_field(name)
            || stream_class.partition_field() == Some(name)
        {
            return Err(TraceError::UnknownField {
                scope: "stream.packet.context (user fields)".to_string(),
                name: name.to_string(),
            });
        }
        set_in(
            stream_class.packet_context(),
            &mut self.packet_context,
            name,
            value,
        )
    }

    pub(crate) fn push(&mut self, event: RecordedEvent) {
        self.events.push(event);
    }

    /// Encode the stream as a single packet.
    ///
    /// Layout: packet header (magic, trace uuid, stream class id), packet
    /// context, then each event as header, event context and payload.
    /// Events keep their append order; `timestamp_begin` and `timestamp_end`
    /// are the smallest and largest event timestamps, so they bound the
    /// packet even when the clock was moved backwards between appends.
    pub(crate) fn encode(
        &self,
        stream_class: &StreamClass,
        uuid: &[u8; 16],
        order: ByteOrder,
        packet_alignment: usize,
    ) -> Result<Vec<u8>> {
        let mut enc = PacketEncoder::new(order);
        let u32_decl = IntegerDecl::unsigned(32)?.with_alignment(8)?;

        // Packet header
        enc.write_integer(&u32_decl, &FieldValue::Unsigned(u64::from(CTF_MAGIC)))?;
        enc.write_bytes(uuid);
        enc.write_integer(
            &u32_decl,
            &FieldValue::Unsigned(u64::from(stream_class.id())),
        )?;

        // Packet context, with the writer-owned fields filled in
        let begin = self.events.iter().map(|e| e.timestamp).min().unwrap_or(0);
        let end = self.events.iter().map(|e| e.timestamp).max().unwrap_or(0);
        let context_set = stream_class.packet_context();
        let mut context = Vec::with_capacity(context_set.len());
        for ((name, _), value) in context_set.iter().zip(&self.packet_context) {
            let value = match name {
                TIMESTAMP_BEGIN => FieldValue::Unsigned(begin),
                TIMESTAMP_END => FieldValue::Unsigned(end),
                CONTENT_SIZE | PACKET_SIZE | EVENTS_DISCARDED => FieldValue::Unsigned(0),
                _ => value.clone().ok_or_else(|| TraceError::MissingValue {
                    field: format!("{}.{name}", context_set.scope()),
                })?,
            };
            context.push(value);
        }
        let offsets = enc.write_struct(context_set, &context)?;

        for event in &self.events {
            let class = stream_class.event_class(event.class)?;
            let header = [
                FieldValue::Unsigned(u64::from(class.id())),
                FieldValue::Unsigned(event.timestamp),
            ];
            enc.write_struct(stream_class.event_header(), &header)?;
            enc.write_struct(stream_class.event_context(), &event.context)?;
            enc.write_struct(class.payload(), &event.payload)?;
        }

        let content_bytes = enc.offset();
        enc.pad_to(packet_alignment);
        let packet_bytes = enc.offset();

        for (i, (name, _)) in context_set.iter().enumerate() {
            match name {
                CONTENT_SIZE => enc.patch_u64(offsets[i], content_bytes as u64 * 8),
                PACKET_SIZE => enc.patch_u64(offsets[i], packet_bytes as u64 * 8),
                _ => {}
            }
        }

        Ok(enc.into_bytes())
    }
}
