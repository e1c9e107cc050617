//! The trace clock.
//!
//! A single clock is shared by every stream of the stream class. The writer sets
//! it right before each append, so its value at append time becomes the event
//! timestamp. Monotonicity is the caller's responsibility: readers merge all
//! streams by timestamp, but the writer never rejects a backwards step.

use uuid::Uuid;

use crate::ctf::constants::{is_identifier, DEFAULT_CLOCK_FREQUENCY};
use crate::error::{Result, TraceError};

#[derive(Debug, Clone)]
pub struct Clock {
    name: String,
    description: Option<String>,
    frequency: u64,
    precision: u64,
    uuid: Option<Uuid>,
    time: u64,
}

impl Clock {
    pub fn new(name: &str) -> Result<Self> {
        if !is_identifier(name) {
            return Err(TraceError::InvalidIdentifier(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            description: None,
            frequency: DEFAULT_CLOCK_FREQUENCY,
            precision: 1,
            uuid: None,
            time: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Ticks per second.
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: u64) {
        self.frequency = frequency;
    }

    pub fn precision(&self) -> u64 {
        self.precision
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn set_uuid(&mut self, uuid: Uuid) {
        self.uuid = Some(uuid);
    }

    /// Current value in ticks.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Set the absolute time. Never rejected.
    pub fn advance_to(&mut self, value: u64) {
        if value < self.time {
            tracing::warn!(
                "Clock {} moved backwards from {} to {}",
                self.name,
                self.time,
                value
            );
        }
        self.time = value;
    }
}
