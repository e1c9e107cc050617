//! Writer configuration.
//!
//! Every knob has a default matching what CTF readers expect from an LTTng-UST
//! trace, so `TraceConfig::default()` is what the fixtures use. A JSON file can
//! override any subset of the fields.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ctf::constants::{DEFAULT_CLOCK_FREQUENCY, DEFAULT_PACKET_ALIGNMENT};
use crate::ctf::types::ByteOrder;
use crate::error::{Result, TraceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Byte order of every integer in the packets.
    pub byte_order: ByteOrder,

    /// Packets are zero-padded to a multiple of this many bytes.
    /// Must be a power of two.
    pub packet_alignment: usize,

    /// Trace UUID written to the metadata and every packet header.
    /// A random v4 UUID is generated when unset.
    pub trace_uuid: Option<Uuid>,

    /// Clock frequency in Hz.
    pub clock_frequency: u64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Little,
            packet_alignment: DEFAULT_PACKET_ALIGNMENT,
            trace_uuid: None,
            // 1 GHz, one tick per nanosecond
            clock_frequency: DEFAULT_CLOCK_FREQUENCY,
        }
    }
}

impl TraceConfig {
    /// Load a configuration from a JSON file. Missing fields take their default.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| TraceError::io(path, e))?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|source| TraceError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.packet_alignment.is_power_of_two() {
            return Err(TraceError::InvalidConfig(format!(
                "packet_alignment must be a power of two, got {}",
                self.packet_alignment
            )));
        }
        if self.clock_frequency == 0 {
            return Err(TraceError::InvalidConfig(
                "clock_frequency must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
