//! Common test utilities for synthtrace integration tests.
//!
//! [`read_packet`] decodes a stream file written by `DebugInfoTraceWriter`.
//! It only knows the statedump layout, where every field is byte aligned, so
//! it never has to skip padding inside the content.

#![allow(dead_code)]

use std::path::Path;

pub const CTF_MAGIC: u32 = 0xC1FC_1FC1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    DummyEvent,
    BinInfo {
        baddr: u64,
        memsz: u64,
        path: String,
        is_pic: u8,
        has_build_id: u8,
        has_debug_link: u8,
    },
    BuildId {
        baddr: u64,
        length: u64,
        build_id: Vec<u8>,
    },
    DebugLink {
        baddr: u64,
        crc: u32,
        filename: String,
    },
    StatedumpEnd,
    StatedumpStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub id: u32,
    pub timestamp: u64,
    pub ip: u64,
    pub vpid: i32,
    pub payload: Payload,
}

#[derive(Debug)]
pub struct DecodedPacket {
    pub magic: u32,
    pub uuid: [u8; 16],
    pub stream_id: u32,
    pub timestamp_begin: u64,
    pub timestamp_end: u64,
    pub content_size: u64,
    pub packet_size: u64,
    pub events_discarded: u64,
    pub cpu_id: u32,
    pub events: Vec<DecodedEvent>,
    pub len: usize,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let out: [u8; N] = self.bytes[self.pos..self.pos + N]
            .try_into()
            .expect("Packet truncated");
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u32(&mut self) -> u32 {
        let b = self.take::<4>();
        if self.big_endian {
            u32::from_be_bytes(b)
        } else {
            u32::from_le_bytes(b)
        }
    }

    fn i32(&mut self) -> i32 {
        self.u32() as i32
    }

    fn u64(&mut self) -> u64 {
        let b = self.take::<8>();
        if self.big_endian {
            u64::from_be_bytes(b)
        } else {
            u64::from_le_bytes(b)
        }
    }

    fn string(&mut self) -> String {
        let end = self.bytes[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .expect("Unterminated string");
        let s = String::from_utf8(self.bytes[self.pos..self.pos + end].to_vec())
            .expect("Invalid UTF-8 string");
        self.pos += end + 1;
        s
    }
}

/// Decode a statedump stream packet.
pub fn decode_packet(bytes: &[u8], big_endian: bool) -> DecodedPacket {
    let mut c = Cursor {
        bytes,
        pos: 0,
        big_endian,
    };

    let magic = c.u32();
    let uuid = c.take::<16>();
    let stream_id = c.u32();
    let timestamp_begin = c.u64();
    let timestamp_end = c.u64();
    let content_size = c.u64();
    let packet_size = c.u64();
    let events_discarded = c.u64();
    let cpu_id = c.u32();

    let content_end = (content_size / 8) as usize;
    let mut events = Vec::new();
    while c.pos < content_end {
        let id = c.u32();
        let timestamp = c.u64();
        let ip = c.u64();
        let vpid = c.i32();
        let payload = match id {
            0 => Payload::DummyEvent,
            1 => Payload::BinInfo {
                baddr: c.u64(),
                memsz: c.u64(),
                path: c.string(),
                is_pic: c.u8(),
                has_build_id: c.u8(),
                has_debug_link: c.u8(),
            },
            2 => {
                let baddr = c.u64();
                let length = c.u64();
                let build_id = (0..length).map(|_| c.u8()).collect();
                Payload::BuildId {
                    baddr,
                    length,
                    build_id,
                }
            }
            3 => Payload::DebugLink {
                baddr: c.u64(),
                crc: c.u32(),
                filename: c.string(),
            },
            4 => Payload::StatedumpEnd,
            5 => Payload::StatedumpStart,
            other => panic!("Unknown event id {other}"),
        };
        events.push(DecodedEvent {
            id,
            timestamp,
            ip,
            vpid,
            payload,
        });
    }
    assert_eq!(c.pos, content_end, "Event decoding overran content_size");

    DecodedPacket {
        magic,
        uuid,
        stream_id,
        timestamp_begin,
        timestamp_end,
        content_size,
        packet_size,
        events_discarded,
        cpu_id,
        events,
        len: bytes.len(),
    }
}

/// Read and decode `<trace_dir>/test_stream_<cpu>`.
pub fn read_packet(trace_dir: &Path, cpu: u32) -> DecodedPacket {
    read_packet_with_order(trace_dir, cpu, false)
}

pub fn read_packet_with_order(trace_dir: &Path, cpu: u32, big_endian: bool) -> DecodedPacket {
    let path = trace_dir.join(format!("test_stream_{cpu}"));
    let bytes = std::fs::read(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    decode_packet(&bytes, big_endian)
}

/// Names of the files in a trace directory, sorted.
pub fn trace_files(trace_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(trace_dir)
        .expect("Failed to read trace directory")
        .map(|entry| {
            entry
                .expect("Failed to read directory entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
