//! Integration tests for the debug-info reference traces.
//!
//! Each test generates a scenario into a temporary directory and decodes the
//! stream files back to check what a debug-info analysis would see.

mod common;

use common::{read_packet, read_packet_with_order, trace_files, Payload, CTF_MAGIC};
use synthtrace::ctf::ByteOrder;
use synthtrace::debuginfo::fixtures::Scenario;
use synthtrace::debuginfo::{BinInfo, DebugInfoTraceWriter};
use synthtrace::{TraceConfig, TraceError};
use tempfile::TempDir;

fn generate(scenario: Scenario, cpus: u32) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    scenario
        .generate(dir.path(), cpus, TraceConfig::default())
        .expect("Failed to generate trace");
    dir
}

#[test]
fn test_exec_preserves_statedump_windows() {
    let dir = generate(Scenario::Exec, 1);
    let packet = read_packet(dir.path(), 0);

    assert_eq!(packet.magic, CTF_MAGIC);
    assert_eq!(packet.cpu_id, 0);
    assert_eq!(packet.events.len(), 9);

    let kinds: Vec<u32> = packet.events.iter().map(|e| e.id).collect();
    // start, bin_info, end, marker, start, bin_info, end, marker, marker
    assert_eq!(kinds, vec![5, 1, 4, 0, 5, 1, 4, 0, 0]);

    let timestamps: Vec<u64> = packet.events.iter().map(|e| e.timestamp).collect();
    assert_eq!(timestamps, (1..=9).map(|ms| ms * 1_000_000).collect::<Vec<_>>());
    assert!(packet.events.iter().all(|e| e.vpid == 1337));

    // The first marker falls inside the first window's mapping only
    let Payload::BinInfo { baddr, memsz, path, .. } = &packet.events[1].payload else {
        panic!("Expected bin_info, got {:?}", packet.events[1].payload);
    };
    assert_eq!((path.as_str(), *baddr), ("/tmp/foo", 0x400000));
    assert!((*baddr..baddr + memsz).contains(&packet.events[3].ip));

    // After the second window opens, only /tmp/bar is mapped
    let Payload::BinInfo { baddr, memsz, path, .. } = &packet.events[5].payload else {
        panic!("Expected bin_info, got {:?}", packet.events[5].payload);
    };
    assert_eq!((path.as_str(), *baddr), ("/tmp/bar", 0x500000));
    assert_eq!(packet.events[7].ip, 0x400100);
    assert!(!(*baddr..baddr + memsz).contains(&packet.events[7].ip));
    assert!((*baddr..baddr + memsz).contains(&packet.events[8].ip));

    assert_eq!(packet.timestamp_begin, 1_000_000);
    assert_eq!(packet.timestamp_end, 9_000_000);
}

#[test]
fn test_two_processes_are_separate_streams() {
    let dir = generate(Scenario::TwoProcesses, 2);
    assert_eq!(
        trace_files(dir.path()),
        vec!["metadata", "test_stream_0", "test_stream_1"]
    );

    for (cpu, vpid, path, byte, link) in [
        (0u32, 1337, "/tmp/foo", 0xaau8, "/tmp/debuglink1"),
        (1, 2001, "/tmp/bar", 0xbb, "/tmp/debuglink2"),
    ] {
        let packet = read_packet(dir.path(), cpu);
        assert_eq!(packet.cpu_id, cpu);
        assert_eq!(packet.events.len(), 6);
        assert!(packet.events.iter().all(|e| e.vpid == vpid));

        // Append order is kept within the stream
        let timestamps: Vec<u64> = packet.events.iter().map(|e| e.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_unstable();
        assert_eq!(timestamps, sorted);

        assert!(matches!(
            &packet.events[1].payload,
            Payload::BinInfo { path: p, has_build_id: 1, has_debug_link: 1, .. } if p == path
        ));
        assert_eq!(
            packet.events[2].payload,
            Payload::BuildId {
                baddr: 0x400000,
                length: 20,
                build_id: vec![byte; 20],
            }
        );
        assert_eq!(
            packet.events[3].payload,
            Payload::DebugLink {
                baddr: 0x400000,
                crc: 0,
                filename: link.to_string(),
            }
        );
        assert_eq!(packet.events[5].ip, 0x400100);
    }
}

#[test]
fn test_build_id_debug_link_matrix() {
    let dir = generate(Scenario::BuildIdDebugLink, 4);

    let expected = [
        (1337, "/tmp/foo_nn", None, None),
        (1338, "/tmp/foo_yn", Some(0xaau8), None),
        (1339, "/tmp/foo_ny", None, Some("/tmp/debug_link1")),
        (1340, "/tmp/foo_yy", Some(0xbb), Some("/tmp/debug_link2")),
    ];

    let mut total = 0;
    for (cpu, (vpid, path, build_id, debug_link)) in expected.into_iter().enumerate() {
        let packet = read_packet(dir.path(), cpu as u32);
        total += packet.events.len();
        assert!(packet.events.iter().all(|e| e.vpid == vpid));

        let (has_build_id, has_debug_link) = packet
            .events
            .iter()
            .find_map(|e| match &e.payload {
                Payload::BinInfo {
                    path: p,
                    has_build_id,
                    has_debug_link,
                    ..
                } => {
                    assert_eq!(p, path);
                    Some((*has_build_id, *has_debug_link))
                }
                _ => None,
            })
            .expect("Missing bin_info");

        let build_ids: Vec<&Payload> = packet
            .events
            .iter()
            .map(|e| &e.payload)
            .filter(|p| matches!(p, Payload::BuildId { .. }))
            .collect();
        let debug_links: Vec<&Payload> = packet
            .events
            .iter()
            .map(|e| &e.payload)
            .filter(|p| matches!(p, Payload::DebugLink { .. }))
            .collect();

        // Flags match exactly the follow-up events written for this process
        assert_eq!(has_build_id == 1, !build_ids.is_empty());
        assert_eq!(has_debug_link == 1, !debug_links.is_empty());

        match build_id {
            Some(byte) => assert_eq!(
                build_ids,
                vec![&Payload::BuildId {
                    baddr: 0x400000,
                    length: 20,
                    build_id: vec![byte; 20],
                }]
            ),
            None => assert!(build_ids.is_empty()),
        }
        match debug_link {
            Some(link) => assert!(matches!(
                debug_links[..],
                [Payload::DebugLink { filename, .. }] if filename == link
            )),
            None => assert!(debug_links.is_empty()),
        }

        let marker = packet.events.last().expect("Missing marker");
        assert_eq!(marker.id, 0);
        assert_eq!(marker.ip, 0x400100);
        assert_eq!(marker.timestamp, (17 + cpu as u64) * 1_000_000);
    }
    assert_eq!(total, 20);
}

#[test]
fn test_interleaved_writes_stay_per_partition() {
    let dir = TempDir::new().unwrap();
    let mut tw = DebugInfoTraceWriter::new(dir.path(), 2).unwrap();
    for ms in 1..=10u64 {
        let cpu = (ms % 2) as u32;
        tw.write_dummy_event(ms, cpu, 100 + cpu as i32, ms).unwrap();
    }
    tw.flush().unwrap();

    for cpu in 0..2u32 {
        let packet = read_packet(dir.path(), cpu);
        let ips: Vec<u64> = packet.events.iter().map(|e| e.ip).collect();
        let expected: Vec<u64> = (1..=10).filter(|ms| ms % 2 == u64::from(cpu)).collect();
        assert_eq!(ips, expected);
        assert!(packet.events.iter().all(|e| e.vpid == 100 + cpu as i32));
    }
}

#[test]
fn test_build_id_length_is_half_hex_length() {
    let dir = TempDir::new().unwrap();
    let mut tw = DebugInfoTraceWriter::new(dir.path(), 1).unwrap();
    tw.write_build_id(1, 0, 1, 0x1000, "0011223344").unwrap();
    tw.write_build_id(2, 0, 1, 0x2000, "").unwrap();
    tw.flush().unwrap();

    let packet = read_packet(dir.path(), 0);
    assert_eq!(
        packet.events[0].payload,
        Payload::BuildId {
            baddr: 0x1000,
            length: 5,
            build_id: vec![0x00, 0x11, 0x22, 0x33, 0x44],
        }
    );
    assert_eq!(
        packet.events[1].payload,
        Payload::BuildId {
            baddr: 0x2000,
            length: 0,
            build_id: vec![],
        }
    );
}

#[test]
fn test_malformed_build_id_rejected_without_mutation() {
    let dir = TempDir::new().unwrap();
    let mut tw = DebugInfoTraceWriter::new(dir.path(), 1).unwrap();
    tw.write_statedump_start(1, 0, 1337).unwrap();

    for bad in ["abc", "xyz0", "aa bb"] {
        let err = tw.write_build_id(2, 0, 1337, 0x400000, bad).unwrap_err();
        assert!(matches!(err, TraceError::InvalidHex { .. }), "{bad}: {err}");
    }
    tw.flush().unwrap();

    let packet = read_packet(dir.path(), 0);
    assert_eq!(packet.events.len(), 1);
    assert_eq!(packet.timestamp_end, 1_000_000);
}

#[test]
fn test_packet_sizes_and_header() {
    let uuid = uuid::Uuid::parse_str("4fd5a3e2-3fbd-4a55-8b1c-4e0a7f2f8b10").unwrap();
    let config = TraceConfig {
        trace_uuid: Some(uuid),
        ..TraceConfig::default()
    };
    let dir = TempDir::new().unwrap();
    let tw = Scenario::Exec.generate(dir.path(), 1, config).unwrap();

    let packet = read_packet(dir.path(), 0);
    assert_eq!(packet.uuid, *uuid.as_bytes());
    assert_eq!(packet.stream_id, 0);
    assert_eq!(packet.events_discarded, 0);
    assert_eq!(packet.len, 4096);
    assert_eq!(packet.packet_size, 4096 * 8);
    assert!(packet.content_size < packet.packet_size);
    assert_eq!(packet.content_size % 8, 0);

    let metadata = std::fs::read_to_string(dir.path().join("metadata")).unwrap();
    assert!(metadata.contains("uuid = \"4fd5a3e2-3fbd-4a55-8b1c-4e0a7f2f8b10\";"));
    assert_eq!(metadata, tw.metadata());
}

#[test]
fn test_big_endian_trace() {
    let config = TraceConfig {
        byte_order: ByteOrder::Big,
        ..TraceConfig::default()
    };
    let dir = TempDir::new().unwrap();
    Scenario::TwoProcesses
        .generate(dir.path(), 2, config)
        .unwrap();

    let bytes = std::fs::read(dir.path().join("test_stream_1")).unwrap();
    assert_eq!(&bytes[0..4], &[0xC1, 0xFC, 0x1F, 0xC1]);

    let packet = read_packet_with_order(dir.path(), 1, true);
    assert_eq!(packet.cpu_id, 1);
    assert_eq!(packet.events.len(), 6);
    assert!(packet.events.iter().all(|e| e.vpid == 2001));

    let metadata = std::fs::read_to_string(dir.path().join("metadata")).unwrap();
    assert!(metadata.contains("\tbyte_order = be;"));
}

#[test]
fn test_extra_cpus_get_empty_streams() {
    let dir = generate(Scenario::Exec, 3);
    assert_eq!(
        trace_files(dir.path()),
        vec!["metadata", "test_stream_0", "test_stream_1", "test_stream_2"]
    );
    let empty = read_packet(dir.path(), 2);
    assert!(empty.events.is_empty());
    assert_eq!(empty.timestamp_begin, 0);
    assert_eq!(empty.timestamp_end, 0);
    assert_eq!(empty.cpu_id, 2);
}

#[test]
fn test_zero_cpus_writes_only_metadata() {
    let dir = TempDir::new().unwrap();
    let mut tw = DebugInfoTraceWriter::new(dir.path(), 0).unwrap();
    let err = tw.write_statedump_start(1, 0, 1).unwrap_err();
    assert!(matches!(err, TraceError::UnknownPartition(0)));
    tw.flush().unwrap();

    assert_eq!(trace_files(dir.path()), vec!["metadata"]);
    let metadata = std::fs::read_to_string(dir.path().join("metadata")).unwrap();
    assert!(metadata.starts_with("/* CTF 1.8 */"));
    assert!(metadata.contains("name = \"lttng_ust_statedump:bin_info\";"));
}

#[test]
fn test_writes_after_flush_rejected() {
    let dir = TempDir::new().unwrap();
    let mut tw = DebugInfoTraceWriter::new(dir.path(), 1).unwrap();
    let bin = BinInfo::new(0x400000, 0x1000, "/tmp/foo");
    tw.write_bin_info(1, 0, 1, &bin).unwrap();
    tw.flush().unwrap();

    assert!(matches!(tw.flush(), Err(TraceError::AlreadyFlushed)));
    assert!(matches!(
        tw.write_bin_info(2, 0, 1, &bin),
        Err(TraceError::AlreadyFlushed)
    ));
    assert_eq!(read_packet(dir.path(), 0).events.len(), 1);
}
