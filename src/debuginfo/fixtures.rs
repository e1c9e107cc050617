//! Reference debug-info traces.
//!
//! Each [`Scenario`] reproduces one of the synthetic traces used to exercise
//! debug-info analyses: an address space reset by `exec`, two processes on two
//! CPUs, and the build-id / debug-link combinations.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::config::TraceConfig;
use crate::debuginfo::{BinInfo, DebugInfoTraceWriter};
use crate::error::Result;

const BIN_MEMSZ: u64 = 0x10000;
/// Marker address inside a binary loaded at 0x400000.
const FOO_IP: u64 = 0x400100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// One process whose address space is replaced between two statedumps.
    Exec,
    /// Two processes, each on its own CPU, with build ids and debug links.
    TwoProcesses,
    /// Four processes covering every build-id / debug-link combination.
    BuildIdDebugLink,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::Exec,
        Scenario::TwoProcesses,
        Scenario::BuildIdDebugLink,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Exec => "exec",
            Scenario::TwoProcesses => "two-processes",
            Scenario::BuildIdDebugLink => "build-id-debug-link",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Scenario::Exec => "a process replaces its address space with exec",
            Scenario::TwoProcesses => "two processes doing a statedump on two CPUs",
            Scenario::BuildIdDebugLink => "binaries with and without build id and debug link",
        }
    }

    /// Number of CPUs the scenario writes to.
    pub fn min_cpus(self) -> u32 {
        match self {
            Scenario::Exec => 1,
            Scenario::TwoProcesses => 2,
            Scenario::BuildIdDebugLink => 4,
        }
    }

    /// Write the scenario's events. Does not flush.
    pub fn write(self, tw: &mut DebugInfoTraceWriter) -> Result<()> {
        match self {
            Scenario::Exec => write_exec(tw),
            Scenario::TwoProcesses => write_two_processes(tw),
            Scenario::BuildIdDebugLink => write_build_id_debug_link(tw),
        }
    }

    /// Write the complete trace to `output`. `num_cpus` below what the
    /// scenario needs is raised to [`Scenario::min_cpus`]; extra CPUs get
    /// empty streams.
    pub fn generate(
        self,
        output: &Path,
        num_cpus: u32,
        config: TraceConfig,
    ) -> Result<DebugInfoTraceWriter> {
        let num_cpus = num_cpus.max(self.min_cpus());
        info!(
            "Generating {} trace in {} with {} cpus",
            self.name(),
            output.display(),
            num_cpus
        );
        let mut tw = DebugInfoTraceWriter::with_config(output, num_cpus, config)?;
        self.write(&mut tw)?;
        tw.flush()?;
        Ok(tw)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Scenario::ALL.iter().map(|s| s.name()).collect();
                format!("unknown scenario '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

fn write_exec(tw: &mut DebugInfoTraceWriter) -> Result<()> {
    let vpid = 1337;

    tw.write_statedump_start(1, 0, vpid)?;
    tw.write_bin_info(2, 0, vpid, &BinInfo::new(0x400000, BIN_MEMSZ, "/tmp/foo"))?;
    tw.write_statedump_end(3, 0, vpid)?;
    tw.write_dummy_event(4, 0, vpid, FOO_IP)?;

    // exec: the second statedump replaces the whole address space
    tw.write_statedump_start(5, 0, vpid)?;
    tw.write_bin_info(6, 0, vpid, &BinInfo::new(0x500000, BIN_MEMSZ, "/tmp/bar"))?;
    tw.write_statedump_end(7, 0, vpid)?;
    tw.write_dummy_event(8, 0, vpid, FOO_IP)?;
    tw.write_dummy_event(9, 0, vpid, 0x500100)
}

fn write_two_processes(tw: &mut DebugInfoTraceWriter) -> Result<()> {
    let (vpid1, vpid2) = (1337, 2001);
    let foo = BinInfo::new(0x400000, BIN_MEMSZ, "/tmp/foo")
        .with_build_id()
        .with_debug_link();
    let bar = BinInfo::new(0x400000, BIN_MEMSZ, "/tmp/bar")
        .with_build_id()
        .with_debug_link();

    tw.write_statedump_start(1, 0, vpid1)?;
    tw.write_statedump_start(2, 1, vpid2)?;
    tw.write_bin_info(3, 0, vpid1, &foo)?;
    tw.write_bin_info(4, 1, vpid2, &bar)?;
    tw.write_build_id(5, 0, vpid1, foo.baddr, &"aa".repeat(20))?;
    tw.write_build_id(6, 1, vpid2, bar.baddr, &"bb".repeat(20))?;
    tw.write_debug_link(7, 0, vpid1, foo.baddr, 0, "/tmp/debuglink1")?;
    tw.write_debug_link(8, 1, vpid2, bar.baddr, 0, "/tmp/debuglink2")?;
    tw.write_statedump_end(9, 0, vpid1)?;
    tw.write_statedump_end(10, 1, vpid2)?;

    tw.write_dummy_event(11, 0, vpid1, FOO_IP)?;
    tw.write_dummy_event(12, 1, vpid2, FOO_IP)
}

/// One process of the build-id / debug-link matrix.
struct MatrixEntry<'a> {
    cpu_id: u32,
    vpid: i32,
    path: &'a str,
    build_id: Option<&'a str>,
    debug_link: Option<&'a str>,
}

fn write_build_id_debug_link(tw: &mut DebugInfoTraceWriter) -> Result<()> {
    let build_id_a = "aa".repeat(20);
    let build_id_b = "bb".repeat(20);
    let entries = [
        MatrixEntry {
            cpu_id: 0,
            vpid: 1337,
            path: "/tmp/foo_nn",
            build_id: None,
            debug_link: None,
        },
        MatrixEntry {
            cpu_id: 1,
            vpid: 1338,
            path: "/tmp/foo_yn",
            build_id: Some(build_id_a.as_str()),
            debug_link: None,
        },
        MatrixEntry {
            cpu_id: 2,
            vpid: 1339,
            path: "/tmp/foo_ny",
            build_id: None,
            debug_link: Some("/tmp/debug_link1"),
        },
        MatrixEntry {
            cpu_id: 3,
            vpid: 1340,
            path: "/tmp/foo_yy",
            build_id: Some(build_id_b.as_str()),
            debug_link: Some("/tmp/debug_link2"),
        },
    ];

    let baddr = 0x400000;
    let mut time_ms = 0;
    let mut tick = || {
        time_ms += 1;
        time_ms
    };

    for entry in &entries {
        let bin = BinInfo {
            has_build_id: entry.build_id.is_some(),
            has_debug_link: entry.debug_link.is_some(),
            ..BinInfo::new(baddr, BIN_MEMSZ, entry.path)
        };

        tw.write_statedump_start(tick(), entry.cpu_id, entry.vpid)?;
        tw.write_bin_info(tick(), entry.cpu_id, entry.vpid, &bin)?;
        if let Some(build_id) = entry.build_id {
            tw.write_build_id(tick(), entry.cpu_id, entry.vpid, baddr, build_id)?;
        }
        if let Some(debug_link) = entry.debug_link {
            tw.write_debug_link(tick(), entry.cpu_id, entry.vpid, baddr, 0, debug_link)?;
        }
        tw.write_statedump_end(tick(), entry.cpu_id, entry.vpid)?;
    }

    for entry in &entries {
        tw.write_dummy_event(tick(), entry.cpu_id, entry.vpid, FOO_IP)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event_counts(tw: &DebugInfoTraceWriter) -> Vec<usize> {
        tw.writer().streams().map(|s| s.events().len()).collect()
    }

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>(), Ok(scenario));
        }
        assert!("fork".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_exec_event_count() {
        let dir = TempDir::new().unwrap();
        let tw = Scenario::Exec
            .generate(dir.path(), 1, TraceConfig::default())
            .expect("Failed to generate exec trace");
        assert_eq!(event_counts(&tw), vec![9]);
        assert_eq!(tw.writer().clock().time(), 9_000_000);
    }

    #[test]
    fn test_two_processes_event_count() {
        let dir = TempDir::new().unwrap();
        let tw = Scenario::TwoProcesses
            .generate(dir.path(), 1, TraceConfig::default())
            .expect("Failed to generate two-processes trace");
        assert_eq!(event_counts(&tw), vec![6, 6]);
    }

    #[test]
    fn test_build_id_debug_link_event_count() {
        let dir = TempDir::new().unwrap();
        let tw = Scenario::BuildIdDebugLink
            .generate(dir.path(), 6, TraceConfig::default())
            .expect("Failed to generate build-id-debug-link trace");
        assert_eq!(event_counts(&tw), vec![4, 5, 5, 6, 0, 0]);
        assert_eq!(tw.writer().clock().time(), 20_000_000);
        assert!(dir.path().join("test_stream_5").is_file());
    }
}
