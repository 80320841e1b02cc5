//! Report assembly - the ordered, best-effort machine report.
//!
//! Sections are appended in a fixed order. Every probe group is isolated:
//! a group that fails is replaced by a single fallback entry (or omitted,
//! for the memory stats) and later groups still run.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::{debug, warn};

use crate::facts;
use crate::format::{format_bytes, format_duration_secs};
use crate::provider::{string_value, u64_value, FactRecord, NOT_AVAILABLE};
use crate::versions::{installed_runtimes, DirNode, DEFAULT_RUNTIME_STORE};

/// Fallback value for a probe group that failed as a whole.
const GROUP_FALLBACK: &str = "n/a, please contact support";

/// Header label for the runtime version list.
const RUNTIMES_HEADER: &str = "Installed runtimes";

/// One labeled line of the report. An empty label marks a continuation
/// line under the preceding group header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub label: String,
    pub value: String,
}

impl ReportEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Assemble the report against the default runtime version store.
pub fn build_report() -> Vec<ReportEntry> {
    build_report_with_store(Path::new(DEFAULT_RUNTIME_STORE))
}

/// Assemble the full machine report.
///
/// Always returns a non-empty sequence; duplicates are legal and order
/// is significant.
pub fn build_report_with_store(runtime_store: &Path) -> Vec<ReportEntry> {
    debug!("Building machine report");

    let mut items = Vec::new();

    append_environment(&mut items);
    append_os_facts(&mut items, facts::os_record());
    append_memory(&mut items, memory_stats());
    append_cpu_facts(&mut items, facts::cpu_record());
    append_uptimes(&mut items);
    items.push(ReportEntry::new("Current locale", current_locale()));
    append_runtimes(&mut items, DirNode::open(runtime_store));

    debug!("Machine report complete: {} entries", items.len());

    items
}

/// Direct environment facts; none of these can fail.
fn append_environment(items: &mut Vec<ReportEntry>) {
    items.push(ReportEntry::new(
        "User name",
        env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
    ));
    items.push(ReportEntry::new("User domain name", domain_name()));
    items.push(ReportEntry::new(
        "Machine name",
        System::host_name().unwrap_or_else(|| "unknown".to_string()),
    ));
    items.push(ReportEntry::new("OS version", os_version_string()));
    items.push(ReportEntry::new(
        "Collector version",
        env!("CARGO_PKG_VERSION"),
    ));
}

fn append_os_facts(items: &mut Vec<ReportEntry>, record: anyhow::Result<FactRecord>) {
    match record {
        Ok(os) => {
            items.push(ReportEntry::new("OS name", string_value(&os, "PRETTY_NAME")));
            items.push(ReportEntry::new(
                "Architecture",
                string_value(&os, "ARCHITECTURE"),
            ));
            items.push(ReportEntry::new("Kernel", string_value(&os, "KERNEL")));
            items.push(ReportEntry::new("Build", string_value(&os, "BUILD_ID")));
            items.push(ReportEntry::new(
                "Max process memory",
                format_bytes(u64_value(&os, "COMMIT_LIMIT_KB") * 1024),
            ));
        }
        Err(e) => {
            warn!("Failed to retrieve OS information: {:#}", e);
            items.push(ReportEntry::new("OS info", GROUP_FALLBACK));
        }
    }
}

fn append_memory(items: &mut Vec<ReportEntry>, stats: Option<(u64, u64)>) {
    // Unlike the other groups there is no fallback entry here; a host
    // that cannot report memory simply has no memory rows.
    if let Some((total, available)) = stats {
        items.push(ReportEntry::new("Total memory", format_bytes(total)));
        items.push(ReportEntry::new(
            "Available memory",
            format_bytes(available),
        ));
    }
}

fn append_cpu_facts(items: &mut Vec<ReportEntry>, record: anyhow::Result<FactRecord>) {
    match record {
        Ok(cpu) => {
            items.push(ReportEntry::new("CPU name", string_value(&cpu, "Model name")));
            items.push(ReportEntry::new("Vendor", string_value(&cpu, "Vendor ID")));
            items.push(ReportEntry::new(
                "Address sizes",
                string_value(&cpu, "Address sizes"),
            ));
            items.push(ReportEntry::new(
                "Max clock speed (MHz)",
                string_value(&cpu, "CPU max MHz"),
            ));
            items.push(ReportEntry::new(
                "Cores per socket",
                string_value(&cpu, "Core(s) per socket"),
            ));
            items.push(ReportEntry::new(
                "Threads per core",
                string_value(&cpu, "Thread(s) per core"),
            ));
            items.push(ReportEntry::new(
                "Logical processors",
                string_value(&cpu, "CPU(s)"),
            ));
        }
        Err(e) => {
            warn!("Failed to retrieve CPU information: {:#}", e);
            items.push(ReportEntry::new("CPU info", GROUP_FALLBACK));
        }
    }
}

fn append_uptimes(items: &mut Vec<ReportEntry>) {
    items.push(ReportEntry::new(
        "System up time",
        system_uptime_secs()
            .map(format_duration_secs)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    ));
    items.push(ReportEntry::new(
        "Process up time",
        format_duration_secs(process_uptime_secs()),
    ));
}

fn append_runtimes(items: &mut Vec<ReportEntry>, store: anyhow::Result<DirNode>) {
    items.push(ReportEntry::new(RUNTIMES_HEADER, ""));

    match store {
        Ok(root) => {
            for version in installed_runtimes(&root) {
                items.push(ReportEntry::new("", version));
            }
        }
        Err(e) => {
            warn!("Failed to read runtime version store: {:#}", e);
        }
    }
}

fn domain_name() -> String {
    fs::read_to_string("/proc/sys/kernel/domainname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(none)".to_string())
}

fn os_version_string() -> String {
    System::long_os_version()
        .or_else(System::os_version)
        .unwrap_or_else(|| env::consts::OS.to_string())
}

fn memory_stats() -> Option<(u64, u64)> {
    let mut sys = System::new();
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return None;
    }

    Some((total, sys.available_memory()))
}

fn system_uptime_secs() -> Option<u64> {
    fs::read_to_string("/proc/uptime")
        .ok()?
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
        .map(|secs| secs as u64)
}

fn process_uptime_secs() -> u64 {
    sysinfo::get_current_pid()
        .ok()
        .and_then(|pid| {
            let mut sys = System::new();
            sys.refresh_process(pid);
            sys.process(pid).map(|p| p.run_time())
        })
        .unwrap_or(0)
}

fn current_locale() -> String {
    env::var("LC_ALL")
        .or_else(|_| env::var("LANG"))
        .unwrap_or_else(|_| "C".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[ReportEntry]) -> Vec<&str> {
        items.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn test_environment_facts_always_present() {
        let mut items = Vec::new();
        append_environment(&mut items);

        assert_eq!(
            labels(&items),
            vec![
                "User name",
                "User domain name",
                "Machine name",
                "OS version",
                "Collector version"
            ]
        );
        assert!(items.iter().all(|e| !e.value.is_empty()));
    }

    #[test]
    fn test_os_group_failure_collapses_to_single_entry() {
        let mut items = Vec::new();
        append_os_facts(&mut items, Err(anyhow::anyhow!("wmi gone")));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0], ReportEntry::new("OS info", GROUP_FALLBACK));
    }

    #[test]
    fn test_os_group_missing_key_yields_sentinel_field() {
        let mut record = FactRecord::new();
        record.insert("PRETTY_NAME", "Arch Linux");

        let mut items = Vec::new();
        append_os_facts(&mut items, Ok(record));

        assert_eq!(items[0], ReportEntry::new("OS name", "Arch Linux"));
        assert_eq!(items[3], ReportEntry::new("Build", NOT_AVAILABLE));
        // Missing commit limit formats as zero bytes, not a crash.
        assert_eq!(items[4], ReportEntry::new("Max process memory", "0 bytes"));
    }

    #[test]
    fn test_cpu_group_failure_collapses_to_single_entry() {
        let mut items = Vec::new();
        append_cpu_facts(&mut items, Err(anyhow::anyhow!("lscpu missing")));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0], ReportEntry::new("CPU info", GROUP_FALLBACK));
    }

    #[test]
    fn test_memory_rows_omitted_when_unavailable() {
        let mut items = Vec::new();
        append_memory(&mut items, None);
        assert!(items.is_empty());

        append_memory(&mut items, Some((8 * 1024 * 1024 * 1024, 1024 * 1024 * 1024)));
        assert_eq!(items[0], ReportEntry::new("Total memory", "8.0 GB"));
        assert_eq!(items[1], ReportEntry::new("Available memory", "1.0 GB"));
    }

    #[test]
    fn test_unreadable_store_keeps_header_and_no_rows() {
        let mut items = Vec::new();
        append_runtimes(&mut items, DirNode::open("/nonexistent/store"));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0], ReportEntry::new(RUNTIMES_HEADER, ""));
    }

    #[test]
    fn test_runtime_rows_are_continuation_lines() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("v4").join("Full");
        fs::create_dir_all(&full).unwrap();
        fs::write(full.join("Version"), "4.5.2").unwrap();
        fs::write(full.join("SP"), "0").unwrap();
        fs::write(full.join("Install"), "1").unwrap();

        let mut items = Vec::new();
        append_runtimes(&mut items, DirNode::open(dir.path()));

        assert_eq!(items[0], ReportEntry::new(RUNTIMES_HEADER, ""));
        assert_eq!(items[1], ReportEntry::new("", "v4 Full 4.5.2"));
    }
}
