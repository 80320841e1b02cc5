//! Fact-record builders - one external query per record.
//!
//! Each builder performs a single query group and fails as a unit; a key
//! missing inside a successfully built record is a field-level concern
//! handled later by the sentinel extractors.

use std::fs;
use std::process::Command;

use anyhow::{Context, Result};

use crate::provider::FactRecord;

/// Build the OS fact record from os-release, uname and the kernel
/// commit limit.
pub fn os_record() -> Result<FactRecord> {
    let os_release = fs::read_to_string("/etc/os-release")
        .or_else(|_| fs::read_to_string("/usr/lib/os-release"))
        .context("Failed to read os-release")?;

    let mut record = parse_os_release(&os_release);
    record.insert("ARCHITECTURE", std::env::consts::ARCH);
    record.insert("KERNEL", kernel_release()?);

    if let Some(kb) = commit_limit_kb() {
        record.insert("COMMIT_LIMIT_KB", kb.to_string());
    }

    Ok(record)
}

/// Build the CPU fact record from lscpu's key/value output.
pub fn cpu_record() -> Result<FactRecord> {
    let output = Command::new("lscpu")
        .output()
        .context("Failed to execute lscpu")?;

    if !output.status.success() {
        anyhow::bail!("lscpu failed");
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let record = parse_key_value_table(&text);
    if record.is_empty() {
        anyhow::bail!("lscpu produced no facts");
    }

    Ok(record)
}

fn parse_os_release(text: &str) -> FactRecord {
    let mut record = FactRecord::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            record.insert(key.trim(), value.trim().trim_matches('"'));
        }
    }
    record
}

fn parse_key_value_table(text: &str) -> FactRecord {
    let mut record = FactRecord::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            record.insert(key.trim(), value.trim());
        }
    }
    record
}

fn kernel_release() -> Result<String> {
    let output = Command::new("uname")
        .arg("-r")
        .output()
        .context("Failed to execute uname")?;

    if !output.status.success() {
        anyhow::bail!("uname failed");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn commit_limit_kb() -> Option<u64> {
    let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
    meminfo
        .lines()
        .find(|line| line.starts_with("CommitLimit:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
}
