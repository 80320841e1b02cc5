//! Sysfacts - resilient machine-fact aggregation.
//!
//! Collects machine identification and diagnostic attributes from
//! failure-prone sources (procfs, sysfs, external tools) into a single
//! ordered, best-effort report. A missing field never aborts a report:
//! field lookups fall back to sentinels, whole probe groups degrade to a
//! single fallback entry, and hardware-identity probes run concurrently
//! behind one aggregation point.

pub mod facts;
pub mod format;
pub mod hwid;
pub mod identification;
pub mod provider;
pub mod report;
pub mod versions;

pub use identification::{IdentificationAggregator, IdentitySource, MachineIdentification};
pub use report::{build_report, build_report_with_store, ReportEntry};
pub use versions::DEFAULT_RUNTIME_STORE;
