//! Runtime version resolution over a tree-shaped key/value store.
//!
//! A store root holds one node per registered runtime family (names
//! starting with `v`). Each node carries optional `Version`, `SP` and
//! `Install` values and named child nodes for individual releases or
//! profiles. Resolution walks the tree depth-first: a node with
//! qualifying children is a container and contributes nothing itself,
//! only its leaves become composite version strings. The service-pack
//! level is inherited downward until a node overrides it.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default root of the on-disk runtime version store.
pub const DEFAULT_RUNTIME_STORE: &str = "/etc/sysfacts/runtimes";

/// Child names that qualify for traversal: release years and the two
/// profile nodes.
static CHILD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}$|^Client$|^Full$").unwrap());

/// One node of the version store: value lookup plus child enumeration.
pub trait VersionNode: Sized {
    fn value(&self, key: &str) -> Option<String>;
    fn child_names(&self) -> Vec<String>;
    fn child(&self, name: &str) -> Option<Self>;
}

/// Resolve all installed runtime version strings under a store root.
///
/// Walks every top-level node whose name starts with `v` and discards
/// blank results (nodes that are registered but not installed).
pub fn installed_runtimes<N: VersionNode>(root: &N) -> Vec<String> {
    let mut versions = Vec::new();

    for name in root.child_names() {
        if !name.starts_with('v') {
            continue;
        }
        if let Some(node) = root.child(&name) {
            for full in resolve(&node, &name, "0", true) {
                if !full.trim().is_empty() {
                    versions.push(full);
                }
            }
        }
    }

    versions
}

/// Depth-first resolution of one node into composite version strings.
///
/// `inherited_sp` is the service-pack level propagated from the caller;
/// a node whose own `SP` is `"0"` (or absent) uses it instead.
/// `top_level` marks a fresh service-pack baseline: it stays set while
/// walking down through nodes that produced no candidate of their own.
///
/// A node with qualifying children emits only the children's results.
/// A leaf emits its own candidate, which is empty when the node is not
/// installed; callers filter blanks.
pub fn resolve<N: VersionNode>(
    node: &N,
    name: &str,
    inherited_sp: &str,
    top_level: bool,
) -> Vec<String> {
    let version = node.value("Version").unwrap_or_default();
    let install = node.value("Install").unwrap_or_default();
    let mut sp = node.value("SP").unwrap_or_else(|| "0".to_string());

    if sp == "0" {
        sp = inherited_sp.to_string();
    }

    let candidate = if sp != "0" && install == "1" {
        format!("{} {} SP{}", name, version, sp)
    } else if install == "1" {
        format!("{} {}", name, version)
    } else {
        String::new()
    };

    let top_level_initialized = !top_level || !candidate.is_empty();

    let mut resolved = Vec::new();
    for child_name in node.child_names() {
        if !CHILD_NAME.is_match(&child_name) {
            continue;
        }
        if let Some(child) = node.child(&child_name) {
            let child_label = format!("{} {}", name, child_name);
            resolved.extend(resolve(&child, &child_label, &sp, !top_level_initialized));
        }
    }

    if resolved.is_empty() {
        resolved.push(candidate);
    }

    resolved
}

/// In-memory version store node, for tests and programmatic registration.
#[derive(Debug, Clone, Default)]
pub struct MemoryNode {
    values: HashMap<String, String>,
    children: BTreeMap<String, MemoryNode>,
}

impl MemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, name: impl Into<String>, child: MemoryNode) -> Self {
        self.children.insert(name.into(), child);
        self
    }
}

impl VersionNode for MemoryNode {
    fn value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn child_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    fn child(&self, name: &str) -> Option<Self> {
        self.children.get(name).cloned()
    }
}

/// Directory-backed version store node.
///
/// Child directories are child nodes; the scalar values live in files
/// named `Version`, `SP` and `Install` inside each directory.
#[derive(Debug, Clone)]
pub struct DirNode {
    path: PathBuf,
}

impl DirNode {
    /// Open a store root, failing when the directory cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::read_dir(&path)
            .with_context(|| format!("Cannot read version store at {}", path.display()))?;
        Ok(Self { path })
    }
}

impl VersionNode for DirNode {
    fn value(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path.join(key))
            .ok()
            .map(|s| s.trim().to_string())
    }

    fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.path)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_dir())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn child(&self, name: &str) -> Option<Self> {
        let path = self.path.join(name);
        path.is_dir().then(|| Self { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(version: &str, sp: &str, install: &str) -> MemoryNode {
        MemoryNode::new()
            .with_value("Version", version)
            .with_value("SP", sp)
            .with_value("Install", install)
    }

    #[test]
    fn test_leaf_without_sp() {
        let root = MemoryNode::new().with_child(
            "v4",
            MemoryNode::new().with_child("Full", leaf("4.5.2", "0", "1")),
        );

        assert_eq!(installed_runtimes(&root), vec!["v4 Full 4.5.2"]);
    }

    #[test]
    fn test_leaf_with_sp() {
        let root = MemoryNode::new().with_child("v3.5", leaf("3.5", "1", "1"));

        assert_eq!(installed_runtimes(&root), vec!["v3.5 3.5 SP1"]);
    }

    #[test]
    fn test_parent_with_children_is_suppressed() {
        let parent = leaf("3.0", "0", "1")
            .with_child("Client", leaf("3.0.1", "0", "1"))
            .with_child("Full", leaf("3.0.2", "0", "1"));
        let root = MemoryNode::new().with_child("v3", parent);

        assert_eq!(
            installed_runtimes(&root),
            vec!["v3 Client 3.0.1", "v3 Full 3.0.2"]
        );
    }

    #[test]
    fn test_sp_inherited_from_ancestor() {
        let parent = leaf("3.5", "2", "1").with_child("Full", leaf("3.5.1", "0", "1"));
        let root = MemoryNode::new().with_child("v3.5", parent);

        assert_eq!(installed_runtimes(&root), vec!["v3.5 Full 3.5.1 SP2"]);
    }

    #[test]
    fn test_local_sp_overrides_inherited() {
        let parent = leaf("4.0", "2", "1").with_child("Full", leaf("4.0.1", "3", "1"));
        let root = MemoryNode::new().with_child("v4", parent);

        assert_eq!(installed_runtimes(&root), vec!["v4 Full 4.0.1 SP3"]);
    }

    #[test]
    fn test_not_installed_leaf_yields_empty_candidate() {
        let results = resolve(&leaf("2.0", "0", "0"), "v2", "0", true);
        assert_eq!(results, vec![String::new()]);
    }

    #[test]
    fn test_not_installed_is_filtered_by_store_walk() {
        let root = MemoryNode::new().with_child("v2", leaf("2.0", "0", "0"));
        assert!(installed_runtimes(&root).is_empty());
    }

    #[test]
    fn test_non_qualifying_children_are_ignored() {
        let parent = leaf("4.8", "0", "1")
            .with_child("Setup", leaf("9.9", "0", "1"))
            .with_child("12", leaf("9.9", "0", "1"));
        let root = MemoryNode::new().with_child("v4.8", parent);

        // Neither "Setup" nor "12" matches the child pattern, so the
        // parent itself is the effective leaf.
        assert_eq!(installed_runtimes(&root), vec!["v4.8 4.8"]);
    }

    #[test]
    fn test_year_children_qualify() {
        let parent = MemoryNode::new().with_child("2024", leaf("24.1", "0", "1"));
        let root = MemoryNode::new().with_child("v5", parent);

        assert_eq!(installed_runtimes(&root), vec!["v5 2024 24.1"]);
    }

    #[test]
    fn test_top_level_names_must_start_with_v() {
        let root = MemoryNode::new()
            .with_child("v4", leaf("4.0", "0", "1"))
            .with_child("Setup", leaf("1.0", "0", "1"));

        assert_eq!(installed_runtimes(&root), vec!["v4 4.0"]);
    }

    #[test]
    fn test_dir_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("v4").join("Full");
        fs::create_dir_all(&full).unwrap();
        fs::write(full.join("Version"), "4.5.2\n").unwrap();
        fs::write(full.join("SP"), "0\n").unwrap();
        fs::write(full.join("Install"), "1\n").unwrap();

        let root = DirNode::open(dir.path()).unwrap();
        assert_eq!(installed_runtimes(&root), vec!["v4 Full 4.5.2"]);
    }

    #[test]
    fn test_dir_store_missing_root() {
        assert!(DirNode::open("/nonexistent/sysfacts-store").is_err());
    }
}
