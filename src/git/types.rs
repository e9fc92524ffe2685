//! Git data model shared by both backends
//!
//! Everything here crosses the native bridge as JSON, so field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Commit identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Status bucket a single path falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Modified,
    Added,
    Deleted,
    Untracked,
}

/// Full working tree status. A path lives in at most one of the four sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatusSnapshot {
    #[serde(default)]
    pub modified: BTreeSet<String>,
    #[serde(default)]
    pub added: BTreeSet<String>,
    #[serde(default)]
    pub deleted: BTreeSet<String>,
    #[serde(default)]
    pub untracked: BTreeSet<String>,
}

impl GitStatusSnapshot {
    /// Insert a path into exactly one bucket, evicting it from the others.
    pub fn insert(&mut self, kind: StatusKind, path: impl Into<String>) {
        let path = path.into();
        self.modified.remove(&path);
        self.added.remove(&path);
        self.deleted.remove(&path);
        self.untracked.remove(&path);
        match kind {
            StatusKind::Modified => self.modified.insert(path),
            StatusKind::Added => self.added.insert(path),
            StatusKind::Deleted => self.deleted.insert(path),
            StatusKind::Untracked => self.untracked.insert(path),
        };
    }

    pub fn kind_of(&self, path: &str) -> Option<StatusKind> {
        if self.modified.contains(path) {
            Some(StatusKind::Modified)
        } else if self.added.contains(path) {
            Some(StatusKind::Added)
        } else if self.deleted.contains(path) {
            Some(StatusKind::Deleted)
        } else if self.untracked.contains(path) {
            Some(StatusKind::Untracked)
        } else {
            None
        }
    }

    pub fn is_clean(&self) -> bool {
        self.modified.is_empty()
            && self.added.is_empty()
            && self.deleted.is_empty()
            && self.untracked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modified.len() + self.added.len() + self.deleted.len() + self.untracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_clean()
    }

    /// True when no path appears in two buckets. Holds for every snapshot
    /// built through [`GitStatusSnapshot::insert`]; decoded snapshots are
    /// checked with this before being handed out.
    pub fn is_partitioned(&self) -> bool {
        let sets = [&self.modified, &self.added, &self.deleted, &self.untracked];
        let mut seen = BTreeSet::new();
        sets.iter()
            .flat_map(|s| s.iter())
            .all(|path| seen.insert(path.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDescriptor {
    pub name: String,
    pub current: bool,
    pub commit: String,
}

/// Check that at most one branch in a listing is marked current.
pub fn has_single_current(branches: &[BranchDescriptor]) -> bool {
    branches.iter().filter(|b| b.current).count() <= 1
}

/// Git log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub id: String,
    pub message: String,
    pub author: String,
    #[serde(default)]
    pub email: String,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInfo {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
    pub index: usize,
    pub message: String,
}

/// git show 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowResult {
    pub commit: CommitInfo,
    /// name-status listing
    pub diff: String,
    pub patch: String,
}

/// Outcome of merge / rebase / cherry-pick / revert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MergeResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub root: String,
    pub current_branch: Option<String>,
    pub head: Option<String>,
    #[serde(default)]
    pub remotes: Vec<RemoteInfo>,
    pub is_clean: bool,
}

// ============================================================================
// Option bags
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default)]
    pub amend: bool,
}

/// fetch / pull / push 参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl RemoteOptions {
    pub fn remote_or_default(&self) -> &str {
        self.remote.as_deref().unwrap_or("origin")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_point: Option<String>,
    #[serde(default)]
    pub checkout: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMode {
    Soft,
    #[default]
    Mixed,
    Hard,
}

impl ResetMode {
    pub fn as_flag(&self) -> &'static str {
        match self {
            ResetMode::Soft => "--soft",
            ResetMode::Mixed => "--mixed",
            ResetMode::Hard => "--hard",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOptions {
    #[serde(default)]
    pub mode: ResetMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub name_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unified: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    #[serde(default)]
    pub no_ff: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onto: Option<String>,
    #[serde(default)]
    pub abort: bool,
    #[serde(rename = "continue", default)]
    pub continue_rebase: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickOptions {
    #[serde(default)]
    pub no_commit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub include_untracked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOptions {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub directories: bool,
    #[serde(default)]
    pub ignored: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Zip,
    Tar,
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOptions {
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub format: ArchiveFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_buckets_disjoint() {
        let mut snapshot = GitStatusSnapshot::default();
        snapshot.insert(StatusKind::Untracked, "a.txt");
        snapshot.insert(StatusKind::Added, "a.txt");
        snapshot.insert(StatusKind::Modified, "b.txt");

        assert_eq!(snapshot.kind_of("a.txt"), Some(StatusKind::Added));
        assert!(snapshot.untracked.is_empty());
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.is_partitioned());
    }

    #[test]
    fn test_decoded_overlap_is_detected() {
        let snapshot: GitStatusSnapshot = serde_json::from_str(
            r#"{"modified":["x"],"added":[],"deleted":["x"],"untracked":[]}"#,
        )
        .unwrap();
        assert!(!snapshot.is_partitioned());
    }

    #[test]
    fn test_single_current() {
        let branches = vec![
            BranchDescriptor { name: "main".into(), current: true, commit: "a1".into() },
            BranchDescriptor { name: "dev".into(), current: false, commit: "b2".into() },
        ];
        assert!(has_single_current(&branches));
    }

    #[test]
    fn test_options_wire_names() {
        let opts = LogOptions { depth: Some(5), reference: Some("main".into()) };
        let v = serde_json::to_value(&opts).unwrap();
        assert_eq!(v["depth"], 5);
        assert_eq!(v["ref"], "main");

        let clean = CleanOptions { dry_run: true, ..Default::default() };
        assert_eq!(serde_json::to_value(&clean).unwrap()["dryRun"], true);
        assert_eq!(serde_json::to_value(ArchiveFormat::TarGz).unwrap(), "tar.gz");
    }
}
