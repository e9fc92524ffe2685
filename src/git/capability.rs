//! Static capability sets for the two backends
//!
//! Capabilities are never discovered at runtime: each backend kind carries a
//! fixed list, and the dispatcher consults it before delegating.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    // 两端都支持
    Init,
    Clone,
    Add,
    Remove,
    Commit,
    Status,
    Fetch,
    Pull,
    Push,
    Log,
    Branches,
    Remotes,
    // 仅原生端
    Reset,
    Show,
    Diff,
    Merge,
    Rebase,
    CherryPick,
    Revert,
    Tags,
    RemoteRename,
    RemoteSetUrl,
    Stash,
    Clean,
    Archive,
    WorkingDirectory,
    RepositoryInfo,
}

/// Operations both backends implement.
pub const BROWSER_CAPABILITIES: &[Capability] = &[
    Capability::Init,
    Capability::Clone,
    Capability::Add,
    Capability::Remove,
    Capability::Commit,
    Capability::Status,
    Capability::Fetch,
    Capability::Pull,
    Capability::Push,
    Capability::Log,
    Capability::Branches,
    Capability::Remotes,
];

/// Full native set, a strict superset of [`BROWSER_CAPABILITIES`].
pub const NATIVE_CAPABILITIES: &[Capability] = &[
    Capability::Init,
    Capability::Clone,
    Capability::Add,
    Capability::Remove,
    Capability::Commit,
    Capability::Status,
    Capability::Fetch,
    Capability::Pull,
    Capability::Push,
    Capability::Log,
    Capability::Branches,
    Capability::Remotes,
    Capability::Reset,
    Capability::Show,
    Capability::Diff,
    Capability::Merge,
    Capability::Rebase,
    Capability::CherryPick,
    Capability::Revert,
    Capability::Tags,
    Capability::RemoteRename,
    Capability::RemoteSetUrl,
    Capability::Stash,
    Capability::Clean,
    Capability::Archive,
    Capability::WorkingDirectory,
    Capability::RepositoryInfo,
];

impl Capability {
    pub fn is_native_only(&self) -> bool {
        !BROWSER_CAPABILITIES.contains(self)
    }
}
