//! Bridge wire format
//!
//! One JSON object per message in each direction. Requests carry a
//! `requestId` that the native side echoes back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub request_id: String,
    pub command: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(request_id: impl Into<String>, data: Value) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Pull the `requestId` out of an inbound payload without committing to the
/// full envelope shape. Lets the correlator fail the right caller when the
/// rest of the payload is malformed.
pub fn peek_request_id(raw: &Value) -> Option<&str> {
    raw.get("requestId").and_then(Value::as_str)
}

/// Native git commands understood by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitCommand {
    GitInit,
    GitClone,
    GitAdd,
    GitRemove,
    GitCommit,
    GitStatus,
    GitFetch,
    GitPull,
    GitPush,
    GitLog,
    GitListBranches,
    GitCreateBranch,
    GitCheckout,
    GitDeleteBranch,
    GitListRemotes,
    GitAddRemote,
    GitRemoveRemote,
    GitRenameRemote,
    GitSetRemoteUrl,
    GitIsRepository,
    GitReset,
    GitShow,
    GitDiff,
    GitMerge,
    GitRebase,
    GitCherryPick,
    GitRevert,
    GitCreateTag,
    GitListTags,
    GitDeleteTag,
    GitStashSave,
    GitStashApply,
    GitStashPop,
    GitStashList,
    GitStashDrop,
    GitClean,
    GitArchive,
    GitGetWorkingDirectory,
    GitSetWorkingDirectory,
    GitRepositoryInfo,
}

impl GitCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitCommand::GitInit => "git_init",
            GitCommand::GitClone => "git_clone",
            GitCommand::GitAdd => "git_add",
            GitCommand::GitRemove => "git_remove",
            GitCommand::GitCommit => "git_commit",
            GitCommand::GitStatus => "git_status",
            GitCommand::GitFetch => "git_fetch",
            GitCommand::GitPull => "git_pull",
            GitCommand::GitPush => "git_push",
            GitCommand::GitLog => "git_log",
            GitCommand::GitListBranches => "git_list_branches",
            GitCommand::GitCreateBranch => "git_create_branch",
            GitCommand::GitCheckout => "git_checkout",
            GitCommand::GitDeleteBranch => "git_delete_branch",
            GitCommand::GitListRemotes => "git_list_remotes",
            GitCommand::GitAddRemote => "git_add_remote",
            GitCommand::GitRemoveRemote => "git_remove_remote",
            GitCommand::GitRenameRemote => "git_rename_remote",
            GitCommand::GitSetRemoteUrl => "git_set_remote_url",
            GitCommand::GitIsRepository => "git_is_repository",
            GitCommand::GitReset => "git_reset",
            GitCommand::GitShow => "git_show",
            GitCommand::GitDiff => "git_diff",
            GitCommand::GitMerge => "git_merge",
            GitCommand::GitRebase => "git_rebase",
            GitCommand::GitCherryPick => "git_cherry_pick",
            GitCommand::GitRevert => "git_revert",
            GitCommand::GitCreateTag => "git_create_tag",
            GitCommand::GitListTags => "git_list_tags",
            GitCommand::GitDeleteTag => "git_delete_tag",
            GitCommand::GitStashSave => "git_stash_save",
            GitCommand::GitStashApply => "git_stash_apply",
            GitCommand::GitStashPop => "git_stash_pop",
            GitCommand::GitStashList => "git_stash_list",
            GitCommand::GitStashDrop => "git_stash_drop",
            GitCommand::GitClean => "git_clean",
            GitCommand::GitArchive => "git_archive",
            GitCommand::GitGetWorkingDirectory => "git_get_working_directory",
            GitCommand::GitSetWorkingDirectory => "git_set_working_directory",
            GitCommand::GitRepositoryInfo => "git_repository_info",
        }
    }

    /// Reverse of [`GitCommand::as_str`]; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(Value::String(name.to_string())).ok()
    }
}

impl std::fmt::Display for GitCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
