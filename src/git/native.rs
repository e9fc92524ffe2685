//! Backend B: native git over the bridge
//!
//! Every operation becomes one correlated request. The params bag always
//! carries `workingDir` and `author` from the instance defaults unless the
//! call overrides them.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use super::backend::GitBackend;
use super::capability::{Capability, NATIVE_CAPABILITIES};
use super::error::{GitError, GitResult};
use super::types::*;
use crate::bridge::{Correlator, GitCommand};

#[derive(Debug, Clone, Default)]
struct NativeDefaults {
    working_dir: Option<String>,
    author: Option<Author>,
}

pub struct NativeBackend {
    correlator: Arc<Correlator>,
    defaults: RwLock<NativeDefaults>,
}

impl NativeBackend {
    pub fn new(correlator: Arc<Correlator>) -> Self {
        Self {
            correlator,
            defaults: RwLock::new(NativeDefaults::default()),
        }
    }

    pub fn with_defaults(self, working_dir: Option<String>, author: Option<Author>) -> Self {
        *self.defaults.write().unwrap_or_else(PoisonError::into_inner) = NativeDefaults {
            working_dir,
            author,
        };
        self
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    fn defaults(&self) -> NativeDefaults {
        self.defaults.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Merge explicit params with instance defaults.
    fn build_params(&self, dir: Option<&str>, extra: Value) -> Value {
        let defaults = self.defaults();
        let mut params = match extra {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        if !params.contains_key("workingDir") {
            if let Some(dir) = dir.map(str::to_string).or(defaults.working_dir) {
                params.insert("workingDir".to_string(), Value::String(dir));
            }
        }
        if !params.contains_key("author") {
            if let Some(author) = defaults.author {
                params.insert("author".to_string(), json!(author));
            }
        }
        Value::Object(params)
    }

    async fn request(
        &self,
        command: GitCommand,
        dir: Option<&str>,
        extra: Value,
        context: &'static str,
    ) -> GitResult<Value> {
        let params = self.build_params(dir, extra);
        self.correlator
            .send(command.as_str(), params)
            .await
            .map_err(|e| match e {
                GitError::Operation { message, .. } => GitError::operation(context, message),
                other => other,
            })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        command: GitCommand,
        dir: Option<&str>,
        extra: Value,
        context: &'static str,
    ) -> GitResult<T> {
        let data = self.request(command, dir, extra, context).await?;
        serde_json::from_value(data).map_err(|e| {
            GitError::Protocol(format!("Unexpected '{}' result: {}", command, e))
        })
    }

    async fn call_unit(
        &self,
        command: GitCommand,
        dir: Option<&str>,
        extra: Value,
        context: &'static str,
    ) -> GitResult<()> {
        self.request(command, dir, extra, context).await.map(|_| ())
    }
}

fn opts_value<T: serde::Serialize>(opts: &T) -> Value {
    serde_json::to_value(opts).unwrap_or(Value::Null)
}

/// Overlay `extra` keys onto an option bag's JSON object.
fn with_opts<T: serde::Serialize>(opts: &T, extra: Value) -> Value {
    let mut base = match opts_value(opts) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Value::Object(extra) = extra {
        base.extend(extra);
    }
    Value::Object(base)
}

#[async_trait]
impl GitBackend for NativeBackend {
    fn capabilities(&self) -> &'static [Capability] {
        NATIVE_CAPABILITIES
    }

    fn set_author(&self, author: Author) {
        self.defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .author = Some(author);
    }

    async fn is_repository(&self, dir: Option<&str>) -> GitResult<bool> {
        self.call(
            GitCommand::GitIsRepository,
            dir,
            Value::Null,
            "Failed to check repository",
        )
        .await
    }

    async fn init(&self, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(GitCommand::GitInit, dir, Value::Null, "Failed to initialize repository")
            .await
    }

    async fn clone_repo(&self, url: &str, dir: Option<&str>, opts: &CloneOptions) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitClone,
            dir,
            with_opts(opts, json!({ "url": url })),
            "Failed to clone repository",
        )
        .await?;
        info!("Native clone of {} finished", url);
        Ok(())
    }

    async fn add(&self, paths: &[String], dir: Option<&str>) -> GitResult<()> {
        self.call_unit(GitCommand::GitAdd, dir, json!({ "paths": paths }), "Failed to add files")
            .await
    }

    async fn remove(&self, paths: &[String], dir: Option<&str>) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitRemove,
            dir,
            json!({ "paths": paths }),
            "Failed to remove files",
        )
        .await
    }

    async fn commit(&self, message: &str, dir: Option<&str>, opts: &CommitOptions) -> GitResult<String> {
        self.call(
            GitCommand::GitCommit,
            dir,
            with_opts(opts, json!({ "message": message })),
            "Failed to commit",
        )
        .await
    }

    async fn status(&self, dir: Option<&str>) -> GitResult<GitStatusSnapshot> {
        let snapshot: GitStatusSnapshot = self
            .call(GitCommand::GitStatus, dir, Value::Null, "Failed to get status")
            .await?;
        if !snapshot.is_partitioned() {
            return Err(GitError::Protocol(
                "status buckets overlap in native response".to_string(),
            ));
        }
        Ok(snapshot)
    }

    async fn fetch(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        self.call_unit(GitCommand::GitFetch, dir, opts_value(opts), "Failed to fetch")
            .await
    }

    async fn pull(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        self.call_unit(GitCommand::GitPull, dir, opts_value(opts), "Failed to pull changes")
            .await
    }

    async fn push(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        self.call_unit(GitCommand::GitPush, dir, opts_value(opts), "Failed to push")
            .await
    }

    async fn log(&self, dir: Option<&str>, opts: &LogOptions) -> GitResult<Vec<CommitInfo>> {
        self.call(GitCommand::GitLog, dir, opts_value(opts), "Failed to get log")
            .await
    }

    async fn list_branches(&self, dir: Option<&str>) -> GitResult<Vec<BranchDescriptor>> {
        let branches: Vec<BranchDescriptor> = self
            .call(
                GitCommand::GitListBranches,
                dir,
                Value::Null,
                "Failed to list branches",
            )
            .await?;
        if !has_single_current(&branches) {
            return Err(GitError::Protocol(
                "more than one current branch in native response".to_string(),
            ));
        }
        Ok(branches)
    }

    async fn create_branch(&self, name: &str, dir: Option<&str>, opts: &BranchOptions) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitCreateBranch,
            dir,
            with_opts(opts, json!({ "name": name })),
            "Failed to create branch",
        )
        .await
    }

    async fn checkout(&self, reference: &str, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitCheckout,
            dir,
            json!({ "ref": reference }),
            "Failed to checkout",
        )
        .await
    }

    async fn delete_branch(&self, name: &str, dir: Option<&str>, force: bool) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitDeleteBranch,
            dir,
            json!({ "name": name, "force": force }),
            "Failed to delete branch",
        )
        .await
    }

    async fn list_remotes(&self, dir: Option<&str>) -> GitResult<Vec<RemoteInfo>> {
        self.call(GitCommand::GitListRemotes, dir, Value::Null, "Failed to list remotes")
            .await
    }

    async fn add_remote(&self, name: &str, url: &str, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitAddRemote,
            dir,
            json!({ "name": name, "url": url }),
            "Failed to add remote",
        )
        .await
    }

    async fn remove_remote(&self, name: &str, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitRemoveRemote,
            dir,
            json!({ "name": name }),
            "Failed to remove remote",
        )
        .await
    }

    // ------------------------------------------------------------------

    async fn reset(&self, paths: Option<&[String]>, dir: Option<&str>, opts: &ResetOptions) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitReset,
            dir,
            with_opts(opts, json!({ "paths": paths })),
            "Failed to reset",
        )
        .await
    }

    async fn show(&self, commit: &str, dir: Option<&str>) -> GitResult<ShowResult> {
        self.call(GitCommand::GitShow, dir, json!({ "commit": commit }), "Failed to show commit")
            .await
    }

    async fn diff(&self, dir: Option<&str>, opts: &DiffOptions) -> GitResult<String> {
        self.call(GitCommand::GitDiff, dir, opts_value(opts), "Failed to get diff")
            .await
    }

    async fn merge(&self, branch: &str, dir: Option<&str>, opts: &MergeOptions) -> GitResult<MergeResult> {
        self.call(
            GitCommand::GitMerge,
            dir,
            with_opts(opts, json!({ "branch": branch })),
            "Failed to merge",
        )
        .await
    }

    async fn rebase(&self, upstream: &str, dir: Option<&str>, opts: &RebaseOptions) -> GitResult<MergeResult> {
        self.call(
            GitCommand::GitRebase,
            dir,
            with_opts(opts, json!({ "upstream": upstream })),
            "Failed to rebase",
        )
        .await
    }

    async fn cherry_pick(&self, commits: &[String], dir: Option<&str>, opts: &PickOptions) -> GitResult<MergeResult> {
        self.call(
            GitCommand::GitCherryPick,
            dir,
            with_opts(opts, json!({ "commits": commits })),
            "Failed to cherry-pick",
        )
        .await
    }

    async fn revert(&self, commit: &str, dir: Option<&str>, opts: &PickOptions) -> GitResult<MergeResult> {
        self.call(
            GitCommand::GitRevert,
            dir,
            with_opts(opts, json!({ "commit": commit })),
            "Failed to revert",
        )
        .await
    }

    async fn create_tag(&self, name: &str, dir: Option<&str>, opts: &TagOptions) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitCreateTag,
            dir,
            with_opts(opts, json!({ "name": name })),
            "Failed to create tag",
        )
        .await
    }

    async fn list_tags(&self, dir: Option<&str>) -> GitResult<Vec<TagInfo>> {
        self.call(GitCommand::GitListTags, dir, Value::Null, "Failed to list tags")
            .await
    }

    async fn delete_tag(&self, name: &str, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(GitCommand::GitDeleteTag, dir, json!({ "name": name }), "Failed to delete tag")
            .await
    }

    async fn rename_remote(&self, old: &str, new: &str, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitRenameRemote,
            dir,
            json!({ "oldName": old, "newName": new }),
            "Failed to rename remote",
        )
        .await
    }

    async fn set_remote_url(&self, name: &str, url: &str, dir: Option<&str>, push: bool) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitSetRemoteUrl,
            dir,
            json!({ "name": name, "url": url, "push": push }),
            "Failed to set remote URL",
        )
        .await
    }

    async fn stash_save(&self, dir: Option<&str>, opts: &StashOptions) -> GitResult<()> {
        self.call_unit(GitCommand::GitStashSave, dir, opts_value(opts), "Failed to stash changes")
            .await
    }

    async fn stash_apply(&self, index: Option<usize>, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(GitCommand::GitStashApply, dir, json!({ "index": index }), "Failed to apply stash")
            .await
    }

    async fn stash_pop(&self, index: Option<usize>, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(GitCommand::GitStashPop, dir, json!({ "index": index }), "Failed to pop stash")
            .await
    }

    async fn stash_list(&self, dir: Option<&str>) -> GitResult<Vec<StashEntry>> {
        self.call(GitCommand::GitStashList, dir, Value::Null, "Failed to list stashes")
            .await
    }

    async fn stash_drop(&self, index: Option<usize>, dir: Option<&str>) -> GitResult<()> {
        self.call_unit(GitCommand::GitStashDrop, dir, json!({ "index": index }), "Failed to drop stash")
            .await
    }

    async fn clean(&self, dir: Option<&str>, opts: &CleanOptions) -> GitResult<Vec<String>> {
        self.call(GitCommand::GitClean, dir, opts_value(opts), "Failed to clean")
            .await
    }

    async fn archive(&self, output_path: &str, dir: Option<&str>, opts: &ArchiveOptions) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitArchive,
            dir,
            with_opts(opts, json!({ "outputPath": output_path })),
            "Failed to create archive",
        )
        .await
    }

    async fn get_working_directory(&self) -> GitResult<String> {
        if let Some(dir) = self.defaults().working_dir {
            return Ok(dir);
        }
        self.call(
            GitCommand::GitGetWorkingDirectory,
            None,
            Value::Null,
            "Failed to get working directory",
        )
        .await
    }

    async fn set_working_directory(&self, dir: &str) -> GitResult<()> {
        self.call_unit(
            GitCommand::GitSetWorkingDirectory,
            Some(dir),
            Value::Null,
            "Failed to set working directory",
        )
        .await?;
        debug!("Native working directory set to {}", dir);
        self.defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .working_dir = Some(dir.to_string());
        Ok(())
    }

    async fn get_repository_info(&self, dir: Option<&str>) -> GitResult<RepositoryInfo> {
        self.call(
            GitCommand::GitRepositoryInfo,
            dir,
            Value::Null,
            "Failed to get repository info",
        )
        .await
    }
}
