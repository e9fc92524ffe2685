//! The single Git operation surface
//!
//! Both backends implement [`GitBackend`]. Operations outside the browser
//! capability set have default bodies that fail with
//! [`GitError::CapabilityMismatch`], so a narrower backend simply does not
//! override them. `dir = None` means "the backend's current working
//! directory".

use async_trait::async_trait;

use super::capability::Capability;
use super::error::{GitError, GitResult};
use super::types::*;

#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Static capability list of this backend
    fn capabilities(&self) -> &'static [Capability];

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Default commit identity for calls that omit one
    fn set_author(&self, author: Author);

    // ------------------------------------------------------------------
    // Shared operations
    // ------------------------------------------------------------------

    async fn is_repository(&self, dir: Option<&str>) -> GitResult<bool>;

    async fn init(&self, dir: Option<&str>) -> GitResult<()>;

    async fn clone_repo(&self, url: &str, dir: Option<&str>, opts: &CloneOptions)
        -> GitResult<()>;

    async fn add(&self, paths: &[String], dir: Option<&str>) -> GitResult<()>;

    async fn remove(&self, paths: &[String], dir: Option<&str>) -> GitResult<()>;

    /// Returns the new commit id
    async fn commit(&self, message: &str, dir: Option<&str>, opts: &CommitOptions)
        -> GitResult<String>;

    async fn status(&self, dir: Option<&str>) -> GitResult<GitStatusSnapshot>;

    async fn fetch(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()>;

    async fn pull(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()>;

    async fn push(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()>;

    /// Newest first
    async fn log(&self, dir: Option<&str>, opts: &LogOptions) -> GitResult<Vec<CommitInfo>>;

    async fn list_branches(&self, dir: Option<&str>) -> GitResult<Vec<BranchDescriptor>>;

    async fn create_branch(&self, name: &str, dir: Option<&str>, opts: &BranchOptions)
        -> GitResult<()>;

    async fn checkout(&self, reference: &str, dir: Option<&str>) -> GitResult<()>;

    async fn delete_branch(&self, name: &str, dir: Option<&str>, force: bool) -> GitResult<()>;

    async fn list_remotes(&self, dir: Option<&str>) -> GitResult<Vec<RemoteInfo>>;

    async fn add_remote(&self, name: &str, url: &str, dir: Option<&str>) -> GitResult<()>;

    async fn remove_remote(&self, name: &str, dir: Option<&str>) -> GitResult<()>;

    // ------------------------------------------------------------------
    // Native-only operations
    // ------------------------------------------------------------------

    async fn reset(
        &self,
        _paths: Option<&[String]>,
        _dir: Option<&str>,
        _opts: &ResetOptions,
    ) -> GitResult<()> {
        Err(GitError::unsupported("reset"))
    }

    async fn show(&self, _commit: &str, _dir: Option<&str>) -> GitResult<ShowResult> {
        Err(GitError::unsupported("show"))
    }

    async fn diff(&self, _dir: Option<&str>, _opts: &DiffOptions) -> GitResult<String> {
        Err(GitError::unsupported("diff"))
    }

    async fn merge(
        &self,
        _branch: &str,
        _dir: Option<&str>,
        _opts: &MergeOptions,
    ) -> GitResult<MergeResult> {
        Err(GitError::unsupported("merge"))
    }

    async fn rebase(
        &self,
        _upstream: &str,
        _dir: Option<&str>,
        _opts: &RebaseOptions,
    ) -> GitResult<MergeResult> {
        Err(GitError::unsupported("rebase"))
    }

    async fn cherry_pick(
        &self,
        _commits: &[String],
        _dir: Option<&str>,
        _opts: &PickOptions,
    ) -> GitResult<MergeResult> {
        Err(GitError::unsupported("cherry_pick"))
    }

    async fn revert(
        &self,
        _commit: &str,
        _dir: Option<&str>,
        _opts: &PickOptions,
    ) -> GitResult<MergeResult> {
        Err(GitError::unsupported("revert"))
    }

    async fn create_tag(&self, _name: &str, _dir: Option<&str>, _opts: &TagOptions)
        -> GitResult<()> {
        Err(GitError::unsupported("create_tag"))
    }

    async fn list_tags(&self, _dir: Option<&str>) -> GitResult<Vec<TagInfo>> {
        Err(GitError::unsupported("list_tags"))
    }

    async fn delete_tag(&self, _name: &str, _dir: Option<&str>) -> GitResult<()> {
        Err(GitError::unsupported("delete_tag"))
    }

    async fn rename_remote(&self, _old: &str, _new: &str, _dir: Option<&str>) -> GitResult<()> {
        Err(GitError::unsupported("rename_remote"))
    }

    async fn set_remote_url(
        &self,
        _name: &str,
        _url: &str,
        _dir: Option<&str>,
        _push: bool,
    ) -> GitResult<()> {
        Err(GitError::unsupported("set_remote_url"))
    }

    async fn stash_save(&self, _dir: Option<&str>, _opts: &StashOptions) -> GitResult<()> {
        Err(GitError::unsupported("stash_save"))
    }

    async fn stash_apply(&self, _index: Option<usize>, _dir: Option<&str>) -> GitResult<()> {
        Err(GitError::unsupported("stash_apply"))
    }

    async fn stash_pop(&self, _index: Option<usize>, _dir: Option<&str>) -> GitResult<()> {
        Err(GitError::unsupported("stash_pop"))
    }

    async fn stash_list(&self, _dir: Option<&str>) -> GitResult<Vec<StashEntry>> {
        Err(GitError::unsupported("stash_list"))
    }

    async fn stash_drop(&self, _index: Option<usize>, _dir: Option<&str>) -> GitResult<()> {
        Err(GitError::unsupported("stash_drop"))
    }

    /// Returns the removed (or, for dry runs, removable) paths
    async fn clean(&self, _dir: Option<&str>, _opts: &CleanOptions) -> GitResult<Vec<String>> {
        Err(GitError::unsupported("clean"))
    }

    async fn archive(
        &self,
        _output_path: &str,
        _dir: Option<&str>,
        _opts: &ArchiveOptions,
    ) -> GitResult<()> {
        Err(GitError::unsupported("archive"))
    }

    async fn get_working_directory(&self) -> GitResult<String> {
        Err(GitError::unsupported("get_working_directory"))
    }

    async fn set_working_directory(&self, _dir: &str) -> GitResult<()> {
        Err(GitError::unsupported("set_working_directory"))
    }

    async fn get_repository_info(&self, _dir: Option<&str>) -> GitResult<RepositoryInfo> {
        Err(GitError::unsupported("get_repository_info"))
    }
}
