//! Unified Dispatcher
//!
//! Detects the host environment once, binds to exactly one backend and
//! exposes the full operation surface. Native-only operations are gated by
//! matching on the bound variant; a browser binding fails them loudly with
//! [`GitError::CapabilityMismatch`] instead of silently doing nothing.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::backend::GitBackend;
use super::browser::BrowserBackend;
use super::capability::{Capability, BROWSER_CAPABILITIES, NATIVE_CAPABILITIES};
use super::environment::{HostContext, HostEnvironment};
use super::error::{GitError, GitResult};
use super::native::NativeBackend;
use super::types::*;
use crate::bridge::Correlator;
use crate::config::GitBridgeConfig;

/// The backend chosen at construction time
pub enum BoundBackend {
    Native(Arc<NativeBackend>),
    Browser(Arc<BrowserBackend>),
}

impl BoundBackend {
    fn as_backend(&self) -> &dyn GitBackend {
        match self {
            BoundBackend::Native(b) => b.as_ref(),
            BoundBackend::Browser(b) => b.as_ref(),
        }
    }

    /// The native backend, or a capability error naming `operation`.
    fn native(&self, operation: &str) -> GitResult<&NativeBackend> {
        match self {
            BoundBackend::Native(b) => Ok(b.as_ref()),
            BoundBackend::Browser(_) => Err(GitError::unsupported(operation)),
        }
    }
}

pub struct GitDispatcher {
    backend: BoundBackend,
    environment: HostEnvironment,
}

impl GitDispatcher {
    /// Detect the environment and bind the matching backend.
    ///
    /// Native hosting wins whenever a bridge is present. Browser and unknown
    /// environments bind the in-browser engine, which has to be supplied.
    pub fn new(host: HostContext, config: &GitBridgeConfig) -> GitResult<Self> {
        let environment = HostEnvironment::detect(&host);
        let author = config.author.to_author();

        let backend = match (environment, host.native, host.browser_engine) {
            (HostEnvironment::Native, Some(channel), _) => {
                let correlator = Correlator::new(channel, config.bridge.timeout());
                let backend = NativeBackend::new(Arc::new(correlator)).with_defaults(None, Some(author));
                BoundBackend::Native(Arc::new(backend))
            }
            (_, _, Some(engine)) => {
                if environment == HostEnvironment::Unknown {
                    warn!("Host environment unknown, falling back to the in-browser engine");
                }
                BoundBackend::Browser(Arc::new(BrowserBackend::new(
                    engine,
                    config.browser.cors_proxy.clone(),
                    config.browser.default_dir.clone(),
                    author,
                )))
            }
            (_, _, None) => {
                return Err(GitError::TransportUnavailable(format!(
                    "no git backend available for {} environment",
                    environment
                )))
            }
        };

        info!("Git dispatcher bound to {} backend", environment);
        Ok(Self {
            backend,
            environment,
        })
    }

    /// Bind an already constructed backend.
    pub fn from_backend(backend: BoundBackend) -> Self {
        let environment = match backend {
            BoundBackend::Native(_) => HostEnvironment::Native,
            BoundBackend::Browser(_) => HostEnvironment::Browser,
        };
        Self {
            backend,
            environment,
        }
    }

    pub fn environment(&self) -> HostEnvironment {
        self.environment
    }

    pub fn is_native(&self) -> bool {
        matches!(self.backend, BoundBackend::Native(_))
    }

    pub fn bound(&self) -> &BoundBackend {
        &self.backend
    }

    /// Make `dir` the default directory of the bound backend.
    ///
    /// Native: the host's working directory. Browser: the folder inside the
    /// virtual filesystem that implicit-`dir` operations target.
    pub async fn open_directory(&self, dir: &str) -> GitResult<()> {
        match &self.backend {
            BoundBackend::Native(b) => b.set_working_directory(dir).await,
            BoundBackend::Browser(b) => {
                b.open_dir(dir);
                Ok(())
            }
        }
    }

    /// Directory implicit-`dir` operations run in.
    pub async fn working_directory(&self) -> GitResult<String> {
        match &self.backend {
            BoundBackend::Native(b) => b.get_working_directory().await,
            BoundBackend::Browser(b) => Ok(b.current_dir()),
        }
    }
}

#[async_trait]
impl GitBackend for GitDispatcher {
    fn capabilities(&self) -> &'static [Capability] {
        match self.backend {
            BoundBackend::Native(_) => NATIVE_CAPABILITIES,
            BoundBackend::Browser(_) => BROWSER_CAPABILITIES,
        }
    }

    fn set_author(&self, author: Author) {
        self.backend.as_backend().set_author(author)
    }

    async fn is_repository(&self, dir: Option<&str>) -> GitResult<bool> {
        self.backend.as_backend().is_repository(dir).await
    }

    async fn init(&self, dir: Option<&str>) -> GitResult<()> {
        self.backend.as_backend().init(dir).await
    }

    async fn clone_repo(&self, url: &str, dir: Option<&str>, opts: &CloneOptions) -> GitResult<()> {
        self.backend.as_backend().clone_repo(url, dir, opts).await
    }

    async fn add(&self, paths: &[String], dir: Option<&str>) -> GitResult<()> {
        self.backend.as_backend().add(paths, dir).await
    }

    async fn remove(&self, paths: &[String], dir: Option<&str>) -> GitResult<()> {
        self.backend.as_backend().remove(paths, dir).await
    }

    async fn commit(&self, message: &str, dir: Option<&str>, opts: &CommitOptions) -> GitResult<String> {
        self.backend.as_backend().commit(message, dir, opts).await
    }

    async fn status(&self, dir: Option<&str>) -> GitResult<GitStatusSnapshot> {
        self.backend.as_backend().status(dir).await
    }

    async fn fetch(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        self.backend.as_backend().fetch(dir, opts).await
    }

    async fn pull(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        self.backend.as_backend().pull(dir, opts).await
    }

    async fn push(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        self.backend.as_backend().push(dir, opts).await
    }

    async fn log(&self, dir: Option<&str>, opts: &LogOptions) -> GitResult<Vec<CommitInfo>> {
        self.backend.as_backend().log(dir, opts).await
    }

    async fn list_branches(&self, dir: Option<&str>) -> GitResult<Vec<BranchDescriptor>> {
        self.backend.as_backend().list_branches(dir).await
    }

    async fn create_branch(&self, name: &str, dir: Option<&str>, opts: &BranchOptions) -> GitResult<()> {
        self.backend.as_backend().create_branch(name, dir, opts).await
    }

    async fn checkout(&self, reference: &str, dir: Option<&str>) -> GitResult<()> {
        self.backend.as_backend().checkout(reference, dir).await
    }

    async fn delete_branch(&self, name: &str, dir: Option<&str>, force: bool) -> GitResult<()> {
        self.backend.as_backend().delete_branch(name, dir, force).await
    }

    async fn list_remotes(&self, dir: Option<&str>) -> GitResult<Vec<RemoteInfo>> {
        self.backend.as_backend().list_remotes(dir).await
    }

    async fn add_remote(&self, name: &str, url: &str, dir: Option<&str>) -> GitResult<()> {
        self.backend.as_backend().add_remote(name, url, dir).await
    }

    async fn remove_remote(&self, name: &str, dir: Option<&str>) -> GitResult<()> {
        self.backend.as_backend().remove_remote(name, dir).await
    }

    // ------------------------------------------------------------------
    // Native-only: gated here, before any backend call
    // ------------------------------------------------------------------

    async fn reset(&self, paths: Option<&[String]>, dir: Option<&str>, opts: &ResetOptions) -> GitResult<()> {
        self.backend.native("reset")?.reset(paths, dir, opts).await
    }

    async fn show(&self, commit: &str, dir: Option<&str>) -> GitResult<ShowResult> {
        self.backend.native("show")?.show(commit, dir).await
    }

    async fn diff(&self, dir: Option<&str>, opts: &DiffOptions) -> GitResult<String> {
        self.backend.native("diff")?.diff(dir, opts).await
    }

    async fn merge(&self, branch: &str, dir: Option<&str>, opts: &MergeOptions) -> GitResult<MergeResult> {
        self.backend.native("merge")?.merge(branch, dir, opts).await
    }

    async fn rebase(&self, upstream: &str, dir: Option<&str>, opts: &RebaseOptions) -> GitResult<MergeResult> {
        self.backend.native("rebase")?.rebase(upstream, dir, opts).await
    }

    async fn cherry_pick(&self, commits: &[String], dir: Option<&str>, opts: &PickOptions) -> GitResult<MergeResult> {
        self.backend
            .native("cherry_pick")?
            .cherry_pick(commits, dir, opts)
            .await
    }

    async fn revert(&self, commit: &str, dir: Option<&str>, opts: &PickOptions) -> GitResult<MergeResult> {
        self.backend.native("revert")?.revert(commit, dir, opts).await
    }

    async fn create_tag(&self, name: &str, dir: Option<&str>, opts: &TagOptions) -> GitResult<()> {
        self.backend.native("create_tag")?.create_tag(name, dir, opts).await
    }

    async fn list_tags(&self, dir: Option<&str>) -> GitResult<Vec<TagInfo>> {
        self.backend.native("list_tags")?.list_tags(dir).await
    }

    async fn delete_tag(&self, name: &str, dir: Option<&str>) -> GitResult<()> {
        self.backend.native("delete_tag")?.delete_tag(name, dir).await
    }

    async fn rename_remote(&self, old: &str, new: &str, dir: Option<&str>) -> GitResult<()> {
        self.backend
            .native("rename_remote")?
            .rename_remote(old, new, dir)
            .await
    }

    async fn set_remote_url(&self, name: &str, url: &str, dir: Option<&str>, push: bool) -> GitResult<()> {
        self.backend
            .native("set_remote_url")?
            .set_remote_url(name, url, dir, push)
            .await
    }

    async fn stash_save(&self, dir: Option<&str>, opts: &StashOptions) -> GitResult<()> {
        self.backend.native("stash_save")?.stash_save(dir, opts).await
    }

    async fn stash_apply(&self, index: Option<usize>, dir: Option<&str>) -> GitResult<()> {
        self.backend.native("stash_apply")?.stash_apply(index, dir).await
    }

    async fn stash_pop(&self, index: Option<usize>, dir: Option<&str>) -> GitResult<()> {
        self.backend.native("stash_pop")?.stash_pop(index, dir).await
    }

    async fn stash_list(&self, dir: Option<&str>) -> GitResult<Vec<StashEntry>> {
        self.backend.native("stash_list")?.stash_list(dir).await
    }

    async fn stash_drop(&self, index: Option<usize>, dir: Option<&str>) -> GitResult<()> {
        self.backend.native("stash_drop")?.stash_drop(index, dir).await
    }

    async fn clean(&self, dir: Option<&str>, opts: &CleanOptions) -> GitResult<Vec<String>> {
        self.backend.native("clean")?.clean(dir, opts).await
    }

    async fn archive(&self, output_path: &str, dir: Option<&str>, opts: &ArchiveOptions) -> GitResult<()> {
        self.backend
            .native("archive")?
            .archive(output_path, dir, opts)
            .await
    }

    async fn get_working_directory(&self) -> GitResult<String> {
        self.backend
            .native("get_working_directory")?
            .get_working_directory()
            .await
    }

    async fn set_working_directory(&self, dir: &str) -> GitResult<()> {
        self.backend
            .native("set_working_directory")?
            .set_working_directory(dir)
            .await
    }

    async fn get_repository_info(&self, dir: Option<&str>) -> GitResult<RepositoryInfo> {
        self.backend
            .native("get_repository_info")?
            .get_repository_info(dir)
            .await
    }
}
