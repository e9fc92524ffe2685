//! Backend A: in-browser git engine adapter
//!
//! Thin adapter over a pure in-browser git implementation that reads and
//! writes a virtual filesystem. Every call is a direct async call into the
//! engine; engine failures are rewrapped with an operation prefix and never
//! retried. Network operations always go through the configured CORS proxy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info};

use super::backend::GitBackend;
use super::capability::{Capability, BROWSER_CAPABILITIES};
use super::error::{GitError, GitResult};
use super::types::*;

/// Branch created by `init`
pub const DEFAULT_BRANCH: &str = "main";

/// Raw failure reported by the in-browser engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError(message.into())
    }
}

/// One status matrix row: `[path, HEAD, WORKDIR, STAGE]`
///
/// HEAD: 0 absent, 1 present. WORKDIR: 0 absent, 1 same as HEAD,
/// 2 different. STAGE: 0 absent, 1 same as HEAD, 2 same as WORKDIR,
/// 3 different from both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub path: String,
    pub head: u8,
    pub workdir: u8,
    pub stage: u8,
}

impl StatusRow {
    pub fn new(path: impl Into<String>, head: u8, workdir: u8, stage: u8) -> Self {
        Self {
            path: path.into(),
            head,
            workdir,
            stage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommit {
    pub oid: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    /// Seconds since the epoch
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct EngineCloneRequest {
    pub dir: String,
    pub url: String,
    pub cors_proxy: String,
    pub reference: Option<String>,
    pub depth: Option<u32>,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone)]
pub struct EngineRemoteRequest {
    pub dir: String,
    pub remote: String,
    pub reference: Option<String>,
    pub cors_proxy: String,
    pub credentials: Option<Credentials>,
}

/// The in-browser git engine and its virtual filesystem.
///
/// Provided by the embedding shell; this crate only adapts it.
#[async_trait]
pub trait BrowserGitEngine: Send + Sync {
    /// Directory containing `.git`, walking upwards from `dir`
    async fn find_root(&self, dir: &str) -> Result<String, EngineError>;
    async fn init(&self, dir: &str, default_branch: &str) -> Result<(), EngineError>;
    async fn clone_repo(&self, req: &EngineCloneRequest) -> Result<(), EngineError>;
    async fn add(&self, dir: &str, filepath: &str) -> Result<(), EngineError>;
    async fn remove(&self, dir: &str, filepath: &str) -> Result<(), EngineError>;
    async fn commit(
        &self,
        dir: &str,
        message: &str,
        author: &Author,
        amend: bool,
    ) -> Result<String, EngineError>;
    async fn status_matrix(&self, dir: &str) -> Result<Vec<StatusRow>, EngineError>;
    async fn fetch(&self, req: &EngineRemoteRequest) -> Result<(), EngineError>;
    async fn merge(
        &self,
        dir: &str,
        ours: &str,
        theirs: &str,
        author: &Author,
    ) -> Result<(), EngineError>;
    async fn push(&self, req: &EngineRemoteRequest) -> Result<(), EngineError>;
    async fn log(
        &self,
        dir: &str,
        depth: Option<usize>,
        reference: Option<&str>,
    ) -> Result<Vec<EngineCommit>, EngineError>;
    async fn list_branches(&self, dir: &str) -> Result<Vec<String>, EngineError>;
    async fn current_branch(&self, dir: &str) -> Result<Option<String>, EngineError>;
    async fn resolve_ref(&self, dir: &str, reference: &str) -> Result<String, EngineError>;
    async fn branch(
        &self,
        dir: &str,
        name: &str,
        start_point: Option<&str>,
        checkout: bool,
    ) -> Result<(), EngineError>;
    async fn checkout(&self, dir: &str, reference: &str) -> Result<(), EngineError>;
    async fn delete_branch(&self, dir: &str, name: &str) -> Result<(), EngineError>;
    async fn list_remotes(&self, dir: &str) -> Result<Vec<RemoteInfo>, EngineError>;
    async fn add_remote(&self, dir: &str, name: &str, url: &str) -> Result<(), EngineError>;
    async fn delete_remote(&self, dir: &str, name: &str) -> Result<(), EngineError>;
}

/// Classify one status matrix row. `None` means unchanged (or not a file
/// git cares about).
pub fn classify_status_row(head: u8, workdir: u8, stage: u8) -> Option<StatusKind> {
    match (head, workdir, stage) {
        (1, 1, 1) => None,
        (0, 2, 0) => Some(StatusKind::Untracked),
        (0, _, 2) | (0, _, 3) => Some(StatusKind::Added),
        (0, _, _) => None,
        // 工作区删除，或已从暂存区移除
        (1, 0, _) | (1, _, 0) => Some(StatusKind::Deleted),
        (1, _, _) => Some(StatusKind::Modified),
        _ => None,
    }
}

/// Build a snapshot from a full status matrix.
pub fn snapshot_from_matrix(rows: &[StatusRow]) -> GitStatusSnapshot {
    let mut snapshot = GitStatusSnapshot::default();
    for row in rows {
        if let Some(kind) = classify_status_row(row.head, row.workdir, row.stage) {
            snapshot.insert(kind, row.path.clone());
        }
    }
    snapshot
}

fn to_commit_info(commit: EngineCommit) -> CommitInfo {
    let timestamp = DateTime::<Utc>::from_timestamp(commit.timestamp, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    CommitInfo {
        id: commit.oid,
        message: commit.message.trim_end().to_string(),
        author: commit.author_name,
        email: commit.author_email,
        timestamp,
    }
}

fn wrap(context: &'static str) -> impl Fn(EngineError) -> GitError {
    move |e| GitError::operation(context, e.0)
}

pub struct BrowserBackend {
    engine: Arc<dyn BrowserGitEngine>,
    cors_proxy: String,
    dir: RwLock<String>,
    author: RwLock<Author>,
}

impl BrowserBackend {
    pub fn new(
        engine: Arc<dyn BrowserGitEngine>,
        cors_proxy: impl Into<String>,
        default_dir: impl Into<String>,
        author: Author,
    ) -> Self {
        Self {
            engine,
            cors_proxy: cors_proxy.into(),
            dir: RwLock::new(default_dir.into()),
            author: RwLock::new(author),
        }
    }

    pub fn cors_proxy(&self) -> &str {
        &self.cors_proxy
    }

    /// Directory used when an operation gets no explicit `dir`.
    pub fn current_dir(&self) -> String {
        self.resolve_dir(None)
    }

    /// Point subsequent operations at `dir` inside the virtual filesystem.
    /// Not part of [`GitBackend`]: the browser engine has no working-directory
    /// commands, only the folder the host opened.
    pub fn open_dir(&self, dir: impl Into<String>) {
        let dir = dir.into();
        debug!("Browser backend now operating in {}", dir);
        *self.dir.write().unwrap_or_else(PoisonError::into_inner) = dir;
    }

    fn resolve_dir(&self, dir: Option<&str>) -> String {
        match dir {
            Some(d) => d.to_string(),
            None => self.dir.read().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }

    fn default_author(&self) -> Author {
        self.author.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn remote_request(&self, dir: String, opts: &RemoteOptions) -> EngineRemoteRequest {
        EngineRemoteRequest {
            dir,
            remote: opts.remote_or_default().to_string(),
            reference: opts.branch.clone(),
            cors_proxy: self.cors_proxy.clone(),
            credentials: opts.credentials.clone(),
        }
    }
}

#[async_trait]
impl GitBackend for BrowserBackend {
    fn capabilities(&self) -> &'static [Capability] {
        BROWSER_CAPABILITIES
    }

    fn set_author(&self, author: Author) {
        *self.author.write().unwrap_or_else(PoisonError::into_inner) = author;
    }

    async fn is_repository(&self, dir: Option<&str>) -> GitResult<bool> {
        let dir = self.resolve_dir(dir);
        match self.engine.find_root(&dir).await {
            Ok(root) => {
                debug!("Repository root for {} is {}", dir, root);
                Ok(true)
            }
            Err(e) => {
                debug!("{} is not a repository: {}", dir, e);
                Ok(false)
            }
        }
    }

    async fn init(&self, dir: Option<&str>) -> GitResult<()> {
        let dir = self.resolve_dir(dir);
        self.engine
            .init(&dir, DEFAULT_BRANCH)
            .await
            .map_err(wrap("Failed to initialize repository"))?;
        info!("Initialized repository in {}", dir);
        Ok(())
    }

    async fn clone_repo(&self, url: &str, dir: Option<&str>, opts: &CloneOptions) -> GitResult<()> {
        let req = EngineCloneRequest {
            dir: self.resolve_dir(dir),
            url: url.to_string(),
            cors_proxy: self.cors_proxy.clone(),
            reference: opts.branch.clone(),
            depth: opts.depth,
            credentials: opts.credentials.clone(),
        };
        self.engine
            .clone_repo(&req)
            .await
            .map_err(wrap("Failed to clone repository"))?;
        info!("Cloned {} into {}", url, req.dir);
        Ok(())
    }

    async fn add(&self, paths: &[String], dir: Option<&str>) -> GitResult<()> {
        if paths.is_empty() {
            return Err(GitError::Validation("no paths given to add".to_string()));
        }
        let dir = self.resolve_dir(dir);
        for path in paths {
            self.engine
                .add(&dir, path)
                .await
                .map_err(wrap("Failed to add files"))?;
        }
        Ok(())
    }

    async fn remove(&self, paths: &[String], dir: Option<&str>) -> GitResult<()> {
        if paths.is_empty() {
            return Err(GitError::Validation("no paths given to remove".to_string()));
        }
        let dir = self.resolve_dir(dir);
        for path in paths {
            self.engine
                .remove(&dir, path)
                .await
                .map_err(wrap("Failed to remove files"))?;
        }
        Ok(())
    }

    async fn commit(&self, message: &str, dir: Option<&str>, opts: &CommitOptions) -> GitResult<String> {
        let dir = self.resolve_dir(dir);
        let author = opts.author.clone().unwrap_or_else(|| self.default_author());
        self.engine
            .commit(&dir, message, &author, opts.amend)
            .await
            .map_err(wrap("Failed to commit"))
    }

    async fn status(&self, dir: Option<&str>) -> GitResult<GitStatusSnapshot> {
        let dir = self.resolve_dir(dir);
        let rows = self
            .engine
            .status_matrix(&dir)
            .await
            .map_err(wrap("Failed to get status"))?;
        Ok(snapshot_from_matrix(&rows))
    }

    async fn fetch(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        let req = self.remote_request(self.resolve_dir(dir), opts);
        self.engine
            .fetch(&req)
            .await
            .map_err(wrap("Failed to fetch"))
    }

    async fn pull(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        const CONTEXT: &str = "Failed to pull changes";
        let dir = self.resolve_dir(dir);

        let branch = match &opts.branch {
            Some(b) => b.clone(),
            None => self
                .engine
                .current_branch(&dir)
                .await
                .map_err(wrap(CONTEXT))?
                .ok_or_else(|| GitError::operation(CONTEXT, "HEAD is detached"))?,
        };

        let mut fetch_opts = opts.clone();
        fetch_opts.branch = Some(branch.clone());
        let req = self.remote_request(dir.clone(), &fetch_opts);
        self.engine.fetch(&req).await.map_err(wrap(CONTEXT))?;

        // 冲突只以错误形式抛出，没有结构化的冲突报告
        let theirs = format!("{}/{}", req.remote, branch);
        let author = self.default_author();
        self.engine
            .merge(&dir, &branch, &theirs, &author)
            .await
            .map_err(wrap(CONTEXT))
    }

    async fn push(&self, dir: Option<&str>, opts: &RemoteOptions) -> GitResult<()> {
        let req = self.remote_request(self.resolve_dir(dir), opts);
        self.engine
            .push(&req)
            .await
            .map_err(wrap("Failed to push"))
    }

    async fn log(&self, dir: Option<&str>, opts: &LogOptions) -> GitResult<Vec<CommitInfo>> {
        let dir = self.resolve_dir(dir);
        let commits = self
            .engine
            .log(&dir, opts.depth, opts.reference.as_deref())
            .await
            .map_err(wrap("Failed to get log"))?;
        Ok(commits.into_iter().map(to_commit_info).collect())
    }

    async fn list_branches(&self, dir: Option<&str>) -> GitResult<Vec<BranchDescriptor>> {
        const CONTEXT: &str = "Failed to list branches";
        let dir = self.resolve_dir(dir);
        let names = self.engine.list_branches(&dir).await.map_err(wrap(CONTEXT))?;
        let current = self.engine.current_branch(&dir).await.map_err(wrap(CONTEXT))?;

        let mut branches = Vec::with_capacity(names.len());
        for name in names {
            let commit = self
                .engine
                .resolve_ref(&dir, &name)
                .await
                .map_err(wrap(CONTEXT))?;
            branches.push(BranchDescriptor {
                current: current.as_deref() == Some(name.as_str()),
                name,
                commit,
            });
        }
        Ok(branches)
    }

    async fn create_branch(&self, name: &str, dir: Option<&str>, opts: &BranchOptions) -> GitResult<()> {
        let dir = self.resolve_dir(dir);
        self.engine
            .branch(&dir, name, opts.start_point.as_deref(), opts.checkout)
            .await
            .map_err(wrap("Failed to create branch"))
    }

    async fn checkout(&self, reference: &str, dir: Option<&str>) -> GitResult<()> {
        let dir = self.resolve_dir(dir);
        self.engine
            .checkout(&dir, reference)
            .await
            .map_err(wrap("Failed to checkout"))
    }

    async fn delete_branch(&self, name: &str, dir: Option<&str>, force: bool) -> GitResult<()> {
        if force {
            debug!("Browser engine has no forced branch delete, deleting '{}' normally", name);
        }
        let dir = self.resolve_dir(dir);
        self.engine
            .delete_branch(&dir, name)
            .await
            .map_err(wrap("Failed to delete branch"))
    }

    async fn list_remotes(&self, dir: Option<&str>) -> GitResult<Vec<RemoteInfo>> {
        let dir = self.resolve_dir(dir);
        self.engine
            .list_remotes(&dir)
            .await
            .map_err(wrap("Failed to list remotes"))
    }

    async fn add_remote(&self, name: &str, url: &str, dir: Option<&str>) -> GitResult<()> {
        let dir = self.resolve_dir(dir);
        self.engine
            .add_remote(&dir, name, url)
            .await
            .map_err(wrap("Failed to add remote"))
    }

    async fn remove_remote(&self, name: &str, dir: Option<&str>) -> GitResult<()> {
        let dir = self.resolve_dir(dir);
        self.engine
            .delete_remote(&dir, name)
            .await
            .map_err(wrap("Failed to remove remote"))
    }
}
