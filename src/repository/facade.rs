//! Repository Operations Facade
//!
//! Tracks the "current repository" and runs the user-level workflows
//! (open folder, clone, init, fetch/pull/push, status) on top of the
//! dispatcher. Every workflow resolves to an [`OperationResult`]; backend
//! errors never escape as `Err`.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::{debug, info, warn};

use super::url::is_valid_git_url;
use crate::git::{
    CloneOptions, GitBackend, GitDispatcher, GitError, GitStatusSnapshot, RemoteOptions,
};

/// Identity of the repository the user is working in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDescriptor {
    pub path: String,
    pub name: String,
    pub is_repository: bool,
}

impl RepositoryDescriptor {
    /// `name` is the last path component, or the path itself for roots.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        Self {
            path,
            name,
            is_repository: true,
        }
    }
}

/// Uniform result of a facade workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult<T = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> OperationResult<T> {
    pub fn ok(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Folder chosen in the host's picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSelection {
    pub folder_path: String,
}

/// What the host's "open folder" menu action returns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuActionResult {
    pub success: bool,
    #[serde(default)]
    pub data: Option<FolderSelection>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Host-provided folder picker
#[async_trait]
pub trait FolderPicker: Send + Sync {
    async fn open_folder(&self) -> MenuActionResult;
}

pub type RepositoryListener = Arc<dyn Fn(Option<&RepositoryDescriptor>) + Send + Sync>;

type Derivation = Shared<BoxFuture<'static, Option<RepositoryDescriptor>>>;

/// Handle returned by [`RepositoryFacade::on_repository_change`]
#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe()"]
pub struct Subscription {
    id: u64,
    inner: Weak<FacadeInner>,
}

impl Subscription {
    /// Remove the listener. No-op once the facade is gone.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

struct FacadeInner {
    dispatcher: Arc<GitDispatcher>,
    picker: Arc<dyn FolderPicker>,
    current: RwLock<Option<RepositoryDescriptor>>,
    listeners: Mutex<Vec<(u64, RepositoryListener)>>,
    next_listener: AtomicU64,
    refresh: Mutex<RefreshSlots>,
    generation: AtomicU64,
}

/// 正在进行的检测与排在其后的一次补充检测
///
/// A caller arriving while `running` is in flight may have just mutated the
/// repository, so it must not reuse that result. It joins `queued`, which
/// starts only after `running` settles; later arrivals share `queued`.
#[derive(Default)]
struct RefreshSlots {
    running: Option<(u64, Derivation)>,
    queued: Option<(u64, Derivation)>,
}

impl FacadeInner {
    async fn derive(&self) -> Option<RepositoryDescriptor> {
        match self.dispatcher.is_repository(None).await {
            Ok(true) => Some(RepositoryDescriptor::from_path(
                self.resolve_working_dir().await,
            )),
            Ok(false) => None,
            Err(e) => {
                warn!("Repository check failed: {}", e);
                None
            }
        }
    }

    /// Backend directory, then (native only) the process cwd, then "/".
    ///
    /// A browser backend always knows its directory; the process cwd means
    /// nothing inside its virtual filesystem.
    async fn resolve_working_dir(&self) -> String {
        match self.dispatcher.working_directory().await {
            Ok(dir) if !dir.is_empty() => return dir,
            Ok(_) => {}
            Err(e) => debug!("Backend working directory unavailable: {}", e),
        }
        if self.dispatcher.is_native() {
            if let Ok(cwd) = std::env::current_dir() {
                return cwd.to_string_lossy().into_owned();
            }
        }
        "/".to_string()
    }

    fn publish(&self, descriptor: Option<RepositoryDescriptor>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = descriptor.clone();

        // 回调在锁外执行，允许监听器内部再次订阅/退订
        let listeners: Vec<RepositoryListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(descriptor.as_ref());
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, RefreshSlots> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Derive, publish and release the `running` slot.
    async fn run_derivation(self: Arc<Self>, generation: u64) -> Option<RepositoryDescriptor> {
        let descriptor = self.derive().await;
        self.publish(descriptor.clone());
        let mut slots = self.slots();
        if matches!(slots.running.as_ref(), Some((g, _)) if *g == generation) {
            slots.running = None;
        }
        descriptor
    }
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RepositoryFacade {
    inner: Arc<FacadeInner>,
}

impl RepositoryFacade {
    pub fn new(dispatcher: Arc<GitDispatcher>, picker: Arc<dyn FolderPicker>) -> Self {
        Self {
            inner: Arc::new(FacadeInner {
                dispatcher,
                picker,
                current: RwLock::new(None),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                refresh: Mutex::new(RefreshSlots::default()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Arc<GitDispatcher> {
        &self.inner.dispatcher
    }

    pub fn current_repository(&self) -> Option<RepositoryDescriptor> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a listener for repository changes.
    pub fn on_repository_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Option<&RepositoryDescriptor>) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Re-derive the current repository and notify listeners.
    ///
    /// The result always reflects state sampled after this call started. A
    /// call that overlaps an in-flight check waits for one follow-up check
    /// instead; overlapping calls share that follow-up, so listeners fire at
    /// most twice for any burst.
    pub async fn check_repository(&self) -> Option<RepositoryDescriptor> {
        let derivation = {
            let mut slots = self.inner.slots();
            let running = slots.running.as_ref().map(|(_, d)| d.clone());
            let queued = slots.queued.as_ref().map(|(_, d)| d.clone());
            match (running, queued) {
                (_, Some(queued)) => queued,
                (None, None) => {
                    let generation = self.next_generation();
                    let shared = Arc::clone(&self.inner)
                        .run_derivation(generation)
                        .boxed()
                        .shared();
                    slots.running = Some((generation, shared.clone()));
                    shared
                }
                (Some(previous), None) => {
                    let generation = self.next_generation();
                    let inner = Arc::clone(&self.inner);
                    let shared = async move {
                        previous.await;
                        {
                            // 接替为当前检测，之后到达的调用会排在它后面
                            let mut slots = inner.slots();
                            if matches!(slots.queued.as_ref(), Some((g, _)) if *g == generation) {
                                let next = slots.queued.take();
                                slots.running = next;
                            }
                        }
                        inner.run_derivation(generation).await
                    }
                    .boxed()
                    .shared();
                    slots.queued = Some((generation, shared.clone()));
                    shared
                }
            }
        };
        derivation.await
    }

    fn next_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Ask the host for a folder, make it the working directory and re-check.
    pub async fn open_folder(&self) -> OperationResult<RepositoryDescriptor> {
        let selection = self.inner.picker.open_folder().await;
        if !selection.success {
            return OperationResult::fail(
                selection
                    .message
                    .unwrap_or_else(|| "Failed to open folder".to_string()),
            );
        }
        let Some(FolderSelection { folder_path }) = selection.data else {
            return OperationResult::fail("No folder selected");
        };

        if let Err(e) = self.inner.dispatcher.open_directory(&folder_path).await {
            return OperationResult::fail(e.to_string());
        }

        info!("Opened folder {}", folder_path);
        match self.check_repository().await {
            Some(repo) => OperationResult::ok(
                format!("Opened git repository {}", repo.name),
                Some(repo),
            ),
            None => OperationResult::ok(
                format!("Opened folder {} (not a git repository)", folder_path),
                None,
            ),
        }
    }

    pub async fn clone_repository(&self, url: &str) -> OperationResult<RepositoryDescriptor> {
        self.clone_repository_with(url, &CloneOptions::default())
            .await
    }

    pub async fn clone_repository_with(
        &self,
        url: &str,
        opts: &CloneOptions,
    ) -> OperationResult<RepositoryDescriptor> {
        let url = url.trim();
        if url.is_empty() {
            let err = GitError::Validation("Repository URL is required".to_string());
            return OperationResult::fail(err.to_string());
        }
        if !is_valid_git_url(url) {
            // 仅提示，不阻止（自建服务器等）
            debug!("Cloning from an unrecognized URL shape: {}", url);
        }

        if let Err(e) = self.inner.dispatcher.clone_repo(url, None, opts).await {
            return OperationResult::fail(e.to_string());
        }
        info!("Cloned {}", url);
        let repo = self.check_repository().await;
        OperationResult::ok("Repository cloned successfully", repo)
    }

    pub async fn init_repository(&self) -> OperationResult<RepositoryDescriptor> {
        if let Err(e) = self.inner.dispatcher.init(None).await {
            return OperationResult::fail(e.to_string());
        }
        let repo = self.check_repository().await;
        OperationResult::ok("Repository initialized", repo)
    }

    pub async fn fetch_repository(&self, opts: &RemoteOptions) -> OperationResult {
        match self.inner.dispatcher.fetch(None, opts).await {
            Ok(()) => OperationResult::ok(
                format!("Fetched from {}", opts.remote_or_default()),
                None,
            ),
            Err(e) => OperationResult::fail(e.to_string()),
        }
    }

    pub async fn pull_repository(&self, opts: &RemoteOptions) -> OperationResult<RepositoryDescriptor> {
        if let Err(e) = self.inner.dispatcher.pull(None, opts).await {
            return OperationResult::fail(e.to_string());
        }
        let repo = self.check_repository().await;
        OperationResult::ok(
            format!("Pulled from {}", opts.remote_or_default()),
            repo,
        )
    }

    pub async fn push_repository(&self, opts: &RemoteOptions) -> OperationResult {
        match self.inner.dispatcher.push(None, opts).await {
            Ok(()) => OperationResult::ok(
                format!("Pushed to {}", opts.remote_or_default()),
                None,
            ),
            Err(e) => OperationResult::fail(e.to_string()),
        }
    }

    pub async fn get_git_status(&self) -> OperationResult<GitStatusSnapshot> {
        match self.inner.dispatcher.status(None).await {
            Ok(status) => {
                let message = if status.is_clean() {
                    "Working tree clean".to_string()
                } else {
                    format!("{} changed file(s)", status.len())
                };
                OperationResult::ok(message, Some(status))
            }
            Err(e) => OperationResult::fail(e.to_string()),
        }
    }

    /// Re-check the repository, then read its status.
    pub async fn refresh_status(&self) -> OperationResult<GitStatusSnapshot> {
        if self.check_repository().await.is_none() {
            return OperationResult::fail("Not a git repository");
        }
        self.get_git_status().await
    }

    pub fn is_valid_git_url(&self, url: &str) -> bool {
        is_valid_git_url(url)
    }
}
