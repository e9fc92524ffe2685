//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use gitbridge_core::bridge::{NativeChannel, NativePort, RequestEnvelope, ResponseEnvelope};
use gitbridge_core::git::browser::{
    BrowserGitEngine, EngineCloneRequest, EngineCommit, EngineError, EngineRemoteRequest,
    StatusRow,
};
use gitbridge_core::git::{Author, RemoteInfo};
use gitbridge_core::repository::{FolderPicker, FolderSelection, MenuActionResult};

// ============================================================================
// In-memory browser engine
// ============================================================================

#[derive(Default)]
pub struct EngineState {
    pub repos: BTreeSet<String>,
    pub calls: Vec<String>,
    pub failures: BTreeMap<&'static str, String>,
    pub matrix: Vec<StatusRow>,
    pub branches: Vec<String>,
    pub current: Option<String>,
    pub remotes: Vec<RemoteInfo>,
    pub commits: Vec<EngineCommit>,
    pub merges: Vec<(String, String)>,
    pub last_clone: Option<EngineCloneRequest>,
    pub find_root_delay: Option<Duration>,
}

/// Records every call; repositories exist once `init` or `clone_repo` ran.
#[derive(Default)]
pub struct FakeEngine {
    pub state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_repo(dir: &str) -> Arc<Self> {
        let engine = Self::default();
        {
            let mut state = engine.state.lock().unwrap();
            state.repos.insert(dir.to_string());
            state.branches = vec!["main".to_string()];
            state.current = Some("main".to_string());
        }
        Arc::new(engine)
    }

    pub fn fail(&self, op: &'static str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op, message.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, op: &'static str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        match state.failures.get(op) {
            Some(message) => Err(EngineError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BrowserGitEngine for FakeEngine {
    async fn find_root(&self, dir: &str) -> Result<String, EngineError> {
        self.record("find_root")?;
        // 先取样再等待，模拟检测期间仓库被并发修改
        let (found, delay) = {
            let state = self.state.lock().unwrap();
            (state.repos.contains(dir), state.find_root_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if found {
            Ok(dir.to_string())
        } else {
            Err(EngineError::new(format!("Could not find git root for {}", dir)))
        }
    }

    async fn init(&self, dir: &str, default_branch: &str) -> Result<(), EngineError> {
        self.record("init")?;
        let mut state = self.state.lock().unwrap();
        state.repos.insert(dir.to_string());
        state.branches = vec![default_branch.to_string()];
        state.current = Some(default_branch.to_string());
        Ok(())
    }

    async fn clone_repo(&self, req: &EngineCloneRequest) -> Result<(), EngineError> {
        self.record("clone_repo")?;
        let mut state = self.state.lock().unwrap();
        state.repos.insert(req.dir.clone());
        state.branches = vec!["main".to_string()];
        state.current = Some("main".to_string());
        state.last_clone = Some(req.clone());
        Ok(())
    }

    async fn add(&self, _dir: &str, _filepath: &str) -> Result<(), EngineError> {
        self.record("add")
    }

    async fn remove(&self, _dir: &str, _filepath: &str) -> Result<(), EngineError> {
        self.record("remove")
    }

    async fn commit(
        &self,
        _dir: &str,
        message: &str,
        author: &Author,
        _amend: bool,
    ) -> Result<String, EngineError> {
        self.record("commit")?;
        let mut state = self.state.lock().unwrap();
        let oid = format!("{:040x}", state.commits.len() + 1);
        state.commits.insert(
            0,
            EngineCommit {
                oid: oid.clone(),
                message: message.to_string(),
                author_name: author.name.clone(),
                author_email: author.email.clone(),
                timestamp: 1_700_000_000,
            },
        );
        Ok(oid)
    }

    async fn status_matrix(&self, _dir: &str) -> Result<Vec<StatusRow>, EngineError> {
        self.record("status_matrix")?;
        Ok(self.state.lock().unwrap().matrix.clone())
    }

    async fn fetch(&self, _req: &EngineRemoteRequest) -> Result<(), EngineError> {
        self.record("fetch")
    }

    async fn merge(
        &self,
        _dir: &str,
        ours: &str,
        theirs: &str,
        _author: &Author,
    ) -> Result<(), EngineError> {
        self.record("merge")?;
        self.state
            .lock()
            .unwrap()
            .merges
            .push((ours.to_string(), theirs.to_string()));
        Ok(())
    }

    async fn push(&self, _req: &EngineRemoteRequest) -> Result<(), EngineError> {
        self.record("push")
    }

    async fn log(
        &self,
        _dir: &str,
        depth: Option<usize>,
        _reference: Option<&str>,
    ) -> Result<Vec<EngineCommit>, EngineError> {
        self.record("log")?;
        let commits = self.state.lock().unwrap().commits.clone();
        Ok(commits.into_iter().take(depth.unwrap_or(usize::MAX)).collect())
    }

    async fn list_branches(&self, _dir: &str) -> Result<Vec<String>, EngineError> {
        self.record("list_branches")?;
        Ok(self.state.lock().unwrap().branches.clone())
    }

    async fn current_branch(&self, _dir: &str) -> Result<Option<String>, EngineError> {
        self.record("current_branch")?;
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn resolve_ref(&self, _dir: &str, reference: &str) -> Result<String, EngineError> {
        self.record("resolve_ref")?;
        Ok(format!("oid-{}", reference))
    }

    async fn branch(
        &self,
        _dir: &str,
        name: &str,
        _start_point: Option<&str>,
        checkout: bool,
    ) -> Result<(), EngineError> {
        self.record("branch")?;
        let mut state = self.state.lock().unwrap();
        state.branches.push(name.to_string());
        if checkout {
            state.current = Some(name.to_string());
        }
        Ok(())
    }

    async fn checkout(&self, _dir: &str, reference: &str) -> Result<(), EngineError> {
        self.record("checkout")?;
        self.state.lock().unwrap().current = Some(reference.to_string());
        Ok(())
    }

    async fn delete_branch(&self, _dir: &str, name: &str) -> Result<(), EngineError> {
        self.record("delete_branch")?;
        self.state.lock().unwrap().branches.retain(|b| b != name);
        Ok(())
    }

    async fn list_remotes(&self, _dir: &str) -> Result<Vec<RemoteInfo>, EngineError> {
        self.record("list_remotes")?;
        Ok(self.state.lock().unwrap().remotes.clone())
    }

    async fn add_remote(&self, _dir: &str, name: &str, url: &str) -> Result<(), EngineError> {
        self.record("add_remote")?;
        self.state.lock().unwrap().remotes.push(RemoteInfo {
            name: name.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    async fn delete_remote(&self, _dir: &str, name: &str) -> Result<(), EngineError> {
        self.record("delete_remote")?;
        self.state.lock().unwrap().remotes.retain(|r| r.name != name);
        Ok(())
    }
}

// ============================================================================
// Scripted native peer
// ============================================================================

type Answer = Box<dyn Fn(&RequestEnvelope) -> Option<ResponseEnvelope> + Send + Sync>;

/// Answers requests through a closure; `None` leaves a request unanswered.
pub struct ScriptedNative {
    inbound: mpsc::UnboundedSender<String>,
    pub seen: Mutex<Vec<RequestEnvelope>>,
    answer: Answer,
}

impl ScriptedNative {
    pub fn channel(
        answer: impl Fn(&RequestEnvelope) -> Option<ResponseEnvelope> + Send + Sync + 'static,
    ) -> (NativeChannel, Arc<ScriptedNative>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let port = Arc::new(ScriptedNative {
            inbound: tx,
            seen: Mutex::new(Vec::new()),
            answer: Box::new(answer),
        });
        (NativeChannel::new(port.clone(), rx), port)
    }

    pub fn commands(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }
}

impl NativePort for ScriptedNative {
    fn post_message(&self, message: String) -> Result<(), String> {
        let req: RequestEnvelope = serde_json::from_str(&message).map_err(|e| e.to_string())?;
        let reply = (self.answer)(&req);
        self.seen.lock().unwrap().push(req);
        if let Some(reply) = reply {
            self.inbound
                .send(serde_json::to_string(&reply).unwrap())
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

// ============================================================================
// Folder picker
// ============================================================================

pub struct FakePicker {
    pub result: MenuActionResult,
}

impl FakePicker {
    pub fn choosing(path: &str) -> Arc<Self> {
        Arc::new(Self {
            result: MenuActionResult {
                success: true,
                data: Some(FolderSelection {
                    folder_path: path.to_string(),
                }),
                message: None,
            },
        })
    }

    pub fn cancelled() -> Arc<Self> {
        Arc::new(Self {
            result: MenuActionResult {
                success: false,
                data: None,
                message: Some("Folder selection cancelled".to_string()),
            },
        })
    }
}

#[async_trait]
impl FolderPicker for FakePicker {
    async fn open_folder(&self) -> MenuActionResult {
        self.result.clone()
    }
}
