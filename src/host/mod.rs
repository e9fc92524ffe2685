//! Native Git Host
//!
//! The native side of the bridge: decodes request envelopes, runs the git
//! CLI on the blocking pool and answers with response envelopes. Paired with
//! [`loopback::connect`] it gives a [`crate::bridge::Correlator`] a real
//! native peer inside the same process.

mod cli;
mod commands;
pub mod loopback;
mod parse;

pub use cli::{GitCli, HostError};

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use crate::bridge::envelope::peek_request_id;
use crate::bridge::{GitCommand, RequestEnvelope, ResponseEnvelope};
use commands::CommonParams;

pub struct NativeGitHost {
    cli: Arc<GitCli>,
    working_dir: RwLock<PathBuf>,
}

impl NativeGitHost {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::with_cli(GitCli::locate(), working_dir)
    }

    pub fn with_cli(cli: GitCli, working_dir: impl Into<PathBuf>) -> Self {
        let cli = Arc::new(cli);
        debug!("Native git host using {}", cli.program().display());
        Self {
            cli,
            working_dir: RwLock::new(working_dir.into()),
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Handle one raw bridge message.
    ///
    /// Returns the encoded response, or `None` when the message cannot be
    /// answered because no requestId could be recovered from it.
    pub async fn handle(&self, raw: &str) -> Option<String> {
        let request: RequestEnvelope = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                let value: Value = serde_json::from_str(raw).ok()?;
                let Some(request_id) = peek_request_id(&value) else {
                    warn!("Dropping bridge request without requestId: {}", e);
                    return None;
                };
                return encode(ResponseEnvelope::fail(
                    request_id,
                    format!("Malformed request: {}", e),
                ));
            }
        };

        let response = match self.execute(&request).await {
            Ok(data) => ResponseEnvelope::ok(&request.request_id, data),
            Err(message) => {
                debug!("{} ({}) failed: {}", request.command, request.request_id, message);
                ResponseEnvelope::fail(&request.request_id, message)
            }
        };
        encode(response)
    }

    async fn execute(&self, request: &RequestEnvelope) -> Result<Value, String> {
        let Some(command) = GitCommand::parse(&request.command) else {
            return Err(format!("Unknown command: {}", request.command));
        };

        let common: CommonParams =
            serde_json::from_value(if request.params.is_null() {
                Value::Object(Default::default())
            } else {
                request.params.clone()
            })
            .map_err(|e| HostError::from(e).to_string())?;
        let dir = common
            .working_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| self.working_dir());

        match command {
            GitCommand::GitGetWorkingDirectory => {
                Ok(Value::String(self.working_dir().to_string_lossy().into_owned()))
            }
            GitCommand::GitSetWorkingDirectory => self.set_working_dir(&dir),
            _ => {
                let cli = Arc::clone(&self.cli);
                let params = request.params.clone();
                tokio::task::spawn_blocking(move || commands::run(&cli, command, &dir, &params))
                    .await
                    .map_err(|e| {
                        error!("git worker for {} panicked: {}", command, e);
                        format!("internal error running {}", command)
                    })?
                    .map_err(|e| e.to_string())
            }
        }
    }

    fn set_working_dir(&self, dir: &Path) -> Result<Value, String> {
        if !dir.is_dir() {
            return Err(format!("Not a directory: {}", dir.display()));
        }
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        info!("Working directory set to {}", dir.display());
        *self
            .working_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dir;
        Ok(Value::Null)
    }
}

fn encode(response: ResponseEnvelope) -> Option<String> {
    match serde_json::to_string(&response) {
        Ok(s) => Some(s),
        Err(e) => {
            error!("Failed to encode response {}: {}", response.request_id, e);
            None
        }
    }
}
