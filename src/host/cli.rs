//! Thin wrapper over the `git` binary
//!
//! All invocations are blocking; callers run them on the blocking pool.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;
use tracing::trace;

use crate::git::types::Author;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Not a git repository: {0}")]
    NotARepository(String),
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    CommandFailed(String),
}

impl From<serde_json::Error> for HostError {
    fn from(e: serde_json::Error) -> Self {
        HostError::InvalidParams(e.to_string())
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Resolved `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    /// Look `git` up on PATH, falling back to the bare name.
    pub fn locate() -> Self {
        let program = which::which("git").unwrap_or_else(|_| PathBuf::from("git"));
        Self { program }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Bind to a directory and optional commit identity.
    pub fn at<'a>(&'a self, dir: &'a Path, author: Option<&'a Author>) -> Invocation<'a> {
        Invocation {
            cli: self,
            dir,
            author,
        }
    }
}

/// A directory-bound git runner
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    cli: &'a GitCli,
    dir: &'a Path,
    author: Option<&'a Author>,
}

impl<'a> Invocation<'a> {
    pub fn dir(&self) -> &Path {
        self.dir
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.cli.program);
        cmd.args(args)
            .current_dir(self.dir)
            // 永不等待终端输入
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(author) = self.author {
            cmd.env("GIT_AUTHOR_NAME", &author.name)
                .env("GIT_AUTHOR_EMAIL", &author.email)
                .env("GIT_COMMITTER_NAME", &author.name)
                .env("GIT_COMMITTER_EMAIL", &author.email);
        }
        cmd
    }

    /// Raw output, whatever the exit status.
    pub fn output(&self, args: &[&str]) -> HostResult<Output> {
        trace!("git {} (in {})", args.join(" "), self.dir.display());
        Ok(self.command(args).output()?)
    }

    /// Stdout of a successful run; stderr (or stdout) as the error otherwise.
    pub fn run(&self, args: &[&str]) -> HostResult<String> {
        let output = self.output(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(HostError::CommandFailed(failure_text(&output)))
        }
    }

    /// Like [`Invocation::run`], trimmed.
    pub fn run_trimmed(&self, args: &[&str]) -> HostResult<String> {
        self.run(args).map(|s| s.trim().to_string())
    }

    /// Trimmed stdout of a successful run, `None` otherwise.
    pub fn try_run(&self, args: &[&str]) -> Option<String> {
        self.run_trimmed(args).ok().filter(|s| !s.is_empty())
    }
}

/// Most useful human text out of a failed run.
pub fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("git exited with {}", output.status)
}

/// Refuse values that git would parse as options.
pub fn ensure_not_option(field: &str, value: &str) -> HostResult<()> {
    if value.is_empty() {
        return Err(HostError::InvalidParams(format!("{} must not be empty", field)));
    }
    if value.starts_with('-') {
        return Err(HostError::InvalidParams(format!(
            "{} must not start with '-': {}",
            field, value
        )));
    }
    Ok(())
}
