//! gitbridge-core: a unified Git control layer.
//!
//! Callers talk to one [`git::GitDispatcher`], which binds at construction to
//! either an in-browser engine ([`git::BrowserBackend`]) or a native host
//! reached over a message bridge ([`git::NativeBackend`] via
//! [`bridge::Correlator`]). [`repository::RepositoryFacade`] layers the
//! user-level workflows on top. [`host`] is a reference native host that
//! answers bridge requests with the git CLI.

pub mod bridge;
pub mod config;
pub mod git;
pub mod host;
pub mod repository;
pub mod util;

pub use config::GitBridgeConfig;
pub use git::{GitBackend, GitDispatcher, GitError, GitResult, HostContext, HostEnvironment};
pub use repository::{OperationResult, RepositoryDescriptor, RepositoryFacade};
