// Git module - unified git control layer
//
// This module is split into logical submodules:
// - types: Data model shared by both backends (status, branches, option bags)
// - error: GitError taxonomy
// - capability: Static capability sets
// - backend: The GitBackend trait (full operation surface)
// - environment: Host environment detection
// - browser: Backend A, in-browser engine adapter
// - native: Backend B, native bridge adapter
// - dispatcher: Environment-bound dispatcher

pub mod backend;
pub mod browser;
pub mod capability;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod native;
pub mod types;

pub use backend::GitBackend;
pub use browser::{BrowserBackend, BrowserGitEngine, EngineError, StatusRow};
pub use capability::Capability;
pub use dispatcher::{BoundBackend, GitDispatcher};
pub use environment::{EnvironmentFlags, HostContext, HostEnvironment};
pub use error::{GitError, GitResult};
pub use native::NativeBackend;
pub use types::*;
