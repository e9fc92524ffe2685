//! Host environment detection
//!
//! The host shell hands its collaborators over in a [`HostContext`]; the
//! detector only looks at what is present and never caches the answer.

use serde::Serialize;
use std::sync::Arc;

use super::browser::BrowserGitEngine;
use crate::bridge::NativeChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostEnvironment {
    Native,
    Browser,
    Unknown,
}

/// `{native, browser}` pair, never both true
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnvironmentFlags {
    pub native: bool,
    pub browser: bool,
}

impl HostEnvironment {
    pub fn detect(host: &HostContext) -> HostEnvironment {
        if host.native.is_some() {
            HostEnvironment::Native
        } else if host.browser_globals {
            HostEnvironment::Browser
        } else {
            HostEnvironment::Unknown
        }
    }

    pub fn flags(&self) -> EnvironmentFlags {
        EnvironmentFlags {
            native: *self == HostEnvironment::Native,
            browser: *self == HostEnvironment::Browser,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostEnvironment::Native => "native",
            HostEnvironment::Browser => "browser",
            HostEnvironment::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HostEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators provided by whatever embeds the git layer.
#[derive(Default)]
pub struct HostContext {
    /// Native bridge, present only when hosted by the desktop shell
    pub native: Option<NativeChannel>,
    /// In-browser engine over the virtual filesystem
    pub browser_engine: Option<Arc<dyn BrowserGitEngine>>,
    /// Browser globals (window, storage) detected
    pub browser_globals: bool,
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native(mut self, channel: NativeChannel) -> Self {
        self.native = Some(channel);
        self
    }

    pub fn with_browser_engine(mut self, engine: Arc<dyn BrowserGitEngine>) -> Self {
        self.browser_engine = Some(engine);
        self
    }

    pub fn with_browser_globals(mut self, present: bool) -> Self {
        self.browser_globals = present;
        self
    }

    pub fn environment(&self) -> HostEnvironment {
        HostEnvironment::detect(self)
    }
}
