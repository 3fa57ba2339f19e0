use std::env;

use attest_config::Config;
use attest_types::{CapturedError, Status, StatusDetails};
use log::debug;

/// Tells which worker and machine a test ran on.
pub trait ThreadDetector {
    fn thread(&self) -> Option<String>;
    fn host(&self) -> Option<String>;
}

/// Reads the worker token from an environment variable, as set by parallel
/// runners that fork one process per worker.
#[derive(Debug, Clone)]
pub struct EnvThreadDetector {
    variable: String,
    host: Option<String>,
}

impl EnvThreadDetector {
    #[must_use]
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            host: local_hostname(),
        }
    }

    /// Uses the configured variable and host, falling back to the local
    /// hostname when no host is configured.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            variable: config.thread_variable.clone(),
            host: config.host.clone().or_else(local_hostname),
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }
}

fn local_hostname() -> Option<String> {
    match whoami::fallible::hostname() {
        Ok(host) => Some(host),
        Err(err) => {
            debug!("hostname unavailable: {err}");
            None
        }
    }
}

impl ThreadDetector for EnvThreadDetector {
    fn thread(&self) -> Option<String> {
        env::var(&self.variable).ok().filter(|token| !token.is_empty())
    }

    fn host(&self) -> Option<String> {
        self.host.clone()
    }
}

/// Classifies a captured error into a result status.
pub trait StatusDetector {
    fn status(&self, error: &CapturedError) -> Status;
    fn status_details(&self, error: &CapturedError) -> StatusDetails;
}

/// Assertion-style errors are failures, anything else means the test is
/// broken.
#[derive(Debug, Clone)]
pub struct DefaultStatusDetector {
    failure_kinds: Vec<String>,
}

impl DefaultStatusDetector {
    #[must_use]
    pub fn new(failure_kinds: Vec<String>) -> Self {
        Self { failure_kinds }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.failure_kinds.clone())
    }
}

impl Default for DefaultStatusDetector {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// `PHPUnit\Framework\AssertionFailedError` and `std::io::Error` both end in
// their short name.
fn short_kind(kind: &str) -> &str {
    kind.rsplit(['\\', ':']).next().unwrap_or(kind)
}

impl StatusDetector for DefaultStatusDetector {
    fn status(&self, error: &CapturedError) -> Status {
        let kind = short_kind(&error.kind);
        if self
            .failure_kinds
            .iter()
            .any(|failure| short_kind(failure) == kind)
        {
            Status::Failed
        } else {
            Status::Broken
        }
    }

    fn status_details(&self, error: &CapturedError) -> StatusDetails {
        StatusDetails {
            message: Some(error.message.clone()),
            trace: error.trace.clone(),
        }
    }
}
