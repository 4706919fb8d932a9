use std::fmt;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::rewrite::RewriteError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to access {path}: {source}")]
    Io {
        source: std::io::Error,
        path: Utf8PathBuf,
    },
    #[error("golden file {path} not found; rerun with E2E_UPDATE_GOLDEN=true to record it")]
    MissingGolden { path: Utf8PathBuf },
    #[error("invalid golden name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("invalid golden record {path}: {reason}")]
    InvalidRecord { path: Utf8PathBuf, reason: String },
    #[error("invalid JSON in {context}: {source}")]
    InvalidJson {
        context: &'static str,
        source: serde_json::Error,
    },
    #[error("response is not JSON (content-type: {content_type:?})")]
    NotJson { content_type: String },
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("handler failed: {0}")]
    Handler(BoxError),
    #[error("failed to start handler runtime: {0}")]
    Runtime(std::io::Error),
    #[error("failed to load run configuration: {0}")]
    Config(Box<figment::Error>),
    #[error("{name} failed:\n{}", Failures(.failures))]
    TestFailed { name: String, failures: Vec<Failure> },
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::Request(err.to_string())
    }
}

/// One recorded problem of a test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub case: String,
    pub message: String,
    pub fatal: bool,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.fatal { "fatal" } else { "error" };
        write!(f, "--- {} [{}]: {}", self.case, kind, self.message)
    }
}

struct Failures<'a>(&'a [Failure]);

impl fmt::Display for Failures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in self.0 {
            writeln!(f, "{failure}")?;
        }
        Ok(())
    }
}
