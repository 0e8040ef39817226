use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A remote call against the cluster failed or did not answer in time.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{operation} timed out after {}ms", .limit.as_millis())]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },
    #[error("{operation} failed: {source}")]
    Remote {
        operation: String,
        #[source]
        source: BoxError,
    },
}

impl FetchError {
    pub fn remote(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Remote {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// The input source could not be read. Always fatal.
#[derive(Debug, Error)]
#[error("failed to read terminal input: {0}")]
pub struct DecodeError(#[from] pub io::Error);

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Failure of a synchronous controller action. Reported on the status line.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("no {view} selected")]
    NothingSelected { view: &'static str },
    #[error("{action} is only available in the Pods view")]
    PodsOnly { action: &'static str },
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("display task terminated abnormally: {0}")]
    TaskLost(#[from] JoinError),
    #[error("terminal canvas is not available")]
    CanvasUnavailable,
}
