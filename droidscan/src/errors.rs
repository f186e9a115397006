use std::io;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::utils::path_must_str;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("required binary `{0}` not available to context")]
    MissingBin(String),
    #[error("missing required env var: {0}")]
    MissingEnv(String),

    #[error("{0}")]
    IO(io::Error),

    #[error("invalid env var {0} ({1})")]
    InvalidEnv(String, String),

    #[error("command failed with status {0}: {1}")]
    CommandError(i32, String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("task was cancelled by user")]
    Cancelled,

    #[error("adb server unreachable at {0}")]
    AdbUnreachable(String),
    #[error("adb server error: {0}")]
    AdbServer(String),

    #[error("no adb device connected")]
    NoAdbDevice,
    #[error("adb device {0} not found")]
    AdbDeviceNotFound(String),

    #[error("invalid package name {0:?}")]
    InvalidPackage(String),

    #[error("failed to get basedirs")]
    NoBaseDirs,

    #[error("generic error: {0}")]
    Generic(String),

    #[error("invalid config {0}: {1}")]
    InvalidConfig(String, String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("json error: {0}")]
    Json(String),

    #[error("file {0} doesn't exist")]
    MissingFile(String),
}

impl Error {
    pub fn new_generic<S: ToString + ?Sized>(s: &S) -> Self {
        Self::Generic(s.to_string())
    }

    pub fn new_cfg<S: ToString + ?Sized>(path: &Path, s: &S) -> Self {
        let as_str = path_must_str(path.as_ref());
        Self::InvalidConfig(as_str.into(), s.to_string())
    }

    /// Errors that mean the whole scan has to stop rather than degrade a
    /// single package record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::Cancelled
                | Self::AdbUnreachable(_)
                | Self::NoAdbDevice
                | Self::AdbDeviceNotFound(_)
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::IO(err)
    }
}

impl From<adb_client::RustADBError> for Error {
    fn from(value: adb_client::RustADBError) -> Self {
        Self::AdbServer(value.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}
