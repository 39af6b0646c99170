use std::io;

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum StoreErrKind {
    #[error("io failure: {0}")]
    Io(String),
    #[error("encode failure: {0}")]
    Encode(String),
    #[error("run not found: {0}")]
    NotFound(String),
    #[error("run record corrupt: {0}")]
    Corrupt(String),
}

#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct StoreError(pub StoreErrKind);

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn new(kind: StoreErrKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &StoreErrKind {
        &self.0
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self(StoreErrKind::NotFound(id.into()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.0, StoreErrKind::NotFound(_))
    }
}

impl From<StoreErrKind> for StoreError {
    fn from(kind: StoreErrKind) -> Self {
        StoreError(kind)
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError(StoreErrKind::Io(err.to_string()))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError(StoreErrKind::Encode(err.to_string()))
    }
}
