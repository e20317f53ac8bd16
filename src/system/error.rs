use thiserror::Error;

/// A single field could not be read. Always recovered by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("process exited before it could be read")]
    Exited,
    #[error("access denied")]
    AccessDenied,
    #[error("value unavailable: {0}")]
    Unavailable(String),
}

/// A failure affecting the whole snapshot. Surfaces once per tick.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("process collection is not supported on this platform")]
    Unsupported,
    #[error("process enumeration failed: {0}")]
    ProcessEnumeration(String),
    #[error("network collection failed: {0}")]
    Network(String),
    #[error("collection task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio::task::JoinError> for CollectionError {
    fn from(err: tokio::task::JoinError) -> Self {
        CollectionError::TaskFailed(err.to_string())
    }
}

/// Outcome of a fallible accessor after a default has been substituted.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    Value(T),
    Defaulted { value: T, reason: ReadError },
}

impl<T> Reading<T> {
    pub fn from_result(result: Result<T, ReadError>, default: impl FnOnce(&ReadError) -> T) -> Self {
        match result {
            Ok(value) => Reading::Value(value),
            Err(reason) => Reading::Defaulted {
                value: default(&reason),
                reason,
            },
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Reading::Defaulted { .. })
    }

    pub fn reason(&self) -> Option<&ReadError> {
        match self {
            Reading::Value(_) => None,
            Reading::Defaulted { reason, .. } => Some(reason),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Reading::Value(value) | Reading::Defaulted { value, .. } => value,
        }
    }
}
