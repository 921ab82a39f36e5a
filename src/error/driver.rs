use std::any::Any;

use amino_error::{ErrorExt, GenericError, StatusCode};
use thiserror::Error;

use crate::Method;

pub type DriverResult<T> = Result<T, DriverError>;

/// Ошибки, которые возвращает или эмитит драйвер.
///
/// Ядро не интерпретирует их: они либо возвращаются вызывающему как есть,
/// либо пересылаются через событие `error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("method not supported by driver: {0}")]
    Unsupported(Method),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid driver option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("no responder registered for host: {0}")]
    NoResponder(String),

    #[error("queue already has a processor: {0}")]
    AlreadyProcessing(String),

    #[error("driver requires a tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Custom(#[from] GenericError),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    pub fn invalid_option(
        key: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidOption {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl ErrorExt for DriverError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unsupported(_) => StatusCode::MethodNotImplemented,
            Self::Connect(_) => StatusCode::ConnectFailed,
            Self::InvalidOption { .. } => StatusCode::InvalidOption,
            Self::InvalidUrl(_) => StatusCode::InvalidUrl,
            Self::NoResponder(_) => StatusCode::NotFound,
            Self::AlreadyProcessing(_) => StatusCode::Busy,
            Self::NoRuntime => StatusCode::NoRuntime,
            Self::Custom(e) => e.status_code(),
            Self::Other(_) => StatusCode::Unknown,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
