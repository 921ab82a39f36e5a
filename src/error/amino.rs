use std::any::Any;

use amino_error::{ErrorExt, StatusCode};
use thiserror::Error;

use super::DriverError;
use crate::{Method, Pattern};

pub type AminoResult<T> = Result<T, AminoError>;

/// Ошибки фасада.
///
/// `PatternNotConfigured` и `MethodNotImplemented` это ошибки использования:
/// возвращаются сразу и никогда не попадают в очередь команд.
#[derive(Debug, Error)]
pub enum AminoError {
    // ==== Usage ====
    #[error("Pattern not configured: {0}")]
    PatternNotConfigured(Pattern),

    #[error("Method not implemented: {method} (pattern {pattern})")]
    MethodNotImplemented { pattern: Pattern, method: Method },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    // ==== Driver loading ====
    #[error("Driver '{driver}' not found for pattern {pattern}")]
    DriverNotFound { pattern: Pattern, driver: String },

    #[error("Driver '{driver}' does not serve pattern {pattern}")]
    UnsupportedPattern { pattern: Pattern, driver: String },

    #[error("Driver '{driver}' failed to initialize for pattern {pattern}: {source}")]
    DriverInit {
        pattern: Pattern,
        driver: String,
        #[source]
        source: DriverError,
    },

    // ==== Driver runtime ====
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("No tokio runtime available to connect the driver")]
    NoRuntime,

    // ==== Configuration / environment ====
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Argument error: {0}")]
    Cli(#[from] clap::Error),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl AminoError {
    /// `true`, если драйвер просто не установлен. Такую ошибку можно
    /// проигнорировать: паттерн остаётся ненастроенным.
    pub fn is_driver_not_found(&self) -> bool {
        self.status_code().is_optional_missing()
    }
}

impl ErrorExt for AminoError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::PatternNotConfigured(_) => StatusCode::PatternNotConfigured,
            Self::MethodNotImplemented { .. } => StatusCode::MethodNotImplemented,
            Self::InvalidPattern(_) => StatusCode::InvalidPattern,
            Self::DriverNotFound { .. } => StatusCode::DriverNotFound,
            Self::UnsupportedPattern { .. } => StatusCode::UnsupportedPattern,
            Self::DriverInit { .. } => StatusCode::DriverInitFailed,
            Self::Driver(e) => e.status_code(),
            Self::NoRuntime => StatusCode::NoRuntime,
            Self::Config(_) => StatusCode::ConfigError,
            Self::Cli(_) => StatusCode::CliError,
            Self::Logging(_) => StatusCode::LoggingError,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
