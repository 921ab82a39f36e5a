use std::fmt;

use num_enum::TryFromPrimitive;

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки использования (конфигурация паттернов, вызовы методов)
/// - 3xxx: Загрузка драйверов
/// - 4xxx: Ошибки времени выполнения драйверов
/// - 5xxx: Конфигурация и окружение
///
/// `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,
    NotImplemented = 1005,

    // === 2xxx: Ошибки использования ===
    PatternNotConfigured = 2000,
    MethodNotImplemented = 2001,
    InvalidPattern = 2002,

    // === 3xxx: Загрузка драйверов ===
    DriverNotFound = 3000,
    DriverInitFailed = 3001,
    UnsupportedPattern = 3002,
    InvalidOption = 3003,

    // === 4xxx: Время выполнения драйвера ===
    ConnectFailed = 4000,
    NotFound = 4001,
    InvalidUrl = 4002,
    Busy = 4003,
    HandlerFailed = 4004,

    // === 5xxx: Конфигурация и окружение ===
    ConfigError = 5000,
    CliError = 5001,
    LoggingError = 5002,
    NoRuntime = 5003,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Ошибка, которую можно проигнорировать: драйвер не установлен.
    pub fn is_optional_missing(&self) -> bool {
        matches!(self, Self::DriverNotFound)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::DriverNotFound => LogLevel::Warn,
            Self::PatternNotConfigured
            | Self::MethodNotImplemented
            | Self::InvalidPattern
            | Self::InvalidArgs => LogLevel::Info,
            Self::ConnectFailed | Self::NotFound | Self::Busy => LogLevel::Warn,
            Self::Internal | Self::DriverInitFailed | Self::NoRuntime => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
