use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Формат вывода логов.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        };
        f.write_str(s)
    }
}

/// Настройки логирования, секция `log` конфигурации.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень: `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    /// Дополнительные директивы `EnvFilter`, например `amino::dispatch=trace`.
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Поднимает уровень крейта до `debug` (флаг `debug` конфигурации).
    pub fn with_debug(
        mut self,
        debug: bool,
    ) -> Self {
        if debug {
            self.directives.push("amino=debug".to_string());
        }
        self
    }

    /// Строка директив для `EnvFilter`: уровень, затем дополнительные
    /// директивы через запятую.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        std::iter::once(if level.is_empty() { "info" } else { level })
            .chain(
                self.directives
                    .iter()
                    .map(|d| d.trim())
                    .filter(|d| !d.is_empty()),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}
