use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{driver::DriverOptions, logging::LoggingConfig, Pattern};

/// Драйвер одного паттерна в конфигурации.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSettings {
    /// Имя драйвера в каталоге (`memory`, `amino-driver-memory`, ...).
    pub driver: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl PatternSettings {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            options: Map::new(),
        }
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions::from(self.options.clone())
    }
}

/// Итоговая конфигурация фасада после слияния всех источников.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pubsub: Option<PatternSettings>,
    pub queue: Option<PatternSettings>,
    pub request: Option<PatternSettings>,
    pub debug: bool,
    pub log: LoggingConfig,
}

impl Settings {
    pub fn pattern(
        &self,
        pattern: Pattern,
    ) -> Option<&PatternSettings> {
        match pattern {
            Pattern::Pubsub => self.pubsub.as_ref(),
            Pattern::Queue => self.queue.as_ref(),
            Pattern::Request => self.request.as_ref(),
        }
    }

    /// Настроенные паттерны в порядке pubsub, queue, request.
    pub fn drivers(&self) -> impl Iterator<Item = (Pattern, &PatternSettings)> + '_ {
        Pattern::ALL
            .into_iter()
            .filter_map(move |p| self.pattern(p).map(|s| (p, s)))
    }

    /// Настройки логирования с учётом флага `debug`.
    pub fn logging(&self) -> LoggingConfig {
        self.log.clone().with_debug(self.debug)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let settings: Settings = serde_json::from_value(json!({
            "queue": { "driver": "memory", "options": { "capacity": 8 } },
            "debug": true
        }))
        .unwrap();

        assert!(settings.pubsub.is_none());
        let queue = settings.pattern(Pattern::Queue).unwrap();
        assert_eq!(queue.driver, "memory");
        assert_eq!(queue.driver_options().get("capacity"), Some(&json!(8)));
        assert_eq!(
            settings.drivers().map(|(p, _)| p).collect::<Vec<_>>(),
            vec![Pattern::Queue]
        );
        assert_eq!(settings.logging().build_filter_directive(), "info,amino=debug");
    }
}
