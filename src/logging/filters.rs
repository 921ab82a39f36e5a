use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Фильтр по конфигурации. `RUST_LOG`, если задан, имеет приоритет;
/// некорректная директива из конфигурации заменяется на `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }
    filter_from_directive(&config.build_filter_directive())
}

pub(crate) fn filter_from_directive(directive: &str) -> EnvFilter {
    match EnvFilter::try_new(directive) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Invalid log filter directive ('{directive}'): {e}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        sync::{Arc, Mutex},
    };

    use serial_test::serial;
    use tracing_subscriber::{fmt, prelude::*, registry::Registry};

    use super::*;

    // Мини-буферный writer для тестов
    struct VecMakeWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for VecMakeWriter {
        type Writer = VecWriterGuard;

        fn make_writer(&'a self) -> Self::Writer {
            VecWriterGuard(self.0.clone())
        }
    }

    struct VecWriterGuard(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for VecWriterGuard {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture(filter: EnvFilter) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = fmt::layer()
            .with_writer(VecMakeWriter(buffer.clone()))
            .with_ansi(false)
            .with_filter(filter);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("info message");
            tracing::warn!("warn message");
        });

        let out = buffer.lock().unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Тест проверяет, что директива `warn` отсекает `info`.
    #[test]
    #[serial]
    fn test_config_directive_filters_levels() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "warn".into(),
            ..Default::default()
        };
        let out = capture(build_filter_from_config(&cfg));
        assert!(out.contains("warn message"));
        assert!(!out.contains("info message"));
    }

    /// Тест проверяет, что `RUST_LOG` важнее конфигурации.
    #[test]
    #[serial]
    fn test_env_overrides_config() {
        env::set_var("RUST_LOG", "error");
        let out = capture(build_filter_from_config(&LoggingConfig::default()));
        env::remove_var("RUST_LOG");
        assert!(!out.contains("warn message"));
    }

    /// Тест проверяет откат на `info` при некорректной директиве.
    #[test]
    fn test_invalid_directive_falls_back_to_info() {
        let out = capture(filter_from_directive("this_is_invalid_directive!!=="));
        assert!(out.contains("info message"));
    }
}
