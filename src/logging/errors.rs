use amino_error::{ErrorExt, LogLevel};
use tracing::{debug, error, info, trace, warn};

use crate::Pattern;

/// Пишет ошибку в лог на уровне, который задаёт её код статуса.
pub fn log_error(
    pattern: Pattern,
    err: &dyn ErrorExt,
    message: &str,
) {
    let status = err.status_code();
    let details = err.log_message();
    match status.log_level() {
        LogLevel::Trace => trace!(%pattern, %status, error = %err, %details, "{message}"),
        LogLevel::Debug => debug!(%pattern, %status, error = %err, %details, "{message}"),
        LogLevel::Info => info!(%pattern, %status, error = %err, %details, "{message}"),
        LogLevel::Warn => warn!(%pattern, %status, error = %err, %details, "{message}"),
        LogLevel::Error => error!(%pattern, %status, error = %err, %details, "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{AminoError, DriverError};

    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || Capture(Arc::clone(&sink)))
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let out = buffer.lock().unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Тест проверяет, что уровень записи берётся из кода статуса ошибки.
    #[test]
    fn test_level_follows_status_code() {
        let missing = AminoError::DriverNotFound {
            pattern: Pattern::Queue,
            driver: "redis".into(),
        };
        let out = capture(|| log_error(Pattern::Queue, &missing, "Driver skipped"));
        assert!(out.contains("WARN"), "got: {out}");
        assert!(out.contains("Driver skipped"));
        assert!(out.contains("DriverNotFound (3000)"));

        let usage = AminoError::PatternNotConfigured(Pattern::Queue);
        let out = capture(|| log_error(Pattern::Queue, &usage, "Call rejected"));
        assert!(out.contains("INFO"), "got: {out}");

        let out = capture(|| log_error(Pattern::Queue, &DriverError::NoRuntime, "No runtime"));
        assert!(out.contains("ERROR"), "got: {out}");
    }
}
