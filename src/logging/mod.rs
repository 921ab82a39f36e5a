pub mod config;
mod errors;
mod filters;
mod formatter;

pub use config::{LogFormat, LoggingConfig};
pub use errors::log_error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{AminoError, AminoResult};

/// Инициализация глобального subscriber'а по конфигурации.
///
/// Повторный вызов (subscriber уже установлен) возвращает
/// [`AminoError::Logging`].
pub fn init_logging(config: &LoggingConfig) -> AminoResult<()> {
    let env_filter = filters::build_filter_from_config(config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatter::build_formatter_from_config(config))
        .try_init()
        .map_err(|e| AminoError::Logging(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        directive = %config.build_filter_directive(),
        format = %config.format,
        "Logging system initialized"
    );
    Ok(())
}
