//! Конфигурация фасада: файлы, окружение, командная строка и явные
//! переопределения, слитые в [`Settings`].

pub mod cli;
pub mod settings;
pub mod store;

// Публичный экспорт конфигурации
pub use cli::AminoArgs;
pub use settings::{PatternSettings, Settings};
pub use store::{ConfigStore, ENV_PREFIX};
