use std::{
    env,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File, Value as ConfigValue};
use serde::de::DeserializeOwned;

use super::{AminoArgs, Settings};
use crate::AminoResult;

/// Префикс переменных окружения: `AMINO_QUEUE__DRIVER=memory`.
pub const ENV_PREFIX: &str = "AMINO";

/// Источники конфигурации фасада.
///
/// Приоритет (от слабого к сильному): значения по умолчанию, файлы,
/// окружение, аргументы командной строки, [`ConfigStore::set`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    defaults: Vec<(String, ConfigValue)>,
    files: Vec<PathBuf>,
    env_prefix: String,
    argv: Vec<(String, ConfigValue)>,
    overrides: Vec<(String, ConfigValue)>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self {
            defaults: Vec::new(),
            files: Vec::new(),
            env_prefix: ENV_PREFIX.to_string(),
            argv: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Меняет префикс переменных окружения.
    pub fn with_env_prefix(
        mut self,
        prefix: impl Into<String>,
    ) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn set_default(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) {
        self.defaults.push((key.into(), value.into()));
    }

    /// Драйвер `memory` по умолчанию для всех паттернов.
    pub fn memory_defaults(&mut self) {
        for key in ["pubsub.driver", "queue.driver", "request.driver"] {
            self.set_default(key, "memory");
        }
    }

    /// Добавляет файл конфигурации. Относительный путь разрешается от
    /// `relative_to`, а без него от текущего каталога.
    pub fn conf(
        &mut self,
        path: impl AsRef<Path>,
        relative_to: Option<&Path>,
    ) -> PathBuf {
        let path = path.as_ref();
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            match relative_to.map(Path::to_path_buf).or_else(|| env::current_dir().ok()) {
                Some(base) => base.join(path),
                None => path.to_path_buf(),
            }
        };
        self.files.push(resolved.clone());
        resolved
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Применяет разобранные аргументы командной строки.
    pub fn apply_args(
        &mut self,
        args: &AminoArgs,
    ) {
        for path in &args.conf {
            self.conf(path, None);
        }
        for (key, value) in args.overrides() {
            self.argv.push((key, parse_scalar(&value)));
        }
    }

    /// Переопределение с наивысшим приоритетом.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) {
        self.overrides.push((key.into(), value.into()));
    }

    /// Собирает [`Config`] из всех источников.
    pub fn build(&self) -> AminoResult<Config> {
        let mut builder = Config::builder()
            .set_default("debug", false)?
            .set_default("log.level", "info")?;
        for (key, value) in &self.defaults {
            builder = builder.set_default(key.as_str(), value.clone())?;
        }

        for path in &self.files {
            builder = builder.add_source(File::from(path.as_path()));
        }

        // Переменные окружения с префиксом AMINO_, вложенность через `__`.
        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        for (key, value) in self.argv.iter().chain(&self.overrides) {
            builder = builder.set_override(key.as_str(), value.clone())?;
        }

        Ok(builder.build()?)
    }

    /// Значение по ключу, например `get::<String>("queue.driver")`.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> AminoResult<T> {
        Ok(self.build()?.get::<T>(key)?)
    }

    pub fn settings(&self) -> AminoResult<Settings> {
        Ok(self.build()?.try_deserialize()?)
    }
}

/// Значение из командной строки: bool, целое, дробное или строка.
fn parse_scalar(raw: &str) -> ConfigValue {
    if let Ok(b) = raw.parse::<bool>() {
        return b.into();
    }
    if let Ok(i) = raw.parse::<i64>() {
        return i.into();
    }
    if let Ok(f) = raw.parse::<f64>() {
        return f.into();
    }
    raw.into()
}
