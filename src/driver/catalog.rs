use std::sync::Arc;

use dashmap::DashMap;

use super::{
    memory::{MemoryDriverFactory, MemoryHub},
    Driver, DriverContext, DriverOptions,
};
use crate::{AminoError, AminoResult, DriverResult, Pattern};

/// Фабрика драйвера: по контексту фасада и опциям создаёт драйвер.
pub trait DriverFactory: Send + Sync {
    /// Имя, под которым фабрика регистрируется в каталоге.
    fn name(&self) -> &str;

    /// Может ли фабрика обслуживать паттерн.
    fn serves(
        &self,
        _pattern: Pattern,
    ) -> bool {
        true
    }

    fn create(
        &self,
        ctx: DriverContext,
        options: &DriverOptions,
    ) -> DriverResult<Arc<dyn Driver>>;
}

/// Фабрика из замыкания, см. [`DriverCatalog::register_fn`].
struct FnFactory<F> {
    name: String,
    patterns: Vec<Pattern>,
    create: F,
}

impl<F> DriverFactory for FnFactory<F>
where
    F: Fn(DriverContext, &DriverOptions) -> DriverResult<Arc<dyn Driver>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn serves(
        &self,
        pattern: Pattern,
    ) -> bool {
        self.patterns.contains(&pattern)
    }

    fn create(
        &self,
        ctx: DriverContext,
        options: &DriverOptions,
    ) -> DriverResult<Arc<dyn Driver>> {
        (self.create)(ctx, options)
    }
}

/// Каталог плагинов: имя драйвера → фабрика.
///
/// Каталог заменяет загрузку модулей по строке: драйверы регистрируются
/// явно, а [`DriverCatalog::load`] возвращает классифицированный результат
/// вместо молчаливого проглатывания ошибок.
pub struct DriverCatalog {
    factories: DashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverCatalog {
    /// Префикс старых имён модулей: `amino-driver-memory` ≡ `memory`.
    pub const LEGACY_PREFIX: &'static str = "amino-driver-";

    /// Пустой каталог.
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Каталог со встроенными драйверами `memory` и собственным хабом.
    pub fn builtin() -> Self {
        Self::with_hub(MemoryHub::new())
    }

    /// Каталог со встроенными драйверами поверх общего хаба. Фасады,
    /// созданные с одним хабом, видят сообщения друг друга.
    pub fn with_hub(hub: MemoryHub) -> Self {
        let catalog = Self::new();
        catalog.register(MemoryDriverFactory::new(hub));
        catalog
    }

    /// Регистрирует фабрику. Возвращает ранее зарегистрированную под тем же
    /// именем.
    pub fn register<F>(
        &self,
        factory: F,
    ) -> Option<Arc<dyn DriverFactory>>
    where
        F: DriverFactory + 'static,
    {
        let name = Self::normalize(factory.name()).to_string();
        self.factories.insert(name, Arc::new(factory))
    }

    /// Регистрирует фабрику-замыкание для перечисленных паттернов.
    pub fn register_fn<F>(
        &self,
        name: impl Into<String>,
        patterns: &[Pattern],
        create: F,
    ) -> Option<Arc<dyn DriverFactory>>
    where
        F: Fn(DriverContext, &DriverOptions) -> DriverResult<Arc<dyn Driver>>
            + Send
            + Sync
            + 'static,
    {
        self.register(FnFactory {
            name: name.into(),
            patterns: patterns.to_vec(),
            create,
        })
    }

    pub fn resolve(
        &self,
        name: &str,
    ) -> Option<Arc<dyn DriverFactory>> {
        self.factories
            .get(Self::normalize(name))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.factories.contains_key(Self::normalize(name))
    }

    /// Имена зарегистрированных драйверов в алфавитном порядке.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn normalize(name: &str) -> &str {
        let name = name.trim();
        name.strip_prefix(Self::LEGACY_PREFIX).unwrap_or(name)
    }

    /// Находит фабрику и создаёт драйвер для паттерна.
    ///
    /// # Ошибки
    /// - [`AminoError::DriverNotFound`]: драйвер не зарегистрирован (можно
    ///   игнорировать);
    /// - [`AminoError::UnsupportedPattern`]: фабрика не обслуживает паттерн;
    /// - [`AminoError::DriverInit`]: фабрика упала при создании.
    pub fn load(
        &self,
        name: &str,
        ctx: DriverContext,
        options: &DriverOptions,
    ) -> AminoResult<Arc<dyn Driver>> {
        let pattern = ctx.pattern();
        let factory = self
            .resolve(name)
            .ok_or_else(|| AminoError::DriverNotFound {
                pattern,
                driver: name.to_string(),
            })?;

        if !factory.serves(pattern) {
            return Err(AminoError::UnsupportedPattern {
                pattern,
                driver: name.to_string(),
            });
        }

        factory
            .create(ctx, options)
            .map_err(|source| AminoError::DriverInit {
                pattern,
                driver: name.to_string(),
                source,
            })
    }
}

impl Default for DriverCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
