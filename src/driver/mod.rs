//! Контракт драйвера и каталог плагинов.
//!
//! - `Driver`: методы паттерна, необязательный асинхронный `connect`.
//! - `catalog`: фабрики драйверов по имени, загрузка с явным результатом.
//! - `memory`: встроенное семейство драйверов внутри процесса.

pub mod catalog;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use catalog::*;

use crate::{
    bridge::EventEmitter, DriverError, DriverResult, JobHandler, MessageHandler, Method,
    Pattern, Reply, RequestHandler, ResponseHandler,
};

/// Общий интерфейс всех драйверов.
///
/// Драйвер реализует только методы своего паттерна и сообщает о них через
/// [`Driver::implements`]; остальные методы по умолчанию отвечают
/// [`DriverError::Unsupported`]. Методы вызываются синхронно; долгую работу
/// драйвер переносит в свои задачи.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Имя драйвера (для логов).
    fn name(&self) -> &str;

    /// Реализует ли драйвер метод.
    fn implements(
        &self,
        method: Method,
    ) -> bool;

    /// Есть ли у драйвера асинхронный шаг подключения. Без него драйвер
    /// готов сразу после регистрации.
    fn has_connect(&self) -> bool {
        false
    }

    /// Асинхронное подключение. Вызывается ровно один раз, если
    /// [`Driver::has_connect`] вернул `true`.
    async fn connect(&self) -> DriverResult<()> {
        Ok(())
    }

    fn subscribe(
        &self,
        _channel: &str,
        _handler: MessageHandler,
    ) -> DriverResult<Reply> {
        Err(DriverError::Unsupported(Method::Subscribe))
    }

    fn publish(
        &self,
        _channel: &str,
        _payload: Value,
    ) -> DriverResult<Reply> {
        Err(DriverError::Unsupported(Method::Publish))
    }

    fn unsubscribe(
        &self,
        _channel: &str,
    ) -> DriverResult<Reply> {
        Err(DriverError::Unsupported(Method::Unsubscribe))
    }

    fn once(
        &self,
        _channel: &str,
        _handler: MessageHandler,
    ) -> DriverResult<Reply> {
        Err(DriverError::Unsupported(Method::Once))
    }

    fn queue(
        &self,
        _queue: &str,
        _data: Value,
    ) -> DriverResult<Reply> {
        Err(DriverError::Unsupported(Method::Queue))
    }

    fn process(
        &self,
        _queue: &str,
        _handler: JobHandler,
    ) -> DriverResult<Reply> {
        Err(DriverError::Unsupported(Method::Process))
    }

    fn request(
        &self,
        _url: &str,
        _handler: ResponseHandler,
    ) -> DriverResult<Reply> {
        Err(DriverError::Unsupported(Method::Request))
    }

    fn respond(
        &self,
        _hostname: &str,
        _handler: RequestHandler,
    ) -> DriverResult<Reply> {
        Err(DriverError::Unsupported(Method::Respond))
    }
}

/// То, что фабрика получает от фасада при создании драйвера.
#[derive(Clone)]
pub struct DriverContext {
    pattern: Pattern,
    emitter: EventEmitter,
}

impl DriverContext {
    pub fn new(
        pattern: Pattern,
        emitter: EventEmitter,
    ) -> Self {
        Self { pattern, emitter }
    }

    /// Паттерн, который будет обслуживать драйвер.
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Эмиттер событий `error` / `subscribe`, привязанный к фасаду.
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }
}

/// Опции драйвера: непрозрачная карта из конфигурации.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverOptions(Map<String, Value>);

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Десериализует опции в типизированную структуру драйвера.
    pub fn parse<T: DeserializeOwned>(&self) -> DriverResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| DriverError::invalid_option("options", e))
    }
}

impl From<Map<String, Value>> for DriverOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
