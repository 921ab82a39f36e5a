//! Фасад `Amino`: глаголы трёх паттернов, загрузка драйверов и
//! конфигурация.
//!
//! ```no_run
//! use amino::{Amino, Response};
//!
//! # #[tokio::main]
//! # async fn main() -> amino::AminoResult<()> {
//! let amino = Amino::builder().memory_defaults().build()?;
//! amino.subscribe("alphabet", |msg| println!("{}", msg.payload))?;
//! amino.publish("alphabet", "a")?;
//!
//! amino.respond("math", |_req| Response::ok(4))?;
//! let res = amino.request("amino://math/square/2", |_| {})?.response().await;
//! # Ok(())
//! # }
//! ```

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    bridge::{EventBus, EventStream, DEFAULT_EVENT_CAPACITY},
    config::{AminoArgs, ConfigStore, Settings},
    dispatch::{Dispatcher, Readiness},
    driver::{memory::MemoryHub, DriverCatalog, DriverContext, DriverOptions},
    logging, Ack, AminoResult, Command, Dispatch, DriverResult, Job, Message, Pattern, Request,
    Response,
};

struct Inner {
    dispatcher: Dispatcher,
    catalog: DriverCatalog,
    bus: EventBus,
    store: RwLock<ConfigStore>,
}

/// Фасад над pub/sub, очередями задач и запрос/ответ.
///
/// `Amino` дёшево клонируется; клоны разделяют драйверы, очереди и поток
/// событий. Независимые фасады не имеют общего состояния, кроме явно
/// переданного [`MemoryHub`].
#[derive(Clone)]
pub struct Amino {
    inner: Arc<Inner>,
}

impl Default for Amino {
    fn default() -> Self {
        Self::new()
    }
}

impl Amino {
    /// Фасад без настроенных драйверов со встроенным каталогом.
    pub fn new() -> Self {
        Self::from_parts(DriverCatalog::builtin(), ConfigStore::new(), DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_catalog(catalog: DriverCatalog) -> Self {
        Self::from_parts(catalog, ConfigStore::new(), DEFAULT_EVENT_CAPACITY)
    }

    pub fn builder() -> AminoBuilder {
        AminoBuilder::default()
    }

    fn from_parts(
        catalog: DriverCatalog,
        store: ConfigStore,
        event_capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(),
                catalog,
                bus: EventBus::new(event_capacity),
                store: RwLock::new(store),
            }),
        }
    }

    /// Читает конфигурацию и регистрирует драйвер для каждого настроенного
    /// паттерна. Незарегистрированный в каталоге драйвер пропускается с
    /// предупреждением, остальные ошибки возвращаются.
    pub fn configure(&self) -> AminoResult<Settings> {
        let settings = self.settings()?;
        for (pattern, ps) in settings.drivers() {
            match self.use_driver(pattern, &ps.driver, ps.driver_options()) {
                Ok(_) => {}
                Err(e) if e.is_driver_not_found() => {
                    logging::log_error(
                        pattern,
                        &e,
                        "Driver not available, pattern left unconfigured",
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(settings)
    }

    /// Загружает драйвер из каталога и делает его активным для паттерна.
    ///
    /// # Ошибки
    /// - [`AminoError::DriverNotFound`](crate::AminoError::DriverNotFound),
    ///   реестр не меняется;
    /// - [`AminoError::UnsupportedPattern`](crate::AminoError::UnsupportedPattern);
    /// - [`AminoError::DriverInit`](crate::AminoError::DriverInit);
    /// - [`AminoError::NoRuntime`](crate::AminoError::NoRuntime) для
    ///   асинхронного драйвера вне runtime tokio.
    pub fn use_driver(
        &self,
        pattern: Pattern,
        name: &str,
        options: DriverOptions,
    ) -> AminoResult<&Self> {
        let (emitter, binding) = self.inner.bus.bind(pattern);
        let ctx = DriverContext::new(pattern, emitter.clone());
        let driver = self.inner.catalog.load(name, ctx, &options)?;
        self.inner
            .dispatcher
            .install(pattern, driver, emitter, binding)?;
        Ok(self)
    }

    /// Передаёт команду драйверу её паттерна.
    pub fn invoke(
        &self,
        command: Command,
    ) -> AminoResult<Dispatch> {
        debug!(command = ?command, "Invoke");
        self.inner.dispatcher.invoke(command)
    }

    fn call(
        &self,
        command: Command,
    ) -> AminoResult<()> {
        self.invoke(command).map(|_| ())
    }

    // pub/sub

    pub fn subscribe<F>(
        &self,
        channel: impl Into<String>,
        handler: F,
    ) -> AminoResult<()>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.call(Command::Subscribe {
            channel: channel.into(),
            handler: Arc::new(handler),
        })
    }

    pub fn sub<F>(
        &self,
        channel: impl Into<String>,
        handler: F,
    ) -> AminoResult<()>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.subscribe(channel, handler)
    }

    pub fn publish(
        &self,
        channel: impl Into<String>,
        payload: impl Into<Value>,
    ) -> AminoResult<()> {
        self.call(Command::Publish {
            channel: channel.into(),
            payload: payload.into(),
        })
    }

    pub fn r#pub(
        &self,
        channel: impl Into<String>,
        payload: impl Into<Value>,
    ) -> AminoResult<()> {
        self.publish(channel, payload)
    }

    pub fn unsubscribe(
        &self,
        channel: impl Into<String>,
    ) -> AminoResult<()> {
        self.call(Command::Unsubscribe {
            channel: channel.into(),
        })
    }

    /// Подписка на одно сообщение.
    pub fn once<F>(
        &self,
        channel: impl Into<String>,
        handler: F,
    ) -> AminoResult<()>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.call(Command::Once {
            channel: channel.into(),
            handler: Arc::new(handler),
        })
    }

    // Очереди задач

    pub fn queue(
        &self,
        queue: impl Into<String>,
        data: impl Into<Value>,
    ) -> AminoResult<()> {
        self.call(Command::Queue {
            queue: queue.into(),
            data: data.into(),
        })
    }

    pub fn q(
        &self,
        queue: impl Into<String>,
        data: impl Into<Value>,
    ) -> AminoResult<()> {
        self.queue(queue, data)
    }

    /// Обработчик задач очереди. Следующая задача выдаётся после `Ack`.
    pub fn process<F>(
        &self,
        queue: impl Into<String>,
        handler: F,
    ) -> AminoResult<()>
    where
        F: Fn(Job, Ack) + Send + Sync + 'static,
    {
        self.call(Command::Process {
            queue: queue.into(),
            handler: Arc::new(handler),
        })
    }

    pub fn r#do<F>(
        &self,
        queue: impl Into<String>,
        handler: F,
    ) -> AminoResult<()>
    where
        F: Fn(Job, Ack) + Send + Sync + 'static,
    {
        self.process(queue, handler)
    }

    // Запрос/ответ

    /// Отправляет запрос `amino://host/path?query`.
    ///
    /// Если драйвер готов, возвращает [`Dispatch::Completed`] с ожидающим
    /// ответом; иначе запрос ставится в очередь, и ответ придёт только в
    /// `handler`.
    pub fn request<F>(
        &self,
        url: impl Into<String>,
        handler: F,
    ) -> AminoResult<Dispatch>
    where
        F: Fn(DriverResult<Response>) + Send + Sync + 'static,
    {
        self.invoke(Command::Request {
            url: url.into(),
            handler: Arc::new(handler),
        })
    }

    pub fn req<F>(
        &self,
        url: impl Into<String>,
        handler: F,
    ) -> AminoResult<Dispatch>
    where
        F: Fn(DriverResult<Response>) + Send + Sync + 'static,
    {
        self.request(url, handler)
    }

    pub fn respond<F>(
        &self,
        hostname: impl Into<String>,
        handler: F,
    ) -> AminoResult<()>
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.call(Command::Respond {
            hostname: hostname.into(),
            handler: Arc::new(handler),
        })
    }

    pub fn res<F>(
        &self,
        hostname: impl Into<String>,
        handler: F,
    ) -> AminoResult<()>
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.respond(hostname, handler)
    }

    // События и состояние

    /// Новый поток событий `error` и `subscribe`. Получает только события,
    /// случившиеся после вызова.
    pub fn events(&self) -> EventStream {
        self.inner.bus.subscribe()
    }

    pub fn state(
        &self,
        pattern: Pattern,
    ) -> Option<Readiness> {
        self.inner.dispatcher.state(pattern)
    }

    pub fn is_ready(
        &self,
        pattern: Pattern,
    ) -> bool {
        self.state(pattern) == Some(Readiness::Ready)
    }

    /// Количество вызовов, ожидающих готовности драйвера.
    pub fn pending(
        &self,
        pattern: Pattern,
    ) -> usize {
        self.inner.dispatcher.pending(pattern)
    }

    pub fn configured(&self) -> Vec<Pattern> {
        self.inner.dispatcher.configured()
    }

    pub fn catalog(&self) -> &DriverCatalog {
        &self.inner.catalog
    }

    // Конфигурация

    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<config::Value>,
    ) -> &Self {
        self.inner.store.write().set(key, value);
        self
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> AminoResult<T> {
        self.inner.store.read().get(key)
    }

    /// Добавляет файл конфигурации. Изменения вступают в силу при
    /// следующем [`Amino::configure`].
    pub fn conf(
        &self,
        path: impl AsRef<Path>,
        relative_to: Option<&Path>,
    ) -> PathBuf {
        self.inner.store.write().conf(path, relative_to)
    }

    /// Разбирает аргументы командной строки (первый элемент: имя
    /// программы) и добавляет их в конфигурацию.
    pub fn argv<I, T>(
        &self,
        args: I,
    ) -> AminoResult<&Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = AminoArgs::parse_args(args)?;
        self.inner.store.write().apply_args(&args);
        Ok(self)
    }

    pub fn settings(&self) -> AminoResult<Settings> {
        self.inner.store.read().settings()
    }

    /// Устанавливает глобальный subscriber `tracing` по секции `log`.
    pub fn init_logging(&self) -> AminoResult<()> {
        logging::init_logging(&self.settings()?.logging())
    }
}

/// Построитель фасада: каталог, источники конфигурации, затем
/// [`Amino::configure`].
pub struct AminoBuilder {
    catalog: Option<DriverCatalog>,
    store: ConfigStore,
    event_capacity: usize,
}

impl Default for AminoBuilder {
    fn default() -> Self {
        Self {
            catalog: None,
            store: ConfigStore::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AminoBuilder {
    pub fn catalog(
        mut self,
        catalog: DriverCatalog,
    ) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Встроенный каталог поверх общего хаба.
    pub fn hub(
        self,
        hub: MemoryHub,
    ) -> Self {
        self.catalog(DriverCatalog::with_hub(hub))
    }

    /// `memory` как драйвер по умолчанию для всех паттернов.
    pub fn memory_defaults(mut self) -> Self {
        self.store.memory_defaults();
        self
    }

    pub fn env_prefix(
        mut self,
        prefix: impl Into<String>,
    ) -> Self {
        self.store = self.store.with_env_prefix(prefix);
        self
    }

    pub fn conf(
        mut self,
        path: impl AsRef<Path>,
    ) -> Self {
        self.store.conf(path, None);
        self
    }

    pub fn argv<I, T>(
        mut self,
        args: I,
    ) -> AminoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = AminoArgs::parse_args(args)?;
        self.store.apply_args(&args);
        Ok(self)
    }

    pub fn set(
        mut self,
        key: impl Into<String>,
        value: impl Into<config::Value>,
    ) -> Self {
        self.store.set(key, value);
        self
    }

    pub fn event_capacity(
        mut self,
        capacity: usize,
    ) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Фасад без чтения конфигурации.
    pub fn build_unconfigured(self) -> Amino {
        Amino::from_parts(
            self.catalog.unwrap_or_default(),
            self.store,
            self.event_capacity,
        )
    }

    pub fn build(self) -> AminoResult<Amino> {
        let amino = self.build_unconfigured();
        amino.configure()?;
        Ok(amino)
    }
}
