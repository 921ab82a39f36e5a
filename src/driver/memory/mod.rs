//! Встроенное семейство драйверов `memory`: pub/sub, очереди и
//! запрос/ответ внутри одного процесса.
//!
//! Все драйверы, созданные фабрикой с общим [`MemoryHub`], разделяют
//! каналы, очереди и отвечающих. Так два фасада в одном процессе играют
//! роли клиента и сервиса.

pub mod broker;
pub mod pubsub;
pub mod queue;
pub mod request;

use std::{sync::Arc, time::Duration};

use serde::Deserialize;

// Публичный экспорт драйверов
pub use broker::Broker;
pub use pubsub::MemoryPubSub;
pub use queue::{JobQueues, MemoryQueue};
pub use request::{MemoryRequest, Responders};

use super::{Driver, DriverContext, DriverFactory, DriverOptions};
use crate::{DriverError, DriverResult, Pattern};

/// Буфер канала pub/sub по умолчанию.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Общее состояние драйверов `memory`.
#[derive(Clone, Default)]
pub struct MemoryHub {
    broker: Arc<Broker>,
    queues: Arc<JobQueues>,
    responders: Arc<Responders>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    pub fn queues(&self) -> &Arc<JobQueues> {
        &self.queues
    }

    pub fn responders(&self) -> &Arc<Responders> {
        &self.responders
    }
}

/// Опции драйверов `memory`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryOptions {
    /// Если задано, драйвер подключается асинхронно с этой задержкой, и
    /// вызовы до готовности попадают в очередь команд.
    pub connect_delay_ms: Option<u64>,
    /// Буфер канала pub/sub.
    pub capacity: usize,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            connect_delay_ms: None,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl MemoryOptions {
    pub fn from_options(options: &DriverOptions) -> DriverResult<Self> {
        let parsed: Self = options.parse()?;
        if parsed.capacity == 0 {
            return Err(DriverError::invalid_option(
                "capacity",
                "must be greater than zero",
            ));
        }
        Ok(parsed)
    }

    pub fn connect_delay(&self) -> Option<Duration> {
        self.connect_delay_ms.map(Duration::from_millis)
    }
}

/// Фабрика драйверов `memory` для всех паттернов.
pub struct MemoryDriverFactory {
    hub: MemoryHub,
}

impl MemoryDriverFactory {
    pub fn new(hub: MemoryHub) -> Self {
        Self { hub }
    }
}

impl DriverFactory for MemoryDriverFactory {
    fn name(&self) -> &str {
        "memory"
    }

    fn create(
        &self,
        ctx: DriverContext,
        options: &DriverOptions,
    ) -> DriverResult<Arc<dyn Driver>> {
        let options = MemoryOptions::from_options(options)?;
        let driver: Arc<dyn Driver> = match ctx.pattern() {
            Pattern::Pubsub => Arc::new(MemoryPubSub::new(
                Arc::clone(&self.hub.broker),
                ctx.emitter().clone(),
                &options,
            )),
            Pattern::Queue => Arc::new(MemoryQueue::new(
                Arc::clone(&self.hub.queues),
                ctx.emitter().clone(),
                &options,
            )),
            Pattern::Request => Arc::new(MemoryRequest::new(
                Arc::clone(&self.hub.responders),
                &options,
            )),
        };
        Ok(driver)
    }
}
