//! Мост событий: пересылка `error` и `subscribe` от драйверов на
//! наблюдаемую поверхность фасада.
//!
//! Все драйверы пишут в один `broadcast`-канал фасада через свой
//! [`EventEmitter`]. Порядок событий одного источника сохраняется, каждый
//! получатель видит событие не более одного раза.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use amino_error::ErrorExt;
use tokio::sync::broadcast;
use tracing::error;

use crate::{DriverError, Pattern, RecvError, TryRecvError};

/// Ёмкость канала событий по умолчанию.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Событие фасада.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AminoEvent {
    /// Ошибка драйвера, переданная без изменений.
    Error { pattern: Pattern, error: DriverError },
    /// Драйвер подтвердил подписку на канал; `count` равно числу подписок.
    Subscribe {
        pattern: Pattern,
        channel: String,
        count: usize,
    },
}

/// Общая шина событий одного фасада.
#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<AminoEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> EventStream {
        EventStream {
            inner: self.tx.subscribe(),
        }
    }

    /// Публикует событие. Ошибка, которую никто не слушает, уходит в лог.
    pub(crate) fn publish(
        &self,
        event: AminoEvent,
    ) {
        if self.tx.receiver_count() == 0 {
            if let AminoEvent::Error { pattern, error } = &event {
                error!(
                    %pattern,
                    status = %error.status_code(),
                    error = %error,
                    details = %error.log_message(),
                    "Unhandled driver error"
                );
            }
            return;
        }
        let _ = self.tx.send(event);
    }

    /// Создаёт привязку нового драйвера к шине.
    pub(crate) fn bind(
        &self,
        pattern: Pattern,
    ) -> (EventEmitter, Binding) {
        let attached = Arc::new(AtomicBool::new(true));
        let emitter = EventEmitter {
            pattern,
            bus: self.clone(),
            attached: Arc::clone(&attached),
        };
        (emitter, Binding { attached })
    }
}

/// Базовая возможность драйвера: эмиссия событий `error` и `subscribe`.
///
/// После замены драйвера его эмиттер отсоединяется, и события старого
/// экземпляра больше не пересылаются.
#[derive(Clone)]
pub struct EventEmitter {
    pattern: Pattern,
    bus: EventBus,
    attached: Arc<AtomicBool>,
}

impl EventEmitter {
    /// Эмиттер со своей отдельной шиной, для использования драйвера вне
    /// фасада (например, в тестах драйвера).
    pub fn standalone(pattern: Pattern) -> (Self, EventStream) {
        let bus = EventBus::new(DEFAULT_EVENT_CAPACITY);
        let stream = bus.subscribe();
        let (emitter, _) = bus.bind(pattern);
        (emitter, stream)
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn error(
        &self,
        error: DriverError,
    ) {
        self.emit(AminoEvent::Error {
            pattern: self.pattern,
            error,
        });
    }

    pub fn subscribed(
        &self,
        channel: &str,
        count: usize,
    ) {
        self.emit(AminoEvent::Subscribe {
            pattern: self.pattern,
            channel: channel.to_string(),
            count,
        });
    }

    fn emit(
        &self,
        event: AminoEvent,
    ) {
        if self.is_attached() {
            self.bus.publish(event);
        }
    }
}

/// Сторона привязки, которую держит реестр.
pub(crate) struct Binding {
    attached: Arc<AtomicBool>,
}

impl Binding {
    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }
}

/// Поток событий фасада.
pub struct EventStream {
    inner: broadcast::Receiver<AminoEvent>,
}

impl EventStream {
    /// Асинхронно ожидает следующее событие.
    ///
    /// # Возвращает
    /// - `Ok(AminoEvent)` при успешном получении
    /// - `Err(RecvError::Closed)` если фасад уничтожен
    /// - `Err(RecvError::Lagged(n))` если приёмник отстал на `n` событий
    pub async fn recv(&mut self) -> Result<AminoEvent, RecvError> {
        self.inner.recv().await.map_err(Into::into)
    }

    /// Пытается получить событие без ожидания.
    pub fn try_recv(&mut self) -> Result<AminoEvent, TryRecvError> {
        self.inner.try_recv().map_err(Into::into)
    }

    /// Ждёт подтверждения подписки на конкретный канал, пропуская прочие
    /// события.
    pub async fn subscribed_to(
        &mut self,
        channel: &str,
    ) -> Result<usize, RecvError> {
        loop {
            if let AminoEvent::Subscribe {
                channel: ch, count, ..
            } = self.recv().await?
            {
                if ch == channel {
                    return Ok(count);
                }
            }
        }
    }
}
