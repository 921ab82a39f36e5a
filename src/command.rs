//! Команды фасада и типы, которые через них проходят.
//!
//! [`Command`] это одновременно вызов глагола фасада и запись очереди
//! команд: метод плюс владеющие аргументы, захваченные в момент вызова.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::{driver::Driver, DriverError, DriverResult, Method, Pattern};

/// Обработчик сообщений pub/sub.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;
/// Обработчик задач очереди. Следующая задача выдаётся после [`Ack`].
pub type JobHandler = Arc<dyn Fn(Job, Ack) + Send + Sync>;
/// Обработчик ответа на запрос.
pub type ResponseHandler = Arc<dyn Fn(DriverResult<Response>) + Send + Sync>;
/// Обработчик входящих запросов на стороне отвечающего.
pub type RequestHandler = Arc<dyn Fn(Request) -> Response + Send + Sync>;

/// Отправляющая половина [`PendingResponse`].
pub type ResponseSender = oneshot::Sender<DriverResult<Response>>;

/// Сообщение, доставленное подписчику.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub channel: Arc<str>,
    pub payload: Value,
}

impl Message {
    pub fn new(
        channel: impl Into<Arc<str>>,
        payload: impl Into<Value>,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Задача, выданная обработчику очереди.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub queue: Arc<str>,
    pub data: Value,
}

/// Подтверждение обработки задачи.
///
/// Явный вызов [`Ack::ack`] и `drop` эквивалентны: оба разрешают драйверу
/// выдать следующую задачу. Удержание `Ack` откладывает следующую задачу.
pub struct Ack {
    tx: Option<oneshot::Sender<()>>,
}

impl Ack {
    /// Создаёт подтверждение и приёмник, который завершится после него.
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn ack(mut self) {
        self.send();
    }

    fn send(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Ack {
    fn drop(&mut self) {
        self.send();
    }
}

impl fmt::Debug for Ack {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Ack")
            .field("pending", &self.tx.is_some())
            .finish()
    }
}

/// Входящий запрос, разобранный из `amino://host/path?query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub host: String,
    pub path: String,
    pub query: Option<String>,
}

impl Request {
    /// Разбирает URL вида `amino://host/path?query`.
    pub fn parse(url: &str) -> DriverResult<Self> {
        let rest = url
            .strip_prefix("amino://")
            .ok_or_else(|| DriverError::InvalidUrl(url.to_string()))?;

        let (target, query) = match rest.split_once('?') {
            Some((target, query)) => (target, Some(query.to_string())),
            None => (rest, None),
        };
        let (host, path) = match target.find('/') {
            Some(idx) => (&target[..idx], &target[idx..]),
            None => (target, "/"),
        };
        if host.is_empty() {
            return Err(DriverError::InvalidUrl(url.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            path: path.to_string(),
            query,
        })
    }

    /// Параметры строки запроса.
    pub fn params(&self) -> HashMap<&str, &str> {
        self.query
            .as_deref()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .collect()
    }

    pub fn param(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.params().get(name).copied()
    }

    /// Сегменты пути без пустых частей: `/square/4` → `["square", "4"]`.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

/// Ответ отвечающей стороны.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn new(
        status: u16,
        body: impl Into<Value>,
    ) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(200, body)
    }

    pub fn not_found() -> Self {
        Self::new(404, "Page not found")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Ожидающий ответ на запрос.
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<DriverResult<Response>>,
}

impl PendingResponse {
    pub fn channel() -> (ResponseSender, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Ждёт ответ. Если драйвер бросил запрос, возвращает ошибку.
    pub async fn wait(self) -> DriverResult<Response> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(DriverError::Other("request dropped by driver".into())))
    }
}

/// Результат, который драйвер возвращает ядру. Ядро его не интерпретирует.
#[derive(Debug)]
pub enum Reply {
    Done,
    /// Количество получателей, до которых дошло сообщение.
    Delivered(usize),
    Pending(PendingResponse),
}

/// Итог диспетчеризации команды.
#[derive(Debug)]
pub enum Dispatch {
    /// Драйвер готов, команда выполнена синхронно.
    Completed(Reply),
    /// Драйвер ещё не готов: команда поставлена в очередь под номером
    /// `position` (0 означает голову очереди). Результат такой команды наружу не
    /// возвращается.
    Deferred { position: usize },
}

impl Dispatch {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Dispatch::Deferred { .. })
    }

    pub fn into_reply(self) -> Option<Reply> {
        match self {
            Dispatch::Completed(reply) => Some(reply),
            Dispatch::Deferred { .. } => None,
        }
    }

    /// Ждёт ответ, если диспетчеризация вернула ожидающий запрос.
    pub async fn response(self) -> Option<DriverResult<Response>> {
        match self.into_reply() {
            Some(Reply::Pending(pending)) => Some(pending.wait().await),
            _ => None,
        }
    }
}

/// Вызов глагола фасада: метод и его аргументы.
pub enum Command {
    Subscribe {
        channel: String,
        handler: MessageHandler,
    },
    Publish {
        channel: String,
        payload: Value,
    },
    Unsubscribe {
        channel: String,
    },
    Once {
        channel: String,
        handler: MessageHandler,
    },
    Queue {
        queue: String,
        data: Value,
    },
    Process {
        queue: String,
        handler: JobHandler,
    },
    Request {
        url: String,
        handler: ResponseHandler,
    },
    Respond {
        hostname: String,
        handler: RequestHandler,
    },
}

impl Command {
    pub fn method(&self) -> Method {
        match self {
            Command::Subscribe { .. } => Method::Subscribe,
            Command::Publish { .. } => Method::Publish,
            Command::Unsubscribe { .. } => Method::Unsubscribe,
            Command::Once { .. } => Method::Once,
            Command::Queue { .. } => Method::Queue,
            Command::Process { .. } => Method::Process,
            Command::Request { .. } => Method::Request,
            Command::Respond { .. } => Method::Respond,
        }
    }

    pub fn pattern(&self) -> Pattern {
        self.method().pattern()
    }

    /// Передаёт команду соответствующему методу драйвера.
    pub(crate) fn apply(
        self,
        driver: &dyn Driver,
    ) -> DriverResult<Reply> {
        match self {
            Command::Subscribe { channel, handler } => driver.subscribe(&channel, handler),
            Command::Publish { channel, payload } => driver.publish(&channel, payload),
            Command::Unsubscribe { channel } => driver.unsubscribe(&channel),
            Command::Once { channel, handler } => driver.once(&channel, handler),
            Command::Queue { queue, data } => driver.queue(&queue, data),
            Command::Process { queue, handler } => driver.process(&queue, handler),
            Command::Request { url, handler } => driver.request(&url, handler),
            Command::Respond { hostname, handler } => driver.respond(&hostname, handler),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut d = f.debug_struct("Command");
        d.field("method", &self.method());
        match self {
            Command::Subscribe { channel, .. }
            | Command::Unsubscribe { channel }
            | Command::Once { channel, .. } => d.field("channel", channel),
            Command::Publish { channel, payload } => {
                d.field("channel", channel).field("payload", payload)
            }
            Command::Queue { queue, data } => d.field("queue", queue).field("data", data),
            Command::Process { queue, .. } => d.field("queue", queue),
            Command::Request { url, .. } => d.field("url", url),
            Command::Respond { hostname, .. } => d.field("hostname", hostname),
        };
        d.finish()
    }
}
