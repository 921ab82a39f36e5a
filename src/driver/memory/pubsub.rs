use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::{runtime::Handle, sync::broadcast::error::RecvError, task::AbortHandle};
use tracing::debug;

use super::{Broker, MemoryOptions};
use crate::{
    bridge::EventEmitter, driver::Driver, DriverError, DriverResult, MessageHandler, Method,
    Pattern, Reply,
};

/// Драйвер pub/sub поверх [`Broker`].
///
/// Каждая подписка обслуживается отдельной задачей, которая передаёт
/// сообщения обработчику в порядке публикации. `unsubscribe` снимает только
/// подписки этого драйвера; подписки других фасадов на общем хабе остаются.
pub struct MemoryPubSub {
    broker: Arc<Broker>,
    emitter: EventEmitter,
    capacity: usize,
    connect_delay: Option<Duration>,
    subscriptions: DashMap<String, Vec<AbortHandle>>,
}

impl MemoryPubSub {
    pub fn new(
        broker: Arc<Broker>,
        emitter: EventEmitter,
        options: &MemoryOptions,
    ) -> Self {
        Self {
            broker,
            emitter,
            capacity: options.capacity,
            connect_delay: options.connect_delay(),
            subscriptions: DashMap::new(),
        }
    }

    /// Количество живых подписок этого драйвера на канал.
    pub fn local_subscriptions(
        &self,
        channel: &str,
    ) -> usize {
        self.subscriptions
            .get(channel)
            .map(|tasks| tasks.iter().filter(|t| !t.is_finished()).count())
            .unwrap_or(0)
    }

    fn listen(
        &self,
        channel: &str,
        handler: MessageHandler,
        once: bool,
    ) -> DriverResult<Reply> {
        let runtime = Handle::try_current().map_err(|_| DriverError::NoRuntime)?;
        let mut rx = self.broker.subscribe(channel, self.capacity);
        let count = self.broker.subscriber_count(channel);

        let emitter = self.emitter.clone();
        let name = channel.to_string();
        let task = runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        handler(msg);
                        if once {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => emitter.error(DriverError::Other(format!(
                        "subscriber on '{name}' lagged behind by {n} messages"
                    ))),
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(channel = %name, "Subscription closed");
        });

        let mut tasks = self.subscriptions.entry(channel.to_string()).or_default();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task.abort_handle());
        drop(tasks);

        self.emitter.subscribed(channel, count);
        Ok(Reply::Done)
    }
}

#[async_trait]
impl Driver for MemoryPubSub {
    fn name(&self) -> &str {
        "memory"
    }

    fn implements(
        &self,
        method: Method,
    ) -> bool {
        method.pattern() == Pattern::Pubsub
    }

    fn has_connect(&self) -> bool {
        self.connect_delay.is_some()
    }

    async fn connect(&self) -> DriverResult<()> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn subscribe(
        &self,
        channel: &str,
        handler: MessageHandler,
    ) -> DriverResult<Reply> {
        self.listen(channel, handler, false)
    }

    fn once(
        &self,
        channel: &str,
        handler: MessageHandler,
    ) -> DriverResult<Reply> {
        self.listen(channel, handler, true)
    }

    fn publish(
        &self,
        channel: &str,
        payload: Value,
    ) -> DriverResult<Reply> {
        Ok(Reply::Delivered(self.broker.publish(channel, payload)))
    }

    fn unsubscribe(
        &self,
        channel: &str,
    ) -> DriverResult<Reply> {
        if let Some((_, tasks)) = self.subscriptions.remove(channel) {
            debug!(channel, subscriptions = tasks.len(), "Unsubscribing");
            for task in tasks {
                task.abort();
            }
        }
        Ok(Reply::Done)
    }
}
