use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::Message;

type ChannelKey = Arc<str>;

/// Брокер Pub/Sub сообщений внутри процесса.
///
/// Поддерживает:
/// - Подписки по точному имени канала
/// - Автоматическое удаление каналов без подписчиков
/// - Статистику публикаций и ошибок отправки
#[derive(Default)]
pub struct Broker {
    /// Каналы → `Sender`
    channels: DashMap<ChannelKey, broadcast::Sender<Message>>,
    /// Общее количество вызовов `publish`
    publish_count: AtomicUsize,
    /// Количество неудачных `send` (нет подписчиков)
    send_error_count: AtomicUsize,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Подписка на канал. Канал создаётся при первой подписке с буфером
    /// `capacity`.
    pub fn subscribe(
        &self,
        channel: &str,
        capacity: usize,
    ) -> broadcast::Receiver<Message> {
        let key: Arc<str> = Arc::from(channel);
        self.channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(capacity.max(1)).0)
            .subscribe()
    }

    /// Количество активных подписок на канал.
    pub fn subscriber_count(
        &self,
        channel: &str,
    ) -> usize {
        self.channels
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Публикация сообщения в канал. Возвращает число подписчиков, которым
    /// оно отправлено.
    ///
    /// Если в канале не осталось подписчиков, увеличивает
    /// `send_error_count` и удаляет канал.
    pub fn publish(
        &self,
        channel: &str,
        payload: Value,
    ) -> usize {
        self.publish_count.fetch_add(1, Ordering::Relaxed);

        let Some(entry) = self.channels.get(channel) else {
            return 0;
        };
        let tx = entry.value().clone();
        let msg = Message::new(entry.key().clone(), payload);
        drop(entry);

        match tx.send(msg) {
            Ok(delivered) => delivered,
            Err(_) => {
                self.send_error_count.fetch_add(1, Ordering::Relaxed);
                self.channels
                    .remove_if(channel, |_, tx| tx.receiver_count() == 0);
                0
            }
        }
    }

    pub fn has_channel(
        &self,
        channel: &str,
    ) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn publish_count(&self) -> usize {
        self.publish_count.load(Ordering::Relaxed)
    }

    pub fn send_error_count(&self) -> usize {
        self.send_error_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::{timeout, Duration};

    use super::*;

    /// Проверяет, что сообщение доставляется подписчику, и что счётчики
    /// публикации обновлены правильно.
    #[tokio::test]
    async fn test_publish_and_receive() {
        let broker = Broker::new();
        let mut rx = broker.subscribe("chan", 5);
        assert_eq!(broker.publish("chan", json!("x")), 1);

        let msg = timeout(Duration::from_millis(50), rx.recv())
            .await
            .expect("timed out")
            .expect("no message");
        assert_eq!(&*msg.channel, "chan");
        assert_eq!(msg.payload, json!("x"));
        assert_eq!(broker.publish_count(), 1);
        assert_eq!(broker.send_error_count(), 0);
    }

    /// Проверяет, что публикация в несуществующий канал не создаёт его.
    #[tokio::test]
    async fn test_publish_to_nonexistent_channel() {
        let broker = Broker::new();
        assert_eq!(broker.publish("nochan", json!("z")), 0);
        assert_eq!(broker.publish_count(), 1);
        assert_eq!(broker.send_error_count(), 0);
        assert!(!broker.has_channel("nochan"));
    }

    /// Проверяет, что все подписчики на канал получают сообщение.
    #[tokio::test]
    async fn test_multiple_subscribers_receive() {
        let broker = Broker::new();
        let subs = (0..3)
            .map(|_| broker.subscribe("multi", 5))
            .collect::<Vec<_>>();
        assert_eq!(broker.subscriber_count("multi"), 3);

        assert_eq!(broker.publish("multi", json!({"d": 1})), 3);
        for mut rx in subs {
            let msg = rx.recv().await.expect("no msg");
            assert_eq!(msg.payload, json!({"d": 1}));
        }
    }

    /// Проверяет, что если после drop'а подписки никто не слушает канал,
    /// публикация вызывает send_error и канал удаляется.
    #[tokio::test]
    async fn test_auto_remove_empty_channel_and_error_count() {
        let broker = Broker::new();
        drop(broker.subscribe("temp", 5));
        assert!(broker.has_channel("temp"));

        assert_eq!(broker.publish("temp", json!("u")), 0);
        assert_eq!(broker.send_error_count(), 1);
        assert!(!broker.has_channel("temp"));
    }
}
