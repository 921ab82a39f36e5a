//! Общие помощники интеграционных тестов.
#![allow(dead_code)]

use std::time::Duration;

use amino::{Amino, MemoryHub};
use tokio::sync::mpsc;

/// Максимальное ожидание одного события в тестах.
pub const WAIT: Duration = Duration::from_secs(2);

/// Префикс окружения, под которым в тестах нет переменных.
pub const TEST_ENV_PREFIX: &str = "AMINO_IT_UNSET";

/// Фасад с драйвером `memory` для всех паттернов.
pub fn memory_amino() -> Amino {
    Amino::builder()
        .env_prefix(TEST_ENV_PREFIX)
        .memory_defaults()
        .build()
        .expect("memory facade")
}

/// Фасад с драйвером `memory` поверх общего хаба.
pub fn shared_amino(hub: &MemoryHub) -> Amino {
    Amino::builder()
        .env_prefix(TEST_ENV_PREFIX)
        .hub(hub.clone())
        .memory_defaults()
        .build()
        .expect("shared facade")
}

/// Ждёт следующее значение канала не дольше [`WAIT`].
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for value")
        .expect("channel closed")
}

/// Даёт фоновым задачам доработать.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
