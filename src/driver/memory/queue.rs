use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::{runtime::Handle, sync::mpsc};
use tracing::debug;

use super::MemoryOptions;
use crate::{
    bridge::EventEmitter, driver::Driver, Ack, DriverError, DriverResult, Job, JobHandler, Method,
    Pattern, Reply,
};

struct JobQueue {
    tx: mpsc::UnboundedSender<Value>,
    /// Забирается первым обработчиком.
    rx: Option<mpsc::UnboundedReceiver<Value>>,
}

impl JobQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

/// Именованные очереди задач. Задачи, поставленные до появления
/// обработчика, сохраняются и выдаются ему по порядку.
#[derive(Default)]
pub struct JobQueues {
    queues: DashMap<Arc<str>, JobQueue>,
}

impl JobQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        queue: &str,
        data: Value,
    ) -> DriverResult<()> {
        let entry = self
            .queues
            .entry(Arc::from(queue))
            .or_insert_with(JobQueue::new);
        entry
            .tx
            .send(data)
            .map_err(|_| DriverError::Other(format!("queue '{queue}' is closed")))
    }

    /// Забирает приёмник очереди. `None`, если обработчик уже есть.
    fn take_receiver(
        &self,
        queue: &str,
    ) -> Option<mpsc::UnboundedReceiver<Value>> {
        self.queues
            .entry(Arc::from(queue))
            .or_insert_with(JobQueue::new)
            .rx
            .take()
    }

    /// Возвращает приёмник в очередь после остановки обработчика.
    fn restore_receiver(
        &self,
        queue: &str,
        rx: mpsc::UnboundedReceiver<Value>,
    ) {
        if let Some(mut entry) = self.queues.get_mut(queue) {
            entry.rx = Some(rx);
        }
    }

    pub fn has_processor(
        &self,
        queue: &str,
    ) -> bool {
        self.queues
            .get(queue)
            .map(|q| q.rx.is_none())
            .unwrap_or(false)
    }
}

/// Задача-обработчик очереди. Владеет приёмником и при остановке (в том
/// числе из-за паники обработчика) возвращает его в очередь, чтобы к ней
/// мог подключиться новый обработчик.
struct Worker {
    queues: Arc<JobQueues>,
    name: Arc<str>,
    rx: Option<mpsc::UnboundedReceiver<Value>>,
    emitter: EventEmitter,
    busy: bool,
}

impl Worker {
    async fn recv(&mut self) -> Option<Value> {
        self.rx.as_mut()?.recv().await
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(rx) = self.rx.take() {
            self.queues.restore_receiver(&self.name, rx);
        }
        if self.busy {
            self.emitter.error(DriverError::Other(format!(
                "processor of queue '{}' panicked, job dropped",
                self.name
            )));
        }
    }
}

/// Драйвер очередей задач с одним обработчиком на очередь.
pub struct MemoryQueue {
    queues: Arc<JobQueues>,
    emitter: EventEmitter,
    connect_delay: Option<Duration>,
}

impl MemoryQueue {
    pub fn new(
        queues: Arc<JobQueues>,
        emitter: EventEmitter,
        options: &MemoryOptions,
    ) -> Self {
        Self {
            queues,
            emitter,
            connect_delay: options.connect_delay(),
        }
    }
}

#[async_trait]
impl Driver for MemoryQueue {
    fn name(&self) -> &str {
        "memory"
    }

    fn implements(
        &self,
        method: Method,
    ) -> bool {
        method.pattern() == Pattern::Queue
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

    fn queue(
        &self,
        queue: &str,
        data: Value,
    ) -> DriverResult<Reply> {
        self.queues.push(queue, data)?;
        Ok(Reply::Done)
    }

    fn process(
        &self,
        queue: &str,
        handler: JobHandler,
    ) -> DriverResult<Reply> {
        let runtime = Handle::try_current().map_err(|_| DriverError::NoRuntime)?;
        let rx = self
            .queues
            .take_receiver(queue)
            .ok_or_else(|| DriverError::AlreadyProcessing(queue.to_string()))?;

        let mut worker = Worker {
            queues: Arc::clone(&self.queues),
            name: Arc::from(queue),
            rx: Some(rx),
            emitter: self.emitter.clone(),
            busy: false,
        };
        runtime.spawn(async move {
            while let Some(data) = worker.recv().await {
                let (ack, done) = Ack::channel();
                worker.busy = true;
                handler(
                    Job {
                        queue: Arc::clone(&worker.name),
                        data,
                    },
                    ack,
                );
                worker.busy = false;
                let _ = done.await;
            }
            debug!(queue = %worker.name, "Queue processor stopped");
        });
        Ok(Reply::Done)
    }
}
