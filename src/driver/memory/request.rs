use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::MemoryOptions;
use crate::{
    driver::Driver, DriverError, DriverResult, Method, Pattern, PendingResponse, Reply, Request,
    RequestHandler, ResponseHandler,
};

/// Отвечающие стороны: имя хоста → обработчик.
pub type Responders = DashMap<String, RequestHandler>;

/// Драйвер запрос/ответ. Запросы адресуются URL `amino://host/path?query`
/// и доставляются обработчику, зарегистрированному для `host`.
pub struct MemoryRequest {
    responders: Arc<Responders>,
    connect_delay: Option<Duration>,
}

impl MemoryRequest {
    pub fn new(
        responders: Arc<Responders>,
        options: &MemoryOptions,
    ) -> Self {
        Self {
            responders,
            connect_delay: options.connect_delay(),
        }
    }
}

#[async_trait]
impl Driver for MemoryRequest {
    fn name(&self) -> &str {
        "memory"
    }

    fn implements(
        &self,
        method: Method,
    ) -> bool {
        method.pattern() == Pattern::Request
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

    fn request(
        &self,
        url: &str,
        handler: ResponseHandler,
    ) -> DriverResult<Reply> {
        let req = Request::parse(url)?;
        let runtime = Handle::try_current().map_err(|_| DriverError::NoRuntime)?;
        let responders = Arc::clone(&self.responders);
        let (tx, pending) = PendingResponse::channel();

        runtime.spawn(async move {
            let responder = responders
                .get(req.host.as_str())
                .map(|entry| Arc::clone(entry.value()));
            let result = match responder {
                Some(respond) => {
                    debug!(host = %req.host, path = %req.path, "Dispatching request");
                    Ok(respond(req))
                }
                None => Err(DriverError::NoResponder(req.host)),
            };
            handler(result.clone());
            let _ = tx.send(result);
        });
        Ok(Reply::Pending(pending))
    }

    fn respond(
        &self,
        hostname: &str,
        handler: RequestHandler,
    ) -> DriverResult<Reply> {
        if self
            .responders
            .insert(hostname.to_string(), handler)
            .is_some()
        {
            info!(host = hostname, "Responder replaced");
        }
        Ok(Reply::Done)
    }
}
