use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::{DriverInstance, Readiness, Registry};
use crate::{
    bridge::{Binding, EventEmitter},
    driver::Driver,
    logging, AminoError, AminoResult, Command, Dispatch, DriverError, Pattern,
};

/// Ядро фасада: реестр драйверов, очереди команд и их разбор.
///
/// Мьютекс реестра не удерживается во время вызова драйвера, поэтому
/// обработчики могут снова обращаться к фасаду.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
    generations: Arc<AtomicU64>,
    steps: Arc<DrainSteps>,
}

/// Замки шагов разбора, по одному на паттерн. Шаг нового поколения ждёт,
/// пока шаг заменённого драйвера не закончит уже извлечённую команду.
#[derive(Default)]
struct DrainSteps {
    pubsub: ReentrantMutex<()>,
    queue: ReentrantMutex<()>,
    request: ReentrantMutex<()>,
}

impl DrainSteps {
    fn get(
        &self,
        pattern: Pattern,
    ) -> &ReentrantMutex<()> {
        match pattern {
            Pattern::Pubsub => &self.pubsub,
            Pattern::Queue => &self.queue,
            Pattern::Request => &self.request,
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует драйвер как активный для паттерна.
    ///
    /// Драйвер без `connect` готов сразу. Для драйвера с `connect`
    /// подключение запускается в runtime tokio; очередь разбирается после
    /// успешного подключения.
    pub(crate) fn install(
        &self,
        pattern: Pattern,
        driver: Arc<dyn Driver>,
        emitter: EventEmitter,
        binding: Binding,
    ) -> AminoResult<()> {
        let runtime = Handle::try_current().ok();
        let connect = driver.has_connect();
        if connect && runtime.is_none() {
            return Err(AminoError::NoRuntime);
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let name = driver.name().to_string();
        let mut instance =
            DriverInstance::new(generation, Arc::clone(&driver), emitter.clone(), binding);
        instance.advance(if connect {
            Readiness::Connecting
        } else {
            Readiness::Ready
        });

        let drain = {
            let mut reg = self.registry.lock();
            if let Some(old) = reg.install(pattern, instance) {
                info!(%pattern, driver = %name, replaced = old, "Driver replaced");
            }
            !connect && reg.start_drain(pattern, generation)
        };
        info!(%pattern, driver = %name, generation, connect, "Driver registered");

        match runtime {
            Some(runtime) if connect => {
                let this = self.clone();
                runtime.spawn(async move {
                    match driver.connect().await {
                        Ok(()) => this.on_connected(pattern, generation).await,
                        Err(e) => {
                            logging::log_error(pattern, &e, "Driver failed to connect");
                            emitter.error(e);
                        }
                    }
                });
            }
            Some(runtime) if drain => {
                let this = self.clone();
                runtime.spawn(async move { this.drain(pattern, generation).await });
            }
            None if drain => while self.drain_step(pattern, generation) {},
            _ => {}
        }
        Ok(())
    }

    /// Передаёт команду драйверу или ставит её в очередь.
    pub fn invoke(
        &self,
        command: Command,
    ) -> AminoResult<Dispatch> {
        let pattern = command.pattern();
        let method = command.method();

        let driver = self
            .registry
            .lock()
            .instance(pattern)
            .map(|inst| Arc::clone(&inst.driver))
            .ok_or(AminoError::PatternNotConfigured(pattern))?;
        if !driver.implements(method) {
            return Err(AminoError::MethodNotImplemented { pattern, method });
        }

        let mut reg = self.registry.lock();
        let inst = reg
            .instance(pattern)
            .ok_or(AminoError::PatternNotConfigured(pattern))?;
        if inst.state == Readiness::Ready && !reg.is_draining(pattern) {
            let driver = Arc::clone(&inst.driver);
            drop(reg);
            return command
                .apply(&*driver)
                .map(Dispatch::Completed)
                .map_err(|e| match e {
                    DriverError::Unsupported(method) => {
                        AminoError::MethodNotImplemented { pattern, method }
                    }
                    other => AminoError::Driver(other),
                });
        }

        let position = reg.enqueue(pattern, command);
        debug!(%pattern, %method, position, "Command deferred");
        Ok(Dispatch::Deferred { position })
    }

    pub fn state(
        &self,
        pattern: Pattern,
    ) -> Option<Readiness> {
        self.registry.lock().instance(pattern).map(|inst| inst.state)
    }

    /// Количество команд, ожидающих в очереди паттерна.
    pub fn pending(
        &self,
        pattern: Pattern,
    ) -> usize {
        self.registry.lock().backlog(pattern)
    }

    /// Паттерны, для которых зарегистрирован драйвер.
    pub fn configured(&self) -> Vec<Pattern> {
        self.registry.lock().patterns()
    }

    async fn on_connected(
        &self,
        pattern: Pattern,
        generation: u64,
    ) {
        let drain = {
            let mut reg = self.registry.lock();
            match reg.current_mut(pattern, generation) {
                Some(inst) => {
                    inst.advance(Readiness::Ready);
                    reg.start_drain(pattern, generation)
                }
                None => {
                    debug!(%pattern, generation, "Connected driver was already replaced");
                    return;
                }
            }
        };
        info!(%pattern, generation, "Driver ready");
        if drain {
            self.drain(pattern, generation).await;
        }
    }

    /// Разбирает очередь по одной команде за шаг планировщика.
    async fn drain(
        &self,
        pattern: Pattern,
        generation: u64,
    ) {
        debug!(%pattern, backlog = self.pending(pattern), "Draining command queue");
        while self.drain_step(pattern, generation) {
            tokio::task::yield_now().await;
        }
    }

    /// Выполняет одну команду из очереди. `false`, когда разбор окончен.
    fn drain_step(
        &self,
        pattern: Pattern,
        generation: u64,
    ) -> bool {
        let _step = self.steps.get(pattern).lock();
        let next = self.registry.lock().next_drained(pattern, generation);
        let Some((driver, emitter, command)) = next else {
            return false;
        };
        if let Err(e) = command.apply(&*driver) {
            logging::log_error(pattern, &e, "Deferred command failed");
            emitter.error(e);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::{bridge::EventBus, DriverResult, Method, Reply};

    /// Драйвер pub/sub, который записывает опубликованные данные.
    struct Recorder {
        seen: Arc<Mutex<Vec<Value>>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Driver for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn implements(
            &self,
            method: Method,
        ) -> bool {
            method == Method::Publish
        }

        fn has_connect(&self) -> bool {
            self.delay.is_some()
        }

        async fn connect(&self) -> DriverResult<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        }

        fn publish(
            &self,
            _channel: &str,
            payload: Value,
        ) -> DriverResult<Reply> {
            self.seen.lock().push(payload);
            Ok(Reply::Done)
        }
    }

    fn install(
        dispatcher: &Dispatcher,
        bus: &EventBus,
        delay: Option<Duration>,
    ) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let driver = Recorder {
            seen: Arc::clone(&seen),
            delay,
        };
        let (emitter, binding) = bus.bind(Pattern::Pubsub);
        dispatcher
            .install(Pattern::Pubsub, Arc::new(driver), emitter, binding)
            .unwrap();
        seen
    }

    fn publish(n: i64) -> Command {
        Command::Publish {
            channel: "c".into(),
            payload: json!(n),
        }
    }

    #[test]
    fn test_unconfigured_pattern() {
        let dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.invoke(publish(1)),
            Err(AminoError::PatternNotConfigured(Pattern::Pubsub))
        ));
    }

    #[test]
    fn test_ready_driver_runs_synchronously() {
        let dispatcher = Dispatcher::new();
        let bus = EventBus::new(4);
        let seen = install(&dispatcher, &bus, None);

        let dispatch = dispatcher.invoke(publish(1)).unwrap();
        assert!(!dispatch.is_deferred());
        assert_eq!(*seen.lock(), vec![json!(1)]);
        assert_eq!(dispatcher.state(Pattern::Pubsub), Some(Readiness::Ready));
    }

    /// Тест проверяет, что ошибка использования не попадает в очередь даже
    /// до готовности драйвера.
    #[tokio::test(start_paused = true)]
    async fn test_method_check_before_queueing() {
        let dispatcher = Dispatcher::new();
        let bus = EventBus::new(4);
        install(&dispatcher, &bus, Some(Duration::from_millis(50)));

        let err = dispatcher
            .invoke(Command::Unsubscribe {
                channel: "c".into(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AminoError::MethodNotImplemented {
                method: Method::Unsubscribe,
                ..
            }
        ));
        assert_eq!(dispatcher.pending(Pattern::Pubsub), 0);
    }

    /// Тест проверяет разбор очереди в порядке постановки и то, что новые
    /// вызовы во время разбора встают за старыми.
    #[tokio::test(start_paused = true)]
    async fn test_deferred_commands_drained_in_order() {
        let dispatcher = Dispatcher::new();
        let bus = EventBus::new(4);
        let seen = install(&dispatcher, &bus, Some(Duration::from_millis(50)));
        assert_eq!(
            dispatcher.state(Pattern::Pubsub),
            Some(Readiness::Connecting)
        );

        for n in 0..3 {
            match dispatcher.invoke(publish(n)).unwrap() {
                Dispatch::Deferred { position } => assert_eq!(position, n as usize),
                other => panic!("expected deferral, got {other:?}"),
            }
        }

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(*seen.lock(), vec![json!(0), json!(1), json!(2)]);
        assert_eq!(dispatcher.pending(Pattern::Pubsub), 0);
        assert!(!dispatcher.invoke(publish(3)).unwrap().is_deferred());
        assert_eq!(seen.lock().len(), 4);
    }

    /// Драйвер, который при первой публикации снова вызывает диспетчер.
    struct Reentrant {
        dispatcher: Dispatcher,
        seen: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Driver for Reentrant {
        fn name(&self) -> &str {
            "reentrant"
        }

        fn implements(
            &self,
            method: Method,
        ) -> bool {
            method == Method::Publish
        }

        fn has_connect(&self) -> bool {
            true
        }

        fn publish(
            &self,
            _channel: &str,
            payload: Value,
        ) -> DriverResult<Reply> {
            if payload == json!(0) {
                let dispatch = self
                    .dispatcher
                    .invoke(publish(10))
                    .map_err(|e| DriverError::Other(e.to_string()))?;
                assert!(dispatch.is_deferred());
            }
            self.seen.lock().push(payload);
            Ok(Reply::Done)
        }
    }

    /// Тест проверяет, что вызов во время разбора встаёт за старыми
    /// командами, и что обработчик может снова вызвать диспетчер.
    #[tokio::test]
    async fn test_calls_during_drain_queue_behind() {
        let dispatcher = Dispatcher::new();
        let bus = EventBus::new(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let driver = Reentrant {
            dispatcher: dispatcher.clone(),
            seen: Arc::clone(&seen),
        };
        let (emitter, binding) = bus.bind(Pattern::Pubsub);
        dispatcher
            .install(Pattern::Pubsub, Arc::new(driver), emitter, binding)
            .unwrap();

        for n in 0..3 {
            assert!(dispatcher.invoke(publish(n)).unwrap().is_deferred());
        }
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            *seen.lock(),
            vec![json!(0), json!(1), json!(2), json!(10)]
        );
        assert_eq!(dispatcher.state(Pattern::Pubsub), Some(Readiness::Ready));
    }

    #[test]
    fn test_async_driver_requires_runtime() {
        let dispatcher = Dispatcher::new();
        let bus = EventBus::new(4);
        let (emitter, binding) = bus.bind(Pattern::Pubsub);
        let driver = Recorder {
            seen: Arc::default(),
            delay: Some(Duration::from_millis(1)),
        };
        assert!(matches!(
            dispatcher.install(Pattern::Pubsub, Arc::new(driver), emitter, binding),
            Err(AminoError::NoRuntime)
        ));
        assert!(dispatcher.configured().is_empty());
    }

    /// Тест проверяет, что замена подключающегося драйвера готовым
    /// переносит накопленные команды на новый драйвер.
    #[test]
    fn test_replacement_inherits_backlog() {
        let dispatcher = Dispatcher::new();
        let bus = EventBus::new(4);
        {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let _guard = rt.enter();
            install(&dispatcher, &bus, Some(Duration::from_secs(60)));
            dispatcher.invoke(publish(1)).unwrap();
        }

        let seen = install(&dispatcher, &bus, None);
        assert_eq!(*seen.lock(), vec![json!(1)]);
        assert_eq!(dispatcher.pending(Pattern::Pubsub), 0);
    }

    /// Драйвер, который в `implements` обращается к диспетчеру.
    struct Introspective {
        dispatcher: Dispatcher,
    }

    #[async_trait]
    impl Driver for Introspective {
        fn name(&self) -> &str {
            "introspective"
        }

        fn implements(
            &self,
            method: Method,
        ) -> bool {
            self.dispatcher.state(Pattern::Pubsub).is_some() && method == Method::Publish
        }

        fn publish(
            &self,
            _channel: &str,
            _payload: Value,
        ) -> DriverResult<Reply> {
            Ok(Reply::Done)
        }
    }

    /// Тест проверяет, что `implements` вызывается без удержания реестра.
    #[test]
    fn test_implements_may_call_back() {
        let dispatcher = Dispatcher::new();
        let bus = EventBus::new(4);
        let (emitter, binding) = bus.bind(Pattern::Pubsub);
        let driver = Introspective {
            dispatcher: dispatcher.clone(),
        };
        dispatcher
            .install(Pattern::Pubsub, Arc::new(driver), emitter, binding)
            .unwrap();

        assert!(!dispatcher.invoke(publish(1)).unwrap().is_deferred());
    }

    /// Драйвер, который долго выполняет команду `0` в потоке runtime.
    struct Slow {
        log: Arc<Mutex<Vec<String>>>,
        started: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Driver for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn implements(
            &self,
            method: Method,
        ) -> bool {
            method == Method::Publish
        }

        fn has_connect(&self) -> bool {
            true
        }

        fn publish(
            &self,
            _channel: &str,
            payload: Value,
        ) -> DriverResult<Reply> {
            self.log.lock().push(format!("start {payload}"));
            self.started.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            self.log.lock().push(format!("end {payload}"));
            Ok(Reply::Done)
        }
    }

    /// Драйвер без подключения, пишущий в общий журнал.
    struct Journal {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Driver for Journal {
        fn name(&self) -> &str {
            "journal"
        }

        fn implements(
            &self,
            method: Method,
        ) -> bool {
            method == Method::Publish
        }

        fn publish(
            &self,
            _channel: &str,
            payload: Value,
        ) -> DriverResult<Reply> {
            self.log.lock().push(payload.to_string());
            Ok(Reply::Done)
        }
    }

    /// Тест проверяет, что после замены драйвера во время разбора очередь
    /// продолжается только когда заменённый драйвер закончил свою команду.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replacement_during_drain_keeps_order() {
        let dispatcher = Dispatcher::new();
        let bus = EventBus::new(4);
        let log = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let (emitter, binding) = bus.bind(Pattern::Pubsub);
        let slow = Slow {
            log: Arc::clone(&log),
            started: Arc::clone(&started),
        };
        {
            let mut reg = dispatcher.registry.lock();
            for n in 0..3 {
                reg.enqueue(Pattern::Pubsub, publish(n));
            }
        }
        dispatcher
            .install(Pattern::Pubsub, Arc::new(slow), emitter, binding)
            .unwrap();

        while !started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let (emitter, binding) = bus.bind(Pattern::Pubsub);
        let journal = Journal {
            log: Arc::clone(&log),
        };
        dispatcher
            .install(Pattern::Pubsub, Arc::new(journal), emitter, binding)
            .unwrap();

        for _ in 0..200 {
            if log.lock().len() == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*log.lock(), vec!["start 0", "end 0", "1", "2"]);
        assert_eq!(dispatcher.pending(Pattern::Pubsub), 0);
    }
}
