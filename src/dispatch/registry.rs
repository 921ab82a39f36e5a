use std::{collections::HashMap, fmt, sync::Arc};

use super::CommandQueue;
use crate::{
    bridge::{Binding, EventEmitter},
    driver::Driver,
    Command, Pattern,
};

/// Состояние готовности экземпляра драйвера. Переходы только вперёд:
/// `NotConnected → Connecting → Ready` или `NotConnected → Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Readiness {
    NotConnected,
    Connecting,
    Ready,
}

impl fmt::Display for Readiness {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Readiness::NotConnected => "not connected",
            Readiness::Connecting => "connecting",
            Readiness::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// Активный драйвер паттерна.
pub(crate) struct DriverInstance {
    pub(crate) generation: u64,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) state: Readiness,
    pub(crate) emitter: EventEmitter,
    pub(crate) binding: Binding,
}

impl DriverInstance {
    pub(crate) fn new(
        generation: u64,
        driver: Arc<dyn Driver>,
        emitter: EventEmitter,
        binding: Binding,
    ) -> Self {
        Self {
            generation,
            driver,
            state: Readiness::NotConnected,
            emitter,
            binding,
        }
    }

    /// Переводит экземпляр вперёд. Попытка вернуться назад игнорируется.
    pub(crate) fn advance(
        &mut self,
        next: Readiness,
    ) {
        if next > self.state {
            self.state = next;
        }
    }
}

/// Реестр драйверов и очереди команд. Живёт под одним мьютексом
/// диспетчера.
#[derive(Default)]
pub(crate) struct Registry {
    instances: HashMap<Pattern, DriverInstance>,
    queues: HashMap<Pattern, CommandQueue>,
    /// Паттерн → поколение экземпляра, для которого идёт разбор очереди.
    draining: HashMap<Pattern, u64>,
}

impl Registry {
    /// Ставит новый экземпляр. Прежний отсоединяется от шины, его разбор
    /// очереди прекращается.
    pub(crate) fn install(
        &mut self,
        pattern: Pattern,
        instance: DriverInstance,
    ) -> Option<u64> {
        self.draining.remove(&pattern);
        self.instances
            .insert(pattern, instance)
            .map(|old| {
                old.binding.detach();
                old.generation
            })
    }

    pub(crate) fn instance(
        &self,
        pattern: Pattern,
    ) -> Option<&DriverInstance> {
        self.instances.get(&pattern)
    }

    /// Экземпляр указанного поколения, если он всё ещё активен.
    pub(crate) fn current_mut(
        &mut self,
        pattern: Pattern,
        generation: u64,
    ) -> Option<&mut DriverInstance> {
        self.instances
            .get_mut(&pattern)
            .filter(|inst| inst.generation == generation)
    }

    pub(crate) fn patterns(&self) -> Vec<Pattern> {
        let mut patterns: Vec<Pattern> = self.instances.keys().copied().collect();
        patterns.sort();
        patterns
    }

    pub(crate) fn enqueue(
        &mut self,
        pattern: Pattern,
        command: Command,
    ) -> usize {
        self.queues.entry(pattern).or_default().push(command)
    }

    pub(crate) fn backlog(
        &self,
        pattern: Pattern,
    ) -> usize {
        self.queues.get(&pattern).map(CommandQueue::len).unwrap_or(0)
    }

    pub(crate) fn is_draining(
        &self,
        pattern: Pattern,
    ) -> bool {
        self.draining.contains_key(&pattern)
    }

    /// Начинает разбор очереди для поколения, если в ней что-то есть.
    pub(crate) fn start_drain(
        &mut self,
        pattern: Pattern,
        generation: u64,
    ) -> bool {
        if self.backlog(pattern) == 0 {
            return false;
        }
        self.draining.insert(pattern, generation);
        true
    }

    /// Следующая команда для разбора. `None` завершает разбор: очередь
    /// пуста или экземпляр заменён.
    pub(crate) fn next_drained(
        &mut self,
        pattern: Pattern,
        generation: u64,
    ) -> Option<(Arc<dyn Driver>, EventEmitter, Command)> {
        if self.draining.get(&pattern) != Some(&generation) {
            return None;
        }
        let (driver, emitter) = match self.instances.get(&pattern) {
            Some(inst) if inst.generation == generation => {
                (Arc::clone(&inst.driver), inst.emitter.clone())
            }
            _ => return None,
        };
        match self.queues.get_mut(&pattern).and_then(CommandQueue::pop) {
            Some(command) => Some((driver, emitter, command)),
            None => {
                self.draining.remove(&pattern);
                None
            }
        }
    }
}
