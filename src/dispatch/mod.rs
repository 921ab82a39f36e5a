//! Диспетчеризация вызовов фасада.
//!
//! Реестр держит не больше одного драйвера на паттерн, очередь копит вызовы
//! до готовности драйвера, диспетчер выбирает между немедленным вызовом и
//! постановкой в очередь.

pub mod dispatcher;
pub mod queue;
pub mod registry;

// Публичный экспорт ядра
pub use dispatcher::Dispatcher;
pub use queue::CommandQueue;
pub use registry::Readiness;

pub(crate) use registry::{DriverInstance, Registry};
