/// Event bridge: driver `error` / `subscribe` events forwarded to the facade.
pub mod bridge;
/// Facade commands and the values that travel through them.
pub mod command;
/// Configuration sources: files, environment, command line, overrides.
pub mod config;
/// Driver registry, per-pattern command queues and the dispatcher.
pub mod dispatch;
/// Driver contract, plugin catalog and the built-in memory drivers.
pub mod driver;
/// Error types and result aliases.
pub mod error;
/// The `Amino` facade and its builder.
pub mod facade;
/// Logging setup (filters, formatting).
pub mod logging;
/// Messaging patterns and driver methods.
pub mod pattern;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Event stream and emitter.
pub use bridge::{AminoEvent, EventEmitter, EventStream};
/// Commands, messages, jobs, requests and responses.
pub use command::{
    Ack, Command, Dispatch, Job, JobHandler, Message, MessageHandler, PendingResponse, Reply,
    Request, RequestHandler, Response, ResponseHandler,
};
/// Configuration.
pub use config::{AminoArgs, ConfigStore, PatternSettings, Settings};
/// Dispatch core.
pub use dispatch::{Dispatcher, Readiness};
/// Driver plugin API.
pub use driver::{
    memory::{MemoryDriverFactory, MemoryHub, MemoryOptions},
    Driver, DriverCatalog, DriverContext, DriverFactory, DriverOptions,
};
/// Operation errors and result types.
pub use error::{AminoError, AminoResult, DriverError, DriverResult, RecvError, TryRecvError};
/// Facade.
pub use facade::{Amino, AminoBuilder};
/// Logging.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Patterns and methods.
pub use pattern::{Method, Pattern};
