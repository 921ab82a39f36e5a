pub mod amino;
pub mod driver;
pub mod events;

// Публичный экспорт всех типов ошибок из вложенных модулей,
// чтобы упростить доступ к ним из внешнего кода.
pub use amino::{AminoError, AminoResult};
pub use driver::{DriverError, DriverResult};
pub use events::{RecvError, TryRecvError};
