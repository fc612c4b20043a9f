//! taskminder-core: concurrent task store and background reminder engine.
//!
//! - [`TaskStore`] owns every [`Task`] and answers time-windowed queries.
//! - [`Scanner`] walks open tasks and fires reminder/deadline events at most
//!   once per task.
//! - [`Engine`] runs the scanner on a tokio interval with start/stop control.
//! - [`Notifier`] is the single outbound capability the scanner calls.

pub mod clock;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod scanner;
pub mod store;
pub mod task;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Engine, EngineConfig, EngineState, MAX_INITIAL_DELAY, MIN_INTERVAL};
pub use error::{ReminderError, Result};
pub use notifier::{ChannelNotifier, LogNotifier, Notification, Notifier};
pub use scanner::{ScanReport, Scanner};
pub use store::TaskStore;
pub use task::{AlertKind, DEFAULT_TITLE, Task, TaskSnapshot, TaskStatus};
