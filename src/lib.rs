// PlastiWatch V2 - Event Log Firmware Library
//
// The persistent event log and the tasks that feed it. Everything except the
// flash backend and the hardware-facing task loops builds on the host, so
// the log is tested against `RamStorage`.

pub mod clock;
pub mod config;
pub mod diag;
pub mod error;
pub mod eventlog;
pub mod events;
pub mod storage;
pub mod tasks;

pub use clock::{ManualClock, SystemClock, WallClock};
pub use config::LogConfig;
pub use error::LogError;
pub use eventlog::{Cursor, Decoded, EventLog, Position, Record, SharedEventLog, SwapRequestSink};
pub use events::{Event16Kind, SimpleEvent, SystemMessage};
pub use storage::{EventLogStorage, RamStorage, EMPTY_WORD};
