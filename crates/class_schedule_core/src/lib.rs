pub mod audit;
pub mod conflict;
pub mod domain;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod period;
pub mod ports;
pub mod scheduler;

pub use domain::{Class, Classroom, Department, LogEntry, Login, NewLogEntry, ScheduleChange, Teacher};
pub use period::{PairToken, PeriodEncoding, PeriodError};
pub use ports::{DatabaseService, PortError, PortResult};
pub use scheduler::{ActorId, ScheduleError, ScheduleOutcome, Scheduler};
