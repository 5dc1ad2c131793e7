pub mod config;
pub mod enums;
pub mod snapshot;
pub mod task;

pub use config::{ProjectConfig, RunnerConfig, TuiConfig};
pub use enums::{Classification, EntryStatus, LogLevel, Outcome, Priority};
pub use snapshot::{ProjectSnapshot, ResourceMetrics, RunnerSnapshot};
pub use task::{EdgeRef, GraphStats, ResolvedGraph, ResolvedTask, Task};
