pub mod dispatch;
pub mod recipient;

pub use dispatch::{
    success_rate, DispatchEvent, EventKind, RunCounters, RunProgress, RunStatus, SendRecord,
    SendStatus, Summary,
};
pub use recipient::{normalize, Recipient};
