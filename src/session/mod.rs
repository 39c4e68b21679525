//! 会话层：每个用户一个传输会话

pub mod registry;
pub mod state;

pub use registry::{InitOutcome, SessionRegistry, SessionStatus};
pub use state::{SessionInput, SessionState};
