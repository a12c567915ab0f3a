pub mod backend;
pub mod memory;
pub mod models;
pub mod recorder;
pub mod stats;

pub use backend::SessionBackend;
pub use memory::MemorySessions;
pub use models::{
    FocusSession, NewSession, SessionOutcome, SessionPatch, SessionQuery, SessionStatus,
    SessionType,
};
pub use recorder::SessionRecorder;
pub use stats::DailyProgress;
