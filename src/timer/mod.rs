pub mod commands;
pub mod controller;
pub mod countdown;
pub mod cycle;
pub mod error;
pub mod events;
pub mod state;

pub use controller::TimerController;
pub use countdown::{Countdown, Tick};
pub use cycle::CycleTracker;
pub use error::TimerError;
pub use events::{NoticeLevel, TimerEvent};
pub use state::{OpenSession, TimerMode, TimerSnapshot, TimerState, TimerStatus};
