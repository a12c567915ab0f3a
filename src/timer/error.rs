use std::fmt;

use super::TimerMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Countdown is at zero; it has to be reset before it can run again.
    Exhausted,
    NotActive,
    ConfirmationRequired { from: TimerMode, to: TimerMode },
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::Exhausted => write!(f, "Countdown has no time left; reset it first"),
            TimerError::NotActive => write!(f, "Timer is not running or paused"),
            TimerError::ConfirmationRequired { from, to } => write!(
                f,
                "Switching from {from} to {to} discards the current session; confirm to continue"
            ),
        }
    }
}

impl std::error::Error for TimerError {}
