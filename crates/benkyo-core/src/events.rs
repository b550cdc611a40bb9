use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{PomodoroPhase, RunState, TimerMode};

/// Every timer state change produces an Event. The host renders them;
/// nothing in the core waits on a consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        display_secs: u64,
        at: DateTime<Utc>,
    },
    /// Stopped by the user without closing an interval.
    TimerStopped {
        mode: TimerMode,
        display_secs: u64,
        at: DateTime<Utc>,
    },
    ModeSelected {
        mode: TimerMode,
        display_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: TimerMode,
        display_secs: u64,
        at: DateTime<Utc>,
    },
    /// Countdown starting value changed. `applied` is false when the change
    /// is held back until the current run ends.
    CountdownConfigured {
        initial_secs: u64,
        applied: bool,
        at: DateTime<Utc>,
    },
    /// A measured interval finished; `duration_secs` is what gets recorded.
    IntervalCompleted {
        mode: TimerMode,
        duration_secs: u64,
        display_secs: u64,
        run_state: RunState,
        at: DateTime<Utc>,
    },
    /// Pomodoro flipped phase without closing an interval (break -> work).
    PhaseRolled {
        from: PomodoroPhase,
        to: PomodoroPhase,
        display_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        mode: TimerMode,
        run_state: RunState,
        phase: PomodoroPhase,
        display_secs: u64,
        countdown_initial_secs: u64,
        at: DateTime<Utc>,
    },
}

/// Outcome of a fire-and-forget session save, delivered off the tick path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    SessionSaved {
        duration_secs: u64,
        category: Option<String>,
        at: DateTime<Utc>,
    },
    SessionSaveFailed {
        duration_secs: u64,
        category: Option<String>,
        reason: String,
        at: DateTime<Utc>,
    },
    /// A completed interval was discarded because no profile was set.
    IdentityMissing {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
}
