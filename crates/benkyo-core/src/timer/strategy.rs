use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default fixed durations, in seconds.
pub const DEFAULT_WORK_SECS: u64 = 25 * 60;
pub const DEFAULT_BREAK_SECS: u64 = 5 * 60;
pub const DEFAULT_COUNTDOWN_SECS: u64 = 45 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Stopwatch,
    Countdown,
    Pomodoro,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Stopwatch => "stopwatch",
            TimerMode::Countdown => "countdown",
            TimerMode::Pomodoro => "pomodoro",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopwatch" => Ok(TimerMode::Stopwatch),
            "countdown" => Ok(TimerMode::Countdown),
            "pomodoro" => Ok(TimerMode::Pomodoro),
            other => Err(CoreError::InvalidValue {
                field: "mode".into(),
                message: format!("unknown mode '{other}' (stopwatch, countdown, pomodoro)"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PomodoroPhase {
    Work,
    Break,
}

impl PomodoroPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PomodoroPhase::Work => "work",
            PomodoroPhase::Break => "break",
        }
    }
}

impl fmt::Display for PomodoroPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed interval durations, set once for an engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    pub work_secs: u64,
    pub break_secs: u64,
    pub countdown_initial_secs: u64,
}

impl TimerSettings {
    /// Replace zero durations with the defaults, so a hand-edited config
    /// cannot produce an unrunnable timer.
    pub fn sanitized(self) -> Self {
        Self {
            work_secs: nonzero_or(self.work_secs, DEFAULT_WORK_SECS),
            break_secs: nonzero_or(self.break_secs, DEFAULT_BREAK_SECS),
            countdown_initial_secs: nonzero_or(
                self.countdown_initial_secs,
                DEFAULT_COUNTDOWN_SECS,
            ),
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_secs: DEFAULT_WORK_SECS,
            break_secs: DEFAULT_BREAK_SECS,
            countdown_initial_secs: DEFAULT_COUNTDOWN_SECS,
        }
    }
}

fn nonzero_or(value: u64, fallback: u64) -> u64 {
    if value == 0 {
        fallback
    } else {
        value
    }
}

/// What one elapsed second does to the active mode's display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TickEffect {
    pub next_display_secs: u64,
    /// Length of the interval this tick closed, if any.
    pub completed_secs: Option<u64>,
    /// Phase after the tick, when it changed.
    pub next_phase: Option<PomodoroPhase>,
    /// The run ends by itself after this tick.
    pub auto_stop: bool,
}

impl TickEffect {
    fn display(next_display_secs: u64) -> Self {
        Self {
            next_display_secs,
            completed_secs: None,
            next_phase: None,
            auto_stop: false,
        }
    }
}

/// Stopwatch counts up and never completes on a tick; its interval closes
/// on the user's stop action instead.
pub(crate) fn stopwatch_tick(elapsed_secs: u64) -> TickEffect {
    TickEffect::display(elapsed_secs.saturating_add(1))
}

/// Countdown counts down and closes an interval of exactly `initial_secs`
/// at the boundary. The display rolls back to the full value rather than
/// showing zero, and the run stops.
pub(crate) fn countdown_tick(remaining_secs: u64, initial_secs: u64) -> TickEffect {
    if remaining_secs > 1 {
        return TickEffect::display(remaining_secs - 1);
    }
    TickEffect {
        next_display_secs: initial_secs,
        completed_secs: Some(initial_secs),
        next_phase: None,
        auto_stop: true,
    }
}

/// Pomodoro counts down and keeps running across phase boundaries. A work
/// boundary closes a work-length interval and flips to break; a break
/// boundary flips back to work and closes nothing.
pub(crate) fn pomodoro_tick(
    remaining_secs: u64,
    phase: PomodoroPhase,
    settings: &TimerSettings,
) -> TickEffect {
    if remaining_secs > 1 {
        return TickEffect::display(remaining_secs - 1);
    }
    match phase {
        PomodoroPhase::Work => TickEffect {
            next_display_secs: settings.break_secs,
            completed_secs: Some(settings.work_secs),
            next_phase: Some(PomodoroPhase::Break),
            auto_stop: false,
        },
        PomodoroPhase::Break => TickEffect {
            next_display_secs: settings.work_secs,
            completed_secs: None,
            next_phase: Some(PomodoroPhase::Work),
            auto_stop: false,
        },
    }
}
