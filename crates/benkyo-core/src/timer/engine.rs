//! Multi-mode timer state machine.
//!
//! The engine is a synchronous state machine and owns no clock; the caller
//! feeds it one `tick()` per elapsed second while running and renders the
//! returned events. Each mode keeps its own display time across mode
//! switches, and switching always lands in `Idle`.
//!
//! ## State transitions
//!
//! ```text
//! (Idle, mode) -toggle-> (Running, mode) -toggle-> (Idle, mode)
//!                        (Running, countdown) -boundary tick-> (Idle, countdown)
//!                        (Running, pomodoro)  -boundary tick-> (Running, pomodoro')
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerSettings::default());
//! engine.toggle();
//! // Once per second:
//! engine.tick(); // Returns Some(Event) at interval boundaries
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::strategy::{self, PomodoroPhase, TimerMode, TimerSettings};
use crate::events::Event;

/// Whether the tick source is (supposed to be) armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
}

/// Core timer state machine.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    settings: TimerSettings,
    mode: TimerMode,
    run_state: RunState,
    /// Stopwatch: seconds elapsed.
    stopwatch_secs: u64,
    /// Countdown: seconds remaining.
    countdown_secs: u64,
    countdown_initial_secs: u64,
    /// Preset chosen mid-run; applied on the next entry to `Idle`.
    pending_countdown_secs: Option<u64>,
    /// Pomodoro: seconds remaining in the current phase.
    pomodoro_secs: u64,
    pomodoro_phase: PomodoroPhase,
}

impl TimerEngine {
    /// Create an engine in `Idle` with the stopwatch selected.
    ///
    /// Zero durations in `settings` are replaced with the defaults.
    pub fn new(settings: TimerSettings) -> Self {
        let settings = settings.sanitized();
        Self {
            mode: TimerMode::Stopwatch,
            run_state: RunState::Idle,
            stopwatch_secs: 0,
            countdown_secs: settings.countdown_initial_secs,
            countdown_initial_secs: settings.countdown_initial_secs,
            pending_countdown_secs: None,
            pomodoro_secs: settings.work_secs,
            pomodoro_phase: PomodoroPhase::Work,
            settings,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn pomodoro_phase(&self) -> PomodoroPhase {
        self.pomodoro_phase
    }

    pub fn countdown_initial_secs(&self) -> u64 {
        self.countdown_initial_secs
    }

    /// Seconds currently on the display for the active mode.
    pub fn display_secs(&self) -> u64 {
        match self.mode {
            TimerMode::Stopwatch => self.stopwatch_secs,
            TimerMode::Countdown => self.countdown_secs,
            TimerMode::Pomodoro => self.pomodoro_secs,
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            mode: self.mode,
            run_state: self.run_state,
            phase: self.pomodoro_phase,
            display_secs: self.display_secs(),
            countdown_initial_secs: self.countdown_initial_secs,
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Select a mode. Always lands in `Idle`, even when re-selecting the
    /// active mode; every mode's display time is preserved.
    pub fn select_mode(&mut self, mode: TimerMode) -> Event {
        self.enter_idle();
        self.mode = mode;
        Event::ModeSelected {
            mode,
            display_secs: self.display_secs(),
            at: Utc::now(),
        }
    }

    /// The start/stop button. The stop edge of a stopwatch run closes an
    /// interval when there is measured time on the display.
    pub fn toggle(&mut self) -> Event {
        match self.run_state {
            RunState::Idle => {
                self.run_state = RunState::Running;
                Event::TimerStarted {
                    mode: self.mode,
                    display_secs: self.display_secs(),
                    at: Utc::now(),
                }
            }
            RunState::Running => {
                let stopped_with = self.display_secs();
                self.enter_idle();
                if self.mode == TimerMode::Stopwatch && stopped_with > 0 {
                    self.stopwatch_secs = 0;
                    Event::IntervalCompleted {
                        mode: TimerMode::Stopwatch,
                        duration_secs: stopped_with,
                        display_secs: 0,
                        run_state: RunState::Idle,
                        at: Utc::now(),
                    }
                } else {
                    Event::TimerStopped {
                        mode: self.mode,
                        display_secs: self.display_secs(),
                        at: Utc::now(),
                    }
                }
            }
        }
    }

    /// Apply one elapsed second to the active mode. Only meaningful while
    /// running; stray ticks in `Idle` are ignored.
    pub fn tick(&mut self) -> Option<Event> {
        if self.run_state != RunState::Running {
            return None;
        }
        match self.mode {
            TimerMode::Stopwatch => {
                let fx = strategy::stopwatch_tick(self.stopwatch_secs);
                self.stopwatch_secs = fx.next_display_secs;
                None
            }
            TimerMode::Countdown => {
                let fx = strategy::countdown_tick(self.countdown_secs, self.countdown_initial_secs);
                self.countdown_secs = fx.next_display_secs;
                let duration_secs = fx.completed_secs?;
                // The run ended by itself; entering idle also applies a
                // pending preset, so the display may move to the new value.
                self.enter_idle();
                Some(Event::IntervalCompleted {
                    mode: TimerMode::Countdown,
                    duration_secs,
                    display_secs: self.countdown_secs,
                    run_state: RunState::Idle,
                    at: Utc::now(),
                })
            }
            TimerMode::Pomodoro => {
                let fx =
                    strategy::pomodoro_tick(self.pomodoro_secs, self.pomodoro_phase, &self.settings);
                self.pomodoro_secs = fx.next_display_secs;
                let from = self.pomodoro_phase;
                let to = fx.next_phase?;
                self.pomodoro_phase = to;
                Some(match fx.completed_secs {
                    Some(duration_secs) => Event::IntervalCompleted {
                        mode: TimerMode::Pomodoro,
                        duration_secs,
                        display_secs: self.pomodoro_secs,
                        run_state: RunState::Running,
                        at: Utc::now(),
                    },
                    None => Event::PhaseRolled {
                        from,
                        to,
                        display_secs: self.pomodoro_secs,
                        at: Utc::now(),
                    },
                })
            }
        }
    }

    /// Reset the active mode to its initial display value. Pomodoro returns
    /// to the work phase. Never closes an interval; idempotent.
    pub fn reset(&mut self) -> Event {
        self.enter_idle();
        match self.mode {
            TimerMode::Stopwatch => self.stopwatch_secs = 0,
            TimerMode::Countdown => self.countdown_secs = self.countdown_initial_secs,
            TimerMode::Pomodoro => {
                self.pomodoro_phase = PomodoroPhase::Work;
                self.pomodoro_secs = self.settings.work_secs;
            }
        }
        Event::TimerReset {
            mode: self.mode,
            display_secs: self.display_secs(),
            at: Utc::now(),
        }
    }

    /// Change the countdown starting value. Applied immediately while idle;
    /// while running it is held until the next entry to `Idle`, so the
    /// in-flight interval still completes with its original length.
    pub fn set_countdown_initial(&mut self, secs: u64) -> Event {
        let applied = self.run_state == RunState::Idle;
        if applied {
            self.countdown_initial_secs = secs;
            self.countdown_secs = secs;
        } else {
            self.pending_countdown_secs = Some(secs);
        }
        Event::CountdownConfigured {
            initial_secs: secs,
            applied,
            at: Utc::now(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn enter_idle(&mut self) {
        self.run_state = RunState::Idle;
        if let Some(secs) = self.pending_countdown_secs.take() {
            self.countdown_initial_secs = secs;
            self.countdown_secs = secs;
        }
    }
}
