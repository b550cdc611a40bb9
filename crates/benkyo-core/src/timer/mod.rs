mod clock;
mod controller;
mod engine;
mod strategy;

pub use clock::{ClockDriver, Tick, TICK_INTERVAL};
pub use controller::TimerController;
pub use engine::{RunState, TimerEngine};
pub use strategy::{
    PomodoroPhase, TimerMode, TimerSettings, DEFAULT_BREAK_SECS, DEFAULT_COUNTDOWN_SECS,
    DEFAULT_WORK_SECS,
};
