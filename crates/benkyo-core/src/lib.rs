//! # Benkyo Core Library
//!
//! This library provides the core business logic for the Benkyo study timer.
//! It implements a CLI-first philosophy where all operations are available via
//! a standalone CLI binary; any host (a TUI, a GUI shell) is expected to be a
//! thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A tick-driven state machine covering three modes
//!   (stopwatch, countdown, pomodoro); the engine itself is synchronous and
//!   advances one second per `tick()` call
//! - **Clock Driver**: A tokio task that produces the one-second tick cadence
//!   while a timer runs
//! - **Session Recording**: Completed intervals become durable session rows,
//!   attributed to the active profile and optional category
//! - **Storage**: SQLite-based session storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerController`]: Async facade wiring the engine, clock and recorder
//! - [`TimerEngine`]: Core timer state machine
//! - [`Database`]: Session and statistics persistence
//! - [`Config`]: Application configuration management
//! - [`SessionStore`] / [`IdentityProvider`]: Traits behind which persistence
//!   and profile lookup live

pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, StoreError};
pub use events::{Event, Notice};
pub use session::{IdentityProvider, SessionRecord, SessionRecorder, SessionStore, UserHandle};
pub use storage::{Category, Config, Database, DayTotal, SessionRow, Stats};
pub use timer::{
    ClockDriver, PomodoroPhase, RunState, Tick, TimerController, TimerEngine, TimerMode,
    TimerSettings, DEFAULT_BREAK_SECS, DEFAULT_COUNTDOWN_SECS, DEFAULT_WORK_SECS, TICK_INTERVAL,
};
