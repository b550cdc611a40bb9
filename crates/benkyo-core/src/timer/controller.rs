//! Glue between the state machine, the tick source and session recording.
//!
//! All methods run on the host's event loop. The controller holds no
//! locks; the engine is never touched from another task, so ordering falls
//! out of the single consumer: a disarm strictly precedes any engine
//! mutation, and a tick produced before it can never apply afterwards.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::clock::{ClockDriver, Tick};
use super::engine::TimerEngine;
use super::strategy::{PomodoroPhase, TimerMode, TimerSettings};
use crate::error::{CoreError, Result};
use crate::events::{Event, Notice};
use crate::session::{IdentityProvider, SessionRecorder, SessionStore};

/// Owns one engine, one tick source and the recording pipeline.
pub struct TimerController {
    engine: TimerEngine,
    driver: ClockDriver,
    recorder: SessionRecorder,
    identity: Arc<dyn IdentityProvider>,
    /// Label applied to sessions; mutated only between ticks and
    /// snapshotted at the instant an interval completes.
    category: Option<String>,
}

impl TimerController {
    /// Returns the controller plus the tick and notice streams the host
    /// must drain.
    pub fn new(
        settings: TimerSettings,
        store: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<Tick>,
        mpsc::UnboundedReceiver<Notice>,
    ) {
        let (driver, ticks) = ClockDriver::new();
        let (recorder, notices) = SessionRecorder::new(store);
        let controller = Self {
            engine: TimerEngine::new(settings),
            driver,
            recorder,
            identity,
            category: None,
        };
        (controller, ticks, notices)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.engine.mode()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn display_secs(&self) -> u64 {
        self.engine.display_secs()
    }

    pub fn pomodoro_phase(&self) -> PomodoroPhase {
        self.engine.pomodoro_phase()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn snapshot(&self) -> Event {
        self.engine.snapshot()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or stop the active mode. Starting requires an identity, so a
    /// later completion has someone to belong to.
    pub fn toggle(&mut self) -> Result<Event> {
        if !self.engine.is_running() && self.identity.current_identity().is_none() {
            return Err(CoreError::NoIdentity);
        }
        if self.engine.is_running() {
            // Disarm before the engine moves so no queued tick lands after
            // the stop.
            self.driver.disarm();
        }
        let event = self.engine.toggle();
        match &event {
            Event::TimerStarted { .. } => self.driver.arm(),
            Event::IntervalCompleted { duration_secs, .. } => {
                self.dispatch_completion(*duration_secs)
            }
            _ => {}
        }
        Ok(event)
    }

    /// Switch modes. The driver is fully disarmed before the engine moves.
    pub fn select_mode(&mut self, mode: TimerMode) -> Event {
        self.driver.disarm();
        self.engine.select_mode(mode)
    }

    /// Reset the active mode. Stops the tick flow first; never records.
    pub fn reset(&mut self) -> Event {
        self.driver.disarm();
        self.engine.reset()
    }

    /// Change the countdown starting value. Validation lives here so the
    /// engine can stay total.
    pub fn set_countdown_initial(&mut self, secs: u64) -> Result<Event> {
        if secs == 0 {
            return Err(CoreError::InvalidValue {
                field: "countdown_initial_secs".into(),
                message: "must be positive".into(),
            });
        }
        Ok(self.engine.set_countdown_initial(secs))
    }

    /// Chosen outside the tick path; snapshotted when an interval
    /// completes.
    pub fn set_category(&mut self, category: Option<String>) {
        self.category = category;
    }

    /// Feed one tick from the driver. Ticks produced before the latest
    /// disarm are dropped without touching the engine.
    pub fn on_tick(&mut self, tick: Tick) -> Option<Event> {
        if tick.generation != self.driver.generation() {
            return None;
        }
        let event = self.engine.tick()?;
        if !self.engine.is_running() {
            // The run ended on its own; cut the tick flow before anything
            // else happens.
            self.driver.disarm();
        }
        if let Event::IntervalCompleted { duration_secs, .. } = &event {
            self.dispatch_completion(*duration_secs);
        }
        Some(event)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn dispatch_completion(&mut self, duration_secs: u64) {
        match self.identity.current_identity() {
            Some(user) => {
                self.recorder
                    .record(duration_secs, self.category.clone(), user);
            }
            None => {
                // The profile vanished mid-run; drop the session rather
                // than attribute it to nobody.
                self.recorder.notify_identity_missing(duration_secs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::Notice;
    use crate::session::test_support::{MemoryStore, SwitchableIdentity};
    use crate::session::UserHandle;

    fn controller_with(
        settings: TimerSettings,
        store: Arc<MemoryStore>,
        identity: Arc<SwitchableIdentity>,
    ) -> (
        TimerController,
        mpsc::UnboundedReceiver<Tick>,
        mpsc::UnboundedReceiver<Notice>,
    ) {
        TimerController::new(settings, store, identity)
    }

    fn short_countdown(initial_secs: u64) -> TimerSettings {
        TimerSettings {
            countdown_initial_secs: initial_secs,
            ..TimerSettings::default()
        }
    }

    /// Drive `n` ticks through the controller, returning produced events.
    async fn pump_ticks(
        controller: &mut TimerController,
        ticks: &mut mpsc::UnboundedReceiver<Tick>,
        n: usize,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..n {
            let tick = ticks.recv().await.unwrap();
            if let Some(event) = controller.on_tick(tick) {
                events.push(event);
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_identity() {
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(SwitchableIdentity::absent());
        let (mut controller, mut ticks, _notices) =
            controller_with(TimerSettings::default(), store, identity);

        assert!(matches!(controller.toggle(), Err(CoreError::NoIdentity)));
        assert!(!controller.is_running());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(ticks.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stopwatch_run_records_exactly_one_session() {
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(SwitchableIdentity::named("mio"));
        let (mut controller, mut ticks, mut notices) =
            controller_with(TimerSettings::default(), store.clone(), identity);
        controller.set_category(Some("math".into()));

        controller.toggle().unwrap();
        let events = pump_ticks(&mut controller, &mut ticks, 42).await;
        assert!(events.is_empty());
        assert_eq!(controller.display_secs(), 42);

        let event = controller.toggle().unwrap();
        assert!(matches!(
            event,
            Event::IntervalCompleted {
                duration_secs: 42,
                ..
            }
        ));

        match notices.recv().await.unwrap() {
            Notice::SessionSaved {
                duration_secs,
                category,
                ..
            } => {
                assert_eq!(duration_secs, 42);
                assert_eq!(category.as_deref(), Some("math"));
            }
            other => panic!("expected SessionSaved, got {other:?}"),
        }

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user, UserHandle::new("mio"));
        assert_eq!(records[0].category.as_deref(), Some("math"));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_auto_stop_disarms_the_driver() {
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(SwitchableIdentity::named("mio"));
        let (mut controller, mut ticks, mut notices) =
            controller_with(short_countdown(3), store.clone(), identity);

        controller.select_mode(TimerMode::Countdown);
        controller.toggle().unwrap();

        let events = pump_ticks(&mut controller, &mut ticks, 3).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Event::IntervalCompleted {
                duration_secs: 3,
                ..
            }
        ));
        assert!(!controller.is_running());
        assert_eq!(controller.display_secs(), 3);

        // No ticks flow once the run has ended by itself.
        tokio::time::sleep(Duration::from_secs(5)).await;
        while let Ok(stale) = ticks.try_recv() {
            assert!(controller.on_tick(stale).is_none());
        }
        assert_eq!(controller.display_secs(), 3);

        assert!(matches!(
            notices.recv().await.unwrap(),
            Notice::SessionSaved {
                duration_secs: 3,
                ..
            }
        ));
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_tick_is_dropped_after_mode_switch() {
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(SwitchableIdentity::named("mio"));
        let (mut controller, mut ticks, _notices) =
            controller_with(TimerSettings::default(), store, identity);

        controller.toggle().unwrap();
        // Let a tick land in the channel without consuming it.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        controller.select_mode(TimerMode::Countdown);

        let stale = ticks.try_recv().unwrap();
        assert!(controller.on_tick(stale).is_none());
        assert_eq!(controller.display_secs(), 2700);

        // The stopwatch never saw the stale tick either.
        controller.select_mode(TimerMode::Stopwatch);
        assert_eq!(controller.display_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn identity_vanishing_mid_run_discards_the_session() {
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(SwitchableIdentity::named("mio"));
        let (mut controller, mut ticks, mut notices) =
            controller_with(short_countdown(2), store.clone(), identity.clone());

        controller.select_mode(TimerMode::Countdown);
        controller.toggle().unwrap();
        identity.clear();

        let events = pump_ticks(&mut controller, &mut ticks, 2).await;
        assert_eq!(events.len(), 1);

        match notices.recv().await.unwrap() {
            Notice::IdentityMissing { duration_secs, .. } => assert_eq!(duration_secs, 2),
            other => panic!("expected IdentityMissing, got {other:?}"),
        }
        assert!(store.records().is_empty());
        // The timer itself still rolled over cleanly.
        assert_eq!(controller.display_secs(), 2);
        assert!(!controller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn save_failure_leaves_timer_state_consistent() {
        let store = Arc::new(MemoryStore::failing("disk full"));
        let identity = Arc::new(SwitchableIdentity::named("mio"));
        let (mut controller, mut ticks, mut notices) =
            controller_with(short_countdown(2), store, identity);

        controller.select_mode(TimerMode::Countdown);
        controller.toggle().unwrap();
        let events = pump_ticks(&mut controller, &mut ticks, 2).await;
        assert_eq!(events.len(), 1);

        match notices.recv().await.unwrap() {
            Notice::SessionSaveFailed { reason, .. } => assert!(reason.contains("disk full")),
            other => panic!("expected SessionSaveFailed, got {other:?}"),
        }
        assert_eq!(controller.display_secs(), 2);
        assert!(!controller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn pomodoro_keeps_ticking_across_work_boundary() {
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(SwitchableIdentity::named("mio"));
        let settings = TimerSettings {
            work_secs: 3,
            break_secs: 2,
            ..TimerSettings::default()
        };
        let (mut controller, mut ticks, mut notices) =
            controller_with(settings, store.clone(), identity);

        controller.select_mode(TimerMode::Pomodoro);
        controller.toggle().unwrap();

        // Work boundary: one completion, still running, break on display.
        let events = pump_ticks(&mut controller, &mut ticks, 3).await;
        assert!(matches!(
            events[..],
            [Event::IntervalCompleted {
                duration_secs: 3,
                ..
            }]
        ));
        assert!(controller.is_running());
        assert_eq!(controller.display_secs(), 2);

        // Break boundary: a phase roll, nothing recorded.
        let events = pump_ticks(&mut controller, &mut ticks, 2).await;
        assert!(matches!(events[..], [Event::PhaseRolled { .. }]));
        assert!(controller.is_running());
        assert_eq!(controller.display_secs(), 3);

        assert!(matches!(
            notices.recv().await.unwrap(),
            Notice::SessionSaved { .. }
        ));
        assert!(notices.try_recv().is_err());
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_countdown_preset_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(SwitchableIdentity::named("mio"));
        let (mut controller, _ticks, _notices) =
            controller_with(TimerSettings::default(), store, identity);

        assert!(matches!(
            controller.set_countdown_initial(0),
            Err(CoreError::InvalidValue { .. })
        ));
        assert!(controller.set_countdown_initial(60).is_ok());
    }
}
