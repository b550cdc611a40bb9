//! Cancellable 1 Hz tick source.
//!
//! While armed, a spawned task pushes one tick per wall-clock second onto
//! an unbounded channel. Disarming aborts the task and bumps the driver's
//! generation, so a tick that was already queued can be recognized as
//! stale and dropped by the consumer. Re-arming restarts the cadence from
//! "now plus one second"; tick boundaries do not line up across
//! arm/disarm cycles.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// One scheduled tick, stamped with the generation it was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

/// Cancellable tick scheduler. One per timer controller.
pub struct ClockDriver {
    tx: mpsc::UnboundedSender<Tick>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

impl ClockDriver {
    /// Returns the driver and the receiving end of its tick stream.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                task: None,
                generation: 0,
            },
            rx,
        )
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Ticks stamped with anything but the current generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start emitting ticks, the first roughly one second from now.
    /// Arming an armed driver restarts the cadence.
    pub fn arm(&mut self) {
        self.disarm();
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            // A tokio interval yields immediately on its first tick; swallow
            // it so the cadence starts a full second after arming.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(Tick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    /// Stop emitting ticks and invalidate any tick already queued.
    /// Idempotent.
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.generation += 1;
        }
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_one_tick_per_second_while_armed() {
        let (mut driver, mut rx) = ClockDriver::new();
        let armed_at = tokio::time::Instant::now();
        driver.arm();
        // The cadence constant is reachable from the crate root.
        for expected in 1..=3u32 {
            let tick = rx.recv().await.unwrap();
            assert_eq!(tick.generation, driver.generation());
            assert_eq!(armed_at.elapsed(), crate::TICK_INTERVAL * expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_invalidates_queued_ticks() {
        let (mut driver, mut rx) = ClockDriver::new();
        driver.arm();
        let live_generation = driver.generation();

        // Let one tick land in the channel without consuming it.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        driver.disarm();

        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.generation, live_generation);
        assert_ne!(queued.generation, driver.generation());

        // Nothing further arrives once disarmed.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_is_idempotent() {
        let (mut driver, _rx) = ClockDriver::new();
        driver.arm();
        driver.disarm();
        let generation = driver.generation();
        driver.disarm();
        assert_eq!(driver.generation(), generation);
        assert!(!driver.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_restarts_cadence_with_fresh_generation() {
        let (mut driver, mut rx) = ClockDriver::new();
        driver.arm();
        let first_generation = driver.generation();
        let _ = rx.recv().await.unwrap();

        driver.disarm();
        driver.arm();
        assert!(driver.generation() > first_generation);

        let rearmed_at = tokio::time::Instant::now();
        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.generation, driver.generation());
        assert_eq!(rearmed_at.elapsed(), Duration::from_secs(1));
    }
}
