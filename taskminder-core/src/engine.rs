//! Owns the periodic scan loop.
//!
//! Spawns a tokio task that runs a [`Scanner`] tick every `interval`, after
//! an initial delay. `stop` cancels the loop and waits out a tick that is
//! already running, so once it returns no scan is in progress and none will
//! begin.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{ReminderError, Result};
use crate::notifier::Notifier;
use crate::scanner::{ScanReport, Scanner};
use crate::store::TaskStore;

/// Shortest allowed scan interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Longest allowed delay before the first scan.
pub const MAX_INITIAL_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Time between scans. Never below [`MIN_INTERVAL`].
    pub interval: Duration,
    /// Delay before the first scan. Never above [`MAX_INITIAL_DELAY`].
    pub initial_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    pub fn new(interval: Duration, initial_delay: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            initial_delay: initial_delay.min(MAX_INITIAL_DELAY),
        }
    }

    pub fn from_secs(interval_secs: u64, initial_delay_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(initial_delay_secs),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

struct Running {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

pub struct Engine {
    scanner: Arc<Scanner>,
    config: EngineConfig,
    // Held for the whole of every scheduled tick.
    gate: Arc<Mutex<()>>,
    running: Mutex<Option<Running>>,
}

impl Engine {
    pub fn new(store: Arc<TaskStore>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        let config = EngineConfig::new(config.interval, config.initial_delay);
        Self {
            scanner: Arc::new(Scanner::new(store, notifier)),
            config,
            gate: Arc::new(Mutex::new(())),
            running: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        self.scanner.store()
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> EngineState {
        if self.running().is_some() {
            EngineState::Running
        } else {
            EngineState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Begin periodic scanning on the current tokio runtime.
    ///
    /// No-op when already running. Fails with [`ReminderError::Runtime`]
    /// outside a runtime.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running();
        if running.is_some() {
            debug!("engine already running");
            return Ok(());
        }

        let rt = tokio::runtime::Handle::try_current()
            .map_err(|e| ReminderError::Runtime(e.to_string()))?;

        let cancel = CancellationToken::new();
        let handle = rt.spawn(scan_loop(
            Arc::clone(&self.scanner),
            Arc::clone(&self.gate),
            cancel.clone(),
            self.config,
        ));

        *running = Some(Running {
            cancel,
            _handle: handle,
        });
        info!(
            interval_secs = self.config.interval.as_secs(),
            initial_delay_secs = self.config.initial_delay.as_secs(),
            "engine started"
        );
        Ok(())
    }

    /// Halt periodic scanning. Idempotent.
    ///
    /// Blocks until an in-flight tick finishes; must not be called from
    /// inside a [`Notifier`].
    pub fn stop(&self) {
        let Some(running) = self.running().take() else {
            return;
        };

        {
            let _tick = self.gate.lock().unwrap_or_else(|e| e.into_inner());
            running.cancel.cancel();
        }
        info!("engine stopped");
    }

    /// Run one scan immediately, independent of the schedule.
    pub fn scan_now(&self) -> ScanReport {
        self.scanner.scan_once()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn scan_loop(
    scanner: Arc<Scanner>,
    gate: Arc<Mutex<()>>,
    cancel: CancellationToken,
    config: EngineConfig,
) {
    let now = Instant::now();
    let first = now
        .checked_add(config.initial_delay)
        .or_else(|| now.checked_add(MAX_INITIAL_DELAY))
        .unwrap_or(now);
    let mut interval = tokio::time::interval_at(first, config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !tick(&scanner, &gate, &cancel) {
                    break;
                }
            }
        }
    }
    debug!("scan loop exited");
}

/// Returns `false` once the loop should exit.
fn tick(scanner: &Scanner, gate: &Mutex<()>, cancel: &CancellationToken) -> bool {
    let _tick = gate.lock().unwrap_or_else(|e| e.into_inner());
    if cancel.is_cancelled() {
        return false;
    }
    if catch_unwind(AssertUnwindSafe(|| scanner.scan_once())).is_err() {
        error!("scan tick panicked; continuing on schedule");
    }
    true
}
