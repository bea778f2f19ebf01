//! Animation lifecycle state machine.
//!
//! The scheduler owns the tick/frame lifecycle of one simulation cycle:
//!
//! ```text
//! Idle -> Warming -> Running -> Stopped
//!   ^________________|
//!      (data/config change re-enters at Warming)
//! ```
//!
//! Warmup ticks run synchronously before the first rendered frame. While
//! running, every externally pumped frame advances the simulation once until
//! either the tick budget or the wall-clock budget is exhausted; the frame
//! that trips a limit performs one last transform sync without advancing, and
//! every frame after that is a no-op. Re-heating never resumes a cooled
//! engine: it restarts the whole cycle at warming with full energy.

/// Lifecycle phase of the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No active cycle (startup, or paused by a data change).
    #[default]
    Idle,
    /// Synchronous warmup ticks are running; nothing rendered yet.
    Warming,
    /// Frame-driven ticking; this is the cooling-down window when a finite
    /// budget is configured.
    Running,
    /// Budgets exhausted; positions frozen at their last values.
    Stopped,
}

/// What the engine should do for one pumped frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// Advance the simulation one step, then sync transforms.
    Advance,
    /// Budget just ran out: sync transforms once more, no advance.
    FinalSync,
    /// Simulation is not running; do nothing.
    Halted,
}

/// Tick/frame lifecycle controller.
#[derive(Debug, Default)]
pub struct AnimationScheduler {
    phase: Phase,
    ticks: u64,
    started_ms: f64,
    cooldown_ticks: Option<u64>,
    cooldown_time_ms: Option<f64>,
}

impl AnimationScheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ticks elapsed since the cycle entered `Running`.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Pause the cycle (graph data replacement does this before rebuilding).
    pub fn pause(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Enter the warmup phase of a fresh cycle.
    pub fn begin_warmup(&mut self) {
        self.phase = Phase::Warming;
        self.ticks = 0;
    }

    /// Warmup complete: start frame-driven ticking under the given budgets.
    /// `None` budgets never expire.
    pub fn begin_running(
        &mut self,
        now_ms: f64,
        cooldown_ticks: Option<u64>,
        cooldown_time_ms: Option<f64>,
    ) {
        self.phase = Phase::Running;
        self.ticks = 0;
        self.started_ms = now_ms;
        self.cooldown_ticks = cooldown_ticks;
        self.cooldown_time_ms = cooldown_time_ms;
    }

    /// Account for one pumped frame and decide what it should do.
    pub fn frame(&mut self, now_ms: f64) -> FrameAction {
        if self.phase != Phase::Running {
            return FrameAction::Halted;
        }

        self.ticks += 1;
        let ticks_exhausted = self.cooldown_ticks.is_some_and(|max| self.ticks > max);
        let time_exhausted = self
            .cooldown_time_ms
            .is_some_and(|max| now_ms - self.started_ms > max);

        if ticks_exhausted || time_exhausted {
            self.phase = Phase::Stopped;
            FrameAction::FinalSync
        } else {
            FrameAction::Advance
        }
    }
}

/// Current wall-clock time in milliseconds.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Current wall-clock time in milliseconds.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
