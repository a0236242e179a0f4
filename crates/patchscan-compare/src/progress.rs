//! Progress tracking for comparison runs
//!
//! Workers only ever bump a shared atomic counter. The reporter samples that
//! counter on a fixed cadence and publishes a normalized ratio into a
//! [`ProgressHandle`], which is what an external display polls.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Phases of a comparison run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ComparePhase {
    /// No run in progress
    Idle,
    /// Fetching the manifest
    FetchingManifest,
    /// Reading the cache snapshot
    LoadingCache,
    /// Enumerating the data directory
    PreScanning,
    /// Parallel per-file comparison
    Comparing,
    /// Finished successfully
    Completed,
    /// Stopped by cancellation
    Cancelled,
    /// Stopped by an error
    Failed,
}

impl ComparePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::FetchingManifest,
            2 => Self::LoadingCache,
            3 => Self::PreScanning,
            4 => Self::Comparing,
            5 => Self::Completed,
            6 => Self::Cancelled,
            7 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// Whether the run has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Point-in-time copy of the progress state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Completion ratio in `[0, 1]`
    pub progress: f64,
    /// Whether no meaningful total is known yet
    pub is_indeterminate: bool,
    /// Current phase
    pub phase: ComparePhase,
}

#[derive(Debug)]
struct ProgressState {
    // f64 bits; for non-negative floats the bit order matches numeric order
    ratio_bits: AtomicU64,
    indeterminate: AtomicBool,
    phase: AtomicU8,
}

/// Shared, lock-free progress cell
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    state: Arc<ProgressState>,
}

impl ProgressHandle {
    /// Create a handle in the idle state
    pub fn new() -> Self {
        Self {
            state: Arc::new(ProgressState {
                ratio_bits: AtomicU64::new(0f64.to_bits()),
                indeterminate: AtomicBool::new(false),
                phase: AtomicU8::new(ComparePhase::Idle as u8),
            }),
        }
    }

    /// Completion ratio in `[0, 1]`
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.state.ratio_bits.load(Ordering::Acquire))
    }

    /// Whether no meaningful total is known yet
    pub fn is_indeterminate(&self) -> bool {
        self.state.indeterminate.load(Ordering::Acquire)
    }

    /// Current phase
    pub fn phase(&self) -> ComparePhase {
        ComparePhase::from_u8(self.state.phase.load(Ordering::Acquire))
    }

    /// Consistent-enough copy of all fields for display
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.progress(),
            is_indeterminate: self.is_indeterminate(),
            phase: self.phase(),
        }
    }

    /// Start of a run: no total known, ratio back to zero
    pub fn reset(&self) {
        self.state.indeterminate.store(true, Ordering::Release);
        self.state
            .ratio_bits
            .store(0f64.to_bits(), Ordering::Release);
    }

    /// Enter a new phase
    pub fn set_phase(&self, phase: ComparePhase) {
        self.state.phase.store(phase as u8, Ordering::Release);
        debug!("Compare phase changed to: {:?}", phase);
    }

    /// Total work is known; start publishing real ratios
    pub fn begin_determinate(&self) {
        self.state
            .ratio_bits
            .store(0f64.to_bits(), Ordering::Release);
        self.state.indeterminate.store(false, Ordering::Release);
    }

    /// Publish a ratio; never moves the published value backwards
    pub fn publish(&self, ratio: f64) {
        // -0.0 has the sign bit set and would win fetch_max over every positive ratio
        let ratio = if ratio.is_nan() || ratio <= 0.0 {
            0.0
        } else {
            ratio.min(1.0)
        };
        self.state
            .ratio_bits
            .fetch_max(ratio.to_bits(), Ordering::AcqRel);
    }

    /// Pin the ratio to 1.0 regardless of the completed count
    pub fn complete(&self) {
        self.state.indeterminate.store(false, Ordering::Release);
        self.state
            .ratio_bits
            .store(1f64.to_bits(), Ordering::Release);
    }
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter of processed work items, bumped by scan workers
#[derive(Debug)]
pub struct ScanCounter {
    completed: AtomicUsize,
    total: usize,
}

impl ScanCounter {
    /// Create a counter for `total` items
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one processed item
    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Items processed so far
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Items in the run
    pub fn total(&self) -> usize {
        self.total
    }

    /// Completed over total; an empty run counts as done
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed() as f64 / self.total as f64).min(1.0)
        }
    }
}

/// Samples a [`ScanCounter`] into a [`ProgressHandle`] on a fixed interval
#[derive(Debug)]
pub struct ProgressReporter {
    handle: ProgressHandle,
    counter: Arc<ScanCounter>,
    interval: Duration,
}

impl ProgressReporter {
    /// Create a reporter
    pub fn new(handle: ProgressHandle, counter: Arc<ScanCounter>, interval: Duration) -> Self {
        Self {
            handle,
            counter,
            interval,
        }
    }

    /// Publish one sample
    pub fn sample(&self) {
        let ratio = self.counter.ratio();
        trace!(
            "Progress sample: {}/{}",
            self.counter.completed(),
            self.counter.total()
        );
        self.handle.publish(ratio);
    }

    /// Run until `stop` fires, then publish a final sample
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    _ = ticker.tick() => self.sample(),
                }
            }

            self.sample();
        })
    }
}
