//! Terminal progress display driven by the checker's progress handle

use indicatif::{ProgressBar, ProgressStyle};
use patchscan_compare::{ComparePhase, ProgressHandle, ProgressSnapshot};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const BAR_LENGTH: u64 = 1000;

/// Polls a [`ProgressHandle`] and renders it as a spinner or a bar
pub struct ProgressDisplay {
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProgressDisplay {
    /// Start polling; a quiet display renders nothing
    pub fn start(handle: ProgressHandle, quiet: bool, refresh: Duration) -> Self {
        let stop = CancellationToken::new();
        if quiet {
            return Self { stop, task: None };
        }

        let bar = ProgressBar::new(BAR_LENGTH);
        bar.enable_steady_tick(Duration::from_millis(100));

        let token = stop.clone();
        let task = tokio::spawn(async move {
            let mut determinate = None;
            let mut ticker = tokio::time::interval(refresh);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        render(&bar, &handle.snapshot(), &mut determinate);
                    }
                }
            }
            render(&bar, &handle.snapshot(), &mut determinate);
            bar.finish_and_clear();
        });

        Self {
            stop,
            task: Some(task),
        }
    }

    /// Stop polling and clear the display
    pub async fn finish(mut self) {
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Progress display ended abnormally: {}", e);
            }
        }
    }
}

fn render(bar: &ProgressBar, snapshot: &ProgressSnapshot, determinate: &mut Option<bool>) {
    let wants_bar = !snapshot.is_indeterminate;
    if *determinate != Some(wants_bar) {
        bar.set_style(if wants_bar { bar_style() } else { spinner_style() });
        *determinate = Some(wants_bar);
    }

    bar.set_message(phase_label(snapshot.phase));
    if wants_bar {
        bar.set_position(position(snapshot.progress));
    }
}

fn position(progress: f64) -> u64 {
    (progress.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {percent}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Human label for a phase
pub fn phase_label(phase: ComparePhase) -> &'static str {
    match phase {
        ComparePhase::Idle => "Waiting...",
        ComparePhase::FetchingManifest => "Fetching manifest...",
        ComparePhase::LoadingCache => "Loading cache...",
        ComparePhase::PreScanning => "Scanning data directory...",
        ComparePhase::Comparing => "Comparing files...",
        ComparePhase::Completed => "Done",
        ComparePhase::Cancelled => "Cancelled",
        ComparePhase::Failed => "Failed",
    }
}
