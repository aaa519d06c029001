//! Progress bar over every chunk of the run.

use crate::synthesis::{AttemptEvent, AttemptOutcome, LogObserver, SynthesisObserver};
use indicatif::{ProgressBar, ProgressStyle};

/// Advances a progress bar once per finished chunk and forwards every event
/// to the log.
pub struct ProgressObserver {
    bar: ProgressBar,
    log: LogObserver,
}

impl ProgressObserver {
    pub fn new(total_chunks: u64) -> Self {
        let bar = ProgressBar::new(total_chunks);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta}) {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self {
            bar,
            log: LogObserver,
        }
    }

    /// Wrap an existing bar, e.g. a hidden one.
    pub fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            log: LogObserver,
        }
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl SynthesisObserver for ProgressObserver {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        self.log.on_attempt(event);
        match &event.outcome {
            AttemptOutcome::Succeeded | AttemptOutcome::Skipped => {
                self.bar.set_message(event.chunk_id.chapter_title.clone());
                self.bar.inc(1);
            }
            AttemptOutcome::Failed {
                will_retry: true, ..
            } => {
                self.bar
                    .set_message(format!("retrying {} ({})", event.chunk_id, event.attempt));
            }
            AttemptOutcome::Failed {
                will_retry: false, ..
            } => {}
        }
    }
}
