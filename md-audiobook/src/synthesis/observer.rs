//! Per-attempt synthesis events.

use crate::text::ChunkId;

/// Result of one attempt at one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed { error: String, will_retry: bool },
    /// Empty chunk text, no backend call was made
    Skipped,
}

#[derive(Debug, Clone)]
pub struct AttemptEvent<'a> {
    pub chunk_id: &'a ChunkId,
    /// 1-based
    pub attempt: u32,
    pub max_attempts: u32,
    pub outcome: AttemptOutcome,
}

/// Receives one event per chunk attempt. Implementations are shared between
/// chapter workers.
pub trait SynthesisObserver: Send + Sync {
    fn on_attempt(&self, event: &AttemptEvent<'_>);
}

/// Writes attempt events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SynthesisObserver for LogObserver {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        match &event.outcome {
            AttemptOutcome::Succeeded => log::debug!(
                "{}: synthesized (attempt {}/{})",
                event.chunk_id,
                event.attempt,
                event.max_attempts
            ),
            AttemptOutcome::Failed {
                error,
                will_retry: true,
            } => log::warn!(
                "{}: attempt {}/{} failed, retrying: {}",
                event.chunk_id,
                event.attempt,
                event.max_attempts,
                error
            ),
            AttemptOutcome::Failed {
                error,
                will_retry: false,
            } => log::error!(
                "{}: attempt {}/{} failed, giving up: {}",
                event.chunk_id,
                event.attempt,
                event.max_attempts,
                error
            ),
            AttemptOutcome::Skipped => log::warn!("{}: empty text, skipped", event.chunk_id),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records `(chunk id, attempt, outcome)` for assertions.
    #[derive(Default)]
    pub struct RecordingObserver {
        pub events: Mutex<Vec<(String, u32, AttemptOutcome)>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<(String, u32, AttemptOutcome)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SynthesisObserver for RecordingObserver {
        fn on_attempt(&self, event: &AttemptEvent<'_>) {
            self.events.lock().unwrap().push((
                event.chunk_id.to_string(),
                event.attempt,
                event.outcome.clone(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::Chunk;

    #[test]
    fn test_log_observer_handles_every_outcome() {
        let id = ChunkId::new(1, "Intro", &Chunk::new(1, 1, "x".into()));
        let outcomes = [
            AttemptOutcome::Succeeded,
            AttemptOutcome::Failed {
                error: "boom".into(),
                will_retry: true,
            },
            AttemptOutcome::Failed {
                error: "boom".into(),
                will_retry: false,
            },
            AttemptOutcome::Skipped,
        ];
        for outcome in outcomes {
            LogObserver.on_attempt(&AttemptEvent {
                chunk_id: &id,
                attempt: 1,
                max_attempts: 4,
                outcome,
            });
        }
    }

    #[test]
    fn test_recording_observer() {
        let observer = testing::RecordingObserver::default();
        let id = ChunkId::new(3, "T", &Chunk::new(2, 4, "x".into()));
        observer.on_attempt(&AttemptEvent {
            chunk_id: &id,
            attempt: 2,
            max_attempts: 4,
            outcome: AttemptOutcome::Succeeded,
        });
        assert_eq!(
            observer.events(),
            vec![("chapter-3_T_chunk_2_of_4".to_string(), 2, AttemptOutcome::Succeeded)]
        );
    }
}
