//! Driving a chapter's chunks through a synthesis backend.
//!
//! Chunks of one chapter are synthesized strictly in order, one at a time.
//! Each chunk gets a bounded number of attempts; the first chunk that cannot
//! be synthesized fails the whole chapter and nothing after it is attempted.

pub mod observer;
pub mod retry;

pub use observer::{AttemptEvent, AttemptOutcome, LogObserver, SynthesisObserver};
pub use retry::RetryPolicy;

use crate::error::ChapterError;
use crate::text::{Chunk, ChunkId};
use std::sync::Arc;
use tts_client::{SynthesisBackend, SynthesizedAudio, TtsError};

/// Audio of one chunk, tagged with the chunk it came from.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub id: ChunkId,
    pub audio: SynthesizedAudio,
}

impl AudioBuffer {
    pub fn new(id: ChunkId, audio: SynthesizedAudio) -> Self {
        Self { id, audio }
    }

    pub fn index(&self) -> usize {
        self.id.index
    }

    pub fn total(&self) -> usize {
        self.id.total
    }
}

pub struct SynthesisOrchestrator {
    backend: Arc<dyn SynthesisBackend>,
    policy: RetryPolicy,
    observer: Arc<dyn SynthesisObserver>,
}

impl SynthesisOrchestrator {
    pub fn new(backend: Arc<dyn SynthesisBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SynthesisObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Synthesize every chunk of a chapter, in order.
    ///
    /// On success the buffers are in chunk order with no gaps, except that
    /// chunks with empty text produce no buffer.
    pub async fn synthesize_chapter(
        &self,
        chapter_index: usize,
        chapter_title: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<AudioBuffer>, ChapterError> {
        let mut buffers = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let id = ChunkId::new(chapter_index, chapter_title, chunk);
            if let Some(audio) = self.synthesize_chunk(&id, &chunk.text).await? {
                buffers.push(AudioBuffer::new(id, audio));
            }
        }

        Ok(buffers)
    }

    /// Run the retry protocol for one chunk. `Ok(None)` means the text was
    /// empty and the backend was never called.
    async fn synthesize_chunk(
        &self,
        id: &ChunkId,
        text: &str,
    ) -> Result<Option<SynthesizedAudio>, ChapterError> {
        if text.trim().is_empty() {
            self.emit(id, 0, AttemptOutcome::Skipped);
            return Ok(None);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = self.backend.synthesize_chunk(text).await.and_then(|audio| {
                if audio.is_empty() {
                    Err(TtsError::EmptyAudio)
                } else {
                    Ok(audio)
                }
            });

            match result {
                Ok(audio) => {
                    self.emit(id, attempt, AttemptOutcome::Succeeded);
                    return Ok(Some(audio));
                }
                Err(error) => {
                    let will_retry = self.policy.should_retry(attempt, &error);
                    self.emit(
                        id,
                        attempt,
                        AttemptOutcome::Failed {
                            error: error.to_string(),
                            will_retry,
                        },
                    );
                    if !will_retry {
                        return Err(ChapterError::Synthesis {
                            chunk_id: id.to_string(),
                            attempts: attempt,
                            source: error,
                        });
                    }
                    tokio::time::sleep(self.policy.backoff(attempt)).await;
                }
            }
        }
    }

    fn emit(&self, id: &ChunkId, attempt: u32, outcome: AttemptOutcome) {
        self.observer.on_attempt(&AttemptEvent {
            chunk_id: id,
            attempt,
            max_attempts: self.policy.max_attempts,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::observer::testing::RecordingObserver;
    use super::*;
    use crate::text::ChunkSplitter;
    use std::time::{Duration, Instant};
    use tts_client::MockBackend;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new(i + 1, texts.len(), t.to_string()))
            .collect()
    }

    fn orchestrator(backend: Arc<MockBackend>, max_attempts: u32) -> SynthesisOrchestrator {
        SynthesisOrchestrator::new(backend, RetryPolicy::new(max_attempts, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_all_chunks_in_order() {
        let backend = Arc::new(MockBackend::always_succeeds());
        let orch = orchestrator(backend.clone(), 4);

        let buffers = orch
            .synthesize_chapter(1, "Intro", &chunks(&["one", "two", "three"]))
            .await
            .unwrap();

        let indices: Vec<usize> = buffers.iter().map(|b| b.index()).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(buffers[1].audio.bytes, MockBackend::audio_for("two"));
        assert_eq!(buffers[2].id.to_string(), "chapter-1_Intro_chunk_3_of_3");
        assert_eq!(backend.calls(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let backend = Arc::new(MockBackend::fails_then_succeeds(
            3,
            TtsError::Network("reset".into()),
        ));
        let orch = orchestrator(backend.clone(), 4);

        let buffers = orch.synthesize_chapter(1, "T", &chunks(&["hello"])).await.unwrap();
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].audio.bytes, MockBackend::audio_for("hello"));
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_exhaustion_makes_exactly_max_attempts() {
        let backend = Arc::new(MockBackend::always_fails(TtsError::ServerOverloaded {
            message: "busy".into(),
        }));
        let orch = orchestrator(backend.clone(), 4);

        let err = orch
            .synthesize_chapter(2, "T", &chunks(&["a", "b"]))
            .await
            .unwrap_err();

        assert_eq!(backend.call_count(), 4);
        assert_eq!(backend.calls(), vec!["a", "a", "a", "a"]);
        match err {
            ChapterError::Synthesis {
                chunk_id, attempts, ..
            } => {
                assert_eq!(chunk_id, "chapter-2_T_chunk_1_of_2");
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let backend = Arc::new(MockBackend::always_fails(TtsError::InvalidInput(
            "bad text".into(),
        )));
        let orch = orchestrator(backend.clone(), 4);

        let result = orch.synthesize_chapter(1, "T", &chunks(&["x"])).await;
        assert!(result.is_err());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_chunks() {
        let backend = Arc::new(MockBackend::fails_when_contains(
            "poison",
            TtsError::Network("down".into()),
        ));
        let orch = orchestrator(backend.clone(), 2);

        let result = orch
            .synthesize_chapter(1, "T", &chunks(&["fine", "poison", "never"]))
            .await;
        assert!(result.is_err());
        assert_eq!(backend.calls(), vec!["fine", "poison", "poison"]);
    }

    #[tokio::test]
    async fn test_empty_chunk_is_skipped() {
        let backend = Arc::new(MockBackend::always_succeeds());
        let observer = Arc::new(RecordingObserver::default());
        let orch = orchestrator(backend.clone(), 4).with_observer(observer.clone());

        let buffers = orch
            .synthesize_chapter(1, "T", &chunks(&["a", "  ", "c"]))
            .await
            .unwrap();

        let indices: Vec<usize> = buffers.iter().map(|b| b.index()).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(backend.call_count(), 2);
        assert!(
            observer
                .events()
                .contains(&("chapter-1_T_chunk_2_of_3".to_string(), 0, AttemptOutcome::Skipped))
        );
    }

    #[tokio::test]
    async fn test_observer_sees_every_attempt() {
        let backend = Arc::new(MockBackend::fails_then_succeeds(
            1,
            TtsError::RateLimited { retry_after: None },
        ));
        let observer = Arc::new(RecordingObserver::default());
        let orch = orchestrator(backend, 4).with_observer(observer.clone());

        orch.synthesize_chapter(5, "X", &chunks(&["hi"])).await.unwrap();

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1, 1);
        assert!(matches!(
            events[0].2,
            AttemptOutcome::Failed {
                will_retry: true,
                ..
            }
        ));
        assert_eq!(events[1], ("chapter-5_X_chunk_1_of_1".to_string(), 2, AttemptOutcome::Succeeded));
    }

    #[tokio::test]
    async fn test_backoff_is_linear() {
        let backend = Arc::new(MockBackend::fails_then_succeeds(
            3,
            TtsError::Network("flaky".into()),
        ));
        let orch = SynthesisOrchestrator::new(
            backend,
            RetryPolicy::new(4, Duration::from_millis(10)),
        );

        let started = Instant::now();
        orch.synthesize_chapter(1, "T", &chunks(&["x"])).await.unwrap();
        // 10 + 20 + 30 ms
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_order_preserved_with_uneven_latency() {
        let backend = Arc::new(MockBackend::always_succeeds().with_latency(15));
        let orch = orchestrator(backend, 4);
        let text = (1..=30).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let chunks = ChunkSplitter::new(12, " @BRK#").chunks(&text);

        let buffers = orch.synthesize_chapter(1, "T", &chunks).await.unwrap();

        assert_eq!(buffers.len(), chunks.len());
        for (buffer, chunk) in buffers.iter().zip(&chunks) {
            assert_eq!(buffer.index(), chunk.index);
            assert_eq!(buffer.audio.bytes, MockBackend::audio_for(&chunk.text));
        }
    }
}
