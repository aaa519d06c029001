//! Per-chapter composition of splitting, synthesis and assembly, run across
//! chapters by a bounded worker pool.

pub mod progress;

pub use progress::ProgressObserver;

use crate::audio::{AudioAssembler, AudioTags};
use crate::document::Chapter;
use crate::error::ChapterError;
use crate::synthesis::SynthesisOrchestrator;
use crate::text::ChunkSplitter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// A chapter paired with its 1-based position in the parsed document.
#[derive(Debug, Clone)]
pub struct NumberedChapter {
    pub index: usize,
    pub chapter: Chapter,
}

/// Outcome of one chapter.
#[derive(Debug)]
pub struct ChapterOutcome {
    pub index: usize,
    pub title: String,
    pub result: Result<PathBuf, ChapterError>,
}

/// Final status of a run, in chapter order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<ChapterOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ChapterOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ChapterOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// `0007_Chapter_Seven.mp3`
pub fn output_file_name(index: usize, title: &str, extension: &str) -> String {
    format!("{:04}_{}.{}", index, title, extension)
}

pub struct ChapterPipeline {
    orchestrator: SynthesisOrchestrator,
    splitter: ChunkSplitter,
    assembler: AudioAssembler,
    output_dir: PathBuf,
    book_title: String,
    author: String,
    /// Chapter count of the whole document, for track tags
    total_chapters: usize,
    write_text: bool,
}

impl ChapterPipeline {
    pub fn new(
        orchestrator: SynthesisOrchestrator,
        splitter: ChunkSplitter,
        assembler: AudioAssembler,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            orchestrator,
            splitter,
            assembler,
            output_dir: output_dir.into(),
            book_title: String::new(),
            author: String::new(),
            total_chapters: 0,
            write_text: false,
        }
    }

    pub fn with_book(
        mut self,
        title: impl Into<String>,
        author: impl Into<String>,
        total_chapters: usize,
    ) -> Self {
        self.book_title = title.into();
        self.author = author.into();
        self.total_chapters = total_chapters;
        self
    }

    /// Also write each chapter's narration text next to its audio.
    pub fn with_text_output(mut self, write_text: bool) -> Self {
        self.write_text = write_text;
        self
    }

    fn output_path(&self, index: usize, title: &str, extension: &str) -> PathBuf {
        self.output_dir.join(output_file_name(index, title, extension))
    }

    /// Split, synthesize and assemble one chapter.
    pub async fn process_chapter(
        &self,
        index: usize,
        chapter: &Chapter,
    ) -> Result<PathBuf, ChapterError> {
        let chunks = self.splitter.chunks(&chapter.text);
        log::info!(
            "Chapter {} \"{}\": {} chunk(s)",
            index,
            chapter.title,
            chunks.len()
        );

        if self.write_text {
            let text_path = self.output_path(index, &chapter.title, "txt");
            tokio::fs::write(&text_path, &chapter.text).await?;
        }

        let buffers = self
            .orchestrator
            .synthesize_chapter(index, &chapter.title, &chunks)
            .await?;

        let extension = self.assembler.output_format().extension();
        let path = self.output_path(index, &chapter.title, extension);
        let tags = AudioTags {
            chapter_index: index,
            total_chapters: self.total_chapters.max(index),
            chapter_title: chapter.title.clone(),
            book_title: self.book_title.clone(),
            author: self.author.clone(),
        };

        let assembler = self.assembler.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || assembler.assemble(buffers, &target, &tags))
            .await
            .map_err(|e| ChapterError::Worker(e.to_string()))??;

        log::info!("Wrote {}", path.display());
        Ok(path)
    }

    /// Process chapters on up to `worker_count` concurrent workers.
    ///
    /// A failed chapter never affects the others. The report lists
    /// outcomes in the order the chapters were given, whatever order they
    /// finished in.
    pub async fn run(self: Arc<Self>, chapters: Vec<NumberedChapter>, worker_count: usize) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(worker_count.max(1)));
        let mut handles = Vec::with_capacity(chapters.len());

        for numbered in chapters {
            let pipeline = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let index = numbered.index;
            let title = numbered.chapter.title.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ChapterError::Worker(e.to_string()))?;
                pipeline
                    .process_chapter(numbered.index, &numbered.chapter)
                    .await
            });
            handles.push((index, title, handle));
        }

        let mut report = RunReport::default();
        for (index, title, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ChapterError::Worker(e.to_string())),
            };
            if let Err(e) = &result {
                log::error!("Chapter {} \"{}\" failed: {}", index, title, e);
            }
            report.outcomes.push(ChapterOutcome {
                index,
                title,
                result,
            });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioCodec, WavCodec};
    use crate::synthesis::RetryPolicy;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tts_client::{AudioEncoding, AudioFormat, MockBackend, SynthesisBackend, TtsError};

    fn chapter(title: &str, text: &str) -> Chapter {
        Chapter {
            title: title.to_string(),
            text: text.to_string(),
        }
    }

    fn numbered(chapters: &[(usize, &str, &str)]) -> Vec<NumberedChapter> {
        chapters
            .iter()
            .map(|&(index, title, text)| NumberedChapter {
                index,
                chapter: chapter(title, text),
            })
            .collect()
    }

    fn pipeline(backend: Arc<MockBackend>, dir: &Path, max_chars: usize) -> ChapterPipeline {
        let orchestrator =
            SynthesisOrchestrator::new(backend, RetryPolicy::new(2, Duration::ZERO));
        let assembler = AudioAssembler::new(Arc::new(WavCodec), AudioFormat::Wav);
        ChapterPipeline::new(
            orchestrator,
            ChunkSplitter::new(max_chars, " @BRK#"),
            assembler,
            dir,
        )
        .with_book("Book", "Author", 3)
    }

    fn decoded_text(path: &Path) -> String {
        let bytes = fs::read(path).unwrap();
        let samples = WavCodec
            .decode(&bytes, AudioEncoding::Container(AudioFormat::Wav))
            .unwrap();
        let raw: Vec<u8> = samples.data.iter().flat_map(|s| s.to_le_bytes()).collect();
        String::from_utf8(raw).unwrap().trim_end_matches(' ').to_string()
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name(7, "Chapter_Seven", "mp3"), "0007_Chapter_Seven.mp3");
        assert_eq!(output_file_name(12345, "X", "wav"), "12345_X.wav");
    }

    #[tokio::test]
    async fn test_chapter_audio_keeps_chunk_order() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::always_succeeds().with_latency(10));
        let pipeline = pipeline(backend.clone(), dir.path(), 12);

        let path = pipeline
            .process_chapter(1, &chapter("Intro", "alpha beta gamma delta epsilon zeta"))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("0001_Intro.wav"));
        assert!(backend.call_count() > 1);
        // odd-length chunks carry one pad space
        let calls = backend.calls();
        let expected: String = calls
            .iter()
            .map(|c| String::from_utf8(MockBackend::audio_for(c)).unwrap())
            .collect();
        assert_eq!(decoded_text(&path), expected.trim_end_matches(' '));
    }

    #[tokio::test]
    async fn test_backend_limits_shape_chunks() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(
            MockBackend::always_succeeds()
                .with_max_chars(16)
                .with_break_marker(" <pause>"),
        );
        let splitter =
            ChunkSplitter::for_language(backend.max_chunk_chars(), backend.break_marker(), "en-US");
        let orchestrator =
            SynthesisOrchestrator::new(backend.clone(), RetryPolicy::new(1, Duration::ZERO));
        let pipeline = ChapterPipeline::new(
            orchestrator,
            splitter,
            AudioAssembler::new(Arc::new(WavCodec), AudioFormat::Wav),
            dir.path(),
        );

        pipeline
            .process_chapter(1, &chapter("Breaks", "First part. <pause> Second part here"))
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec!["First part.", "<pause> Second", "part here"]
        );
    }

    #[tokio::test]
    async fn test_failed_chapter_is_isolated() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::fails_when_contains(
            "poison",
            TtsError::Network("down".into()),
        ));
        let pipeline = Arc::new(pipeline(backend, dir.path(), 100));

        let report = pipeline
            .run(
                numbered(&[
                    (1, "One", "first chapter"),
                    (2, "Two", "a poison chapter"),
                    (3, "Three", "third chapter"),
                ]),
                3,
            )
            .await;

        let indices: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(!report.is_success());

        let failed: Vec<&str> = report.failed().map(|o| o.title.as_str()).collect();
        assert_eq!(failed, vec!["Two"]);
        assert_eq!(report.succeeded().count(), 2);

        assert!(dir.path().join("0001_One.wav").exists());
        assert!(dir.path().join("0003_Three.wav").exists());
        assert!(!dir.path().join("0002_Two.wav").exists());
        // no partial files either
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_numbering_follows_document_position() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::always_succeeds().with_latency(20));
        let pipeline = Arc::new(pipeline(backend, dir.path(), 100));

        let report = pipeline
            .run(
                numbered(&[(4, "Four", "fourth"), (5, "Five", "fifth"), (6, "Six", "sixth")]),
                2,
            )
            .await;

        assert!(report.is_success());
        for (index, title, text) in [(4, "Four", "fourth"), (5, "Five", "fifth"), (6, "Six", "sixth")] {
            let path = dir.path().join(output_file_name(index, title, "wav"));
            assert_eq!(decoded_text(&path), text);
        }
    }

    #[tokio::test]
    async fn test_single_worker_runs_sequentially() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::always_succeeds());
        let pipeline = Arc::new(pipeline(backend.clone(), dir.path(), 100));

        let report = pipeline
            .run(numbered(&[(1, "A", "aaaa"), (2, "B", "bbbb")]), 1)
            .await;

        assert!(report.is_success());
        assert_eq!(backend.calls(), vec!["aaaa", "bbbb"]);
    }

    #[tokio::test]
    async fn test_text_output_written_beside_audio() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::always_succeeds());
        let pipeline = pipeline(backend, dir.path(), 100).with_text_output(true);

        pipeline
            .process_chapter(2, &chapter("Notes", "spoken words"))
            .await
            .unwrap();

        let text = fs::read_to_string(dir.path().join("0002_Notes.txt")).unwrap();
        assert_eq!(text, "spoken words");
    }

    #[tokio::test]
    async fn test_missing_output_dir_fails_chapter() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let backend = Arc::new(MockBackend::always_succeeds());
        let pipeline = pipeline(backend, &missing, 100);

        let result = pipeline.process_chapter(1, &chapter("A", "text")).await;
        assert!(matches!(result, Err(ChapterError::Assembly(_))));
    }
}
