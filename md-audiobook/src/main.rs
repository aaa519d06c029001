//! md-audio - Convert Markdown and EPUB books to per-chapter audio files

mod audio;
mod config;
mod document;
mod error;
mod pipeline;
mod synthesis;
mod text;

use anyhow::{Context, Result};
use audio::AudioAssembler;
use clap::{Parser, Subcommand};
use config::AudiobookConfig;
use document::{Chapter, TitleMode};
use pipeline::{ChapterPipeline, NumberedChapter, ProgressObserver, RunReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use synthesis::{RetryPolicy, SynthesisOrchestrator};
use text::{ChunkSplitter, NewlineMode, ReplaceRules, TextCleanup};
use tts_client::{BackendKind, ProviderConfig, SynthesisBackend, create_backend};

#[derive(Parser, Debug)]
#[command(name = "md-audio")]
#[command(about = "Convert Markdown and EPUB books to per-chapter audio files", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the .md, .markdown or .epub file
    input: Option<PathBuf>,

    /// Directory for the chapter files
    output_dir: Option<PathBuf>,

    /// TTS provider (openai, piper)
    #[arg(long)]
    provider: Option<String>,

    /// Voice name (OpenAI) or model file (Piper)
    #[arg(long)]
    voice: Option<String>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Container of the chapter files (mp3, wav, flac, ...)
    #[arg(long)]
    output_format: Option<String>,

    /// Language of the text, e.g. en-US or ja-JP
    #[arg(long)]
    language: Option<String>,

    /// Speaking rate multiplier
    #[arg(long)]
    speed: Option<f32>,

    /// Style instructions for providers that accept them
    #[arg(long)]
    instructions: Option<String>,

    /// How line breaks become paragraph breaks (single, double, none)
    #[arg(long)]
    newline_mode: Option<String>,

    /// Where EPUB chapter titles come from (auto, tag_text, first_few)
    #[arg(long)]
    title_mode: Option<String>,

    /// Paragraph break marker passed through to the provider
    #[arg(long)]
    break_marker: Option<String>,

    /// Strip endnote numbers attached to words
    #[arg(long)]
    remove_endnotes: bool,

    /// Strip bracketed reference numbers like [3]
    #[arg(long)]
    remove_reference_numbers: bool,

    /// File of pattern==replacement lines applied to chapter text
    #[arg(long)]
    search_and_replace_file: Option<PathBuf>,

    /// Chapters synthesized in parallel
    #[arg(long)]
    worker_count: Option<usize>,

    /// Chapter range to process, 1-based and inclusive (e.g. "3-7")
    #[arg(long)]
    chapters: Option<String>,

    /// List chapters and chunk counts without synthesizing
    #[arg(long)]
    preview: bool,

    /// Also write each chapter's text as a .txt file
    #[arg(long)]
    output_text: bool,

    /// Concatenate mp3/aac chunks without re-encoding
    #[arg(long)]
    direct_merge: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default provider
    SetProvider {
        /// Provider name (openai, piper)
        name: String,
    },
    /// Set default voice
    SetVoice {
        /// Voice name or model file
        voice: String,
    },
    /// Set default number of parallel chapter workers
    SetWorkers {
        /// Worker count (at least 1)
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action);
    }

    let input = args
        .input
        .clone()
        .context("Input file is required. Run 'md-audio --help' for usage.")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let mut config = AudiobookConfig::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);

    // Everything that can be wrong with the setup fails here, before any
    // chapter is dispatched.
    let backend = build_backend(&config)?;
    let newline_mode: NewlineMode = config.newline_mode.parse()?;
    let title_mode: TitleMode = config.title_mode.parse()?;
    let replacements = match &config.search_and_replace_file {
        Some(path) => ReplaceRules::load(path)?,
        None => ReplaceRules::default(),
    };
    let break_marker = backend.break_marker().to_string();
    let cleanup = TextCleanup {
        newline_mode,
        break_marker: break_marker.clone(),
        remove_endnotes: config.remove_endnotes,
        remove_reference_numbers: config.remove_reference_numbers,
        replacements,
    };

    log::info!(
        "Provider: {}, output: {}, newline mode: {}",
        backend.name(),
        backend.output_format(),
        cleanup.newline_mode
    );

    let document = document::parse_document(&input, &cleanup, title_mode)
        .with_context(|| format!("Failed to parse {}", input.display()))?;
    if document.chapters.is_empty() {
        anyhow::bail!("No chapters found in {}", input.display());
    }

    let total_chapters = document.chapters.len();
    let (start, end) = parse_chapter_range(args.chapters.as_deref(), total_chapters)?;
    let selected = select_chapters(&document.chapters, start, end);

    let splitter = ChunkSplitter::for_language(
        backend.max_chunk_chars(),
        &break_marker,
        &config.voice.language,
    );

    eprintln!(
        "Book: \"{}\" by {}, {} chapter(s), processing {}-{}",
        document.title, document.author, total_chapters, start, end
    );

    if args.preview {
        print_preview(&selected, &splitter);
        return Ok(());
    }

    let output_dir = args
        .output_dir
        .clone()
        .context("Output directory is required")?;
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let output_format = backend.output_format();
    let codec = audio::codec_for(output_format)
        .with_context(|| format!("Cannot produce {} output", output_format))?;

    let total_chunks: usize = selected
        .iter()
        .map(|c| splitter.chunks(&c.chapter.text).len())
        .sum();
    let progress = Arc::new(ProgressObserver::new(total_chunks as u64));

    let policy = RetryPolicy::new(config.max_attempts, Duration::from_secs(config.backoff_secs));
    let orchestrator = SynthesisOrchestrator::new(backend, policy).with_observer(progress.clone());
    let assembler =
        AudioAssembler::new(codec, output_format).with_direct_merge(config.direct_merge);

    let pipeline = Arc::new(
        ChapterPipeline::new(orchestrator, splitter, assembler, &output_dir)
            .with_book(&document.title, &document.author, total_chapters)
            .with_text_output(args.output_text),
    );

    let report = pipeline.run(selected, config.worker_count).await;
    progress.finish(format!("{} chapter(s) done", report.succeeded().count()));

    print_report(&report);
    let failed = report.failed().count();
    if failed > 0 {
        anyhow::bail!("{} of {} chapter(s) failed", failed, report.outcomes.len());
    }
    Ok(())
}

/// Command-line values win over the config file for this run.
fn apply_overrides(config: &mut AudiobookConfig, args: &Args) {
    if let Some(provider) = &args.provider {
        config.provider = provider.clone();
    }
    if let Some(voice) = &args.voice {
        config.voice.voice = Some(voice.clone());
    }
    if let Some(model) = &args.model {
        config.voice.model = Some(model.clone());
    }
    if let Some(format) = &args.output_format {
        config.voice.output_format = Some(format.clone());
    }
    if let Some(language) = &args.language {
        config.voice.language = language.clone();
    }
    if let Some(speed) = args.speed {
        config.voice.speed = speed;
    }
    if let Some(instructions) = &args.instructions {
        config.voice.instructions = Some(instructions.clone());
    }
    if let Some(mode) = &args.newline_mode {
        config.newline_mode = mode.clone();
    }
    if let Some(mode) = &args.title_mode {
        config.title_mode = mode.clone();
    }
    if let Some(marker) = &args.break_marker {
        config.break_marker = Some(marker.clone());
    }
    if let Some(path) = &args.search_and_replace_file {
        config.search_and_replace_file = Some(path.clone());
    }
    if let Some(count) = args.worker_count {
        config.worker_count = count;
    }
    config.remove_endnotes |= args.remove_endnotes;
    config.remove_reference_numbers |= args.remove_reference_numbers;
    config.direct_merge |= args.direct_merge;
}

fn build_backend(config: &AudiobookConfig) -> Result<Arc<dyn SynthesisBackend>> {
    let kind: BackendKind = config.provider.parse()?;

    let mut provider_config: ProviderConfig = config
        .provider_config(kind.config_key())
        .cloned()
        .unwrap_or_default();
    if let Some(marker) = &config.break_marker {
        provider_config.break_marker = Some(marker.clone());
    }

    let backend = create_backend(kind, &config.voice, Some(&provider_config))
        .with_context(|| format!("Failed to set up provider {}", kind.config_key()))?;
    Ok(Arc::from(backend))
}

/// Parse a 1-based inclusive `START-END` range (or a single chapter number)
/// into a 1-based inclusive range clamped to `total`.
fn parse_chapter_range(range: Option<&str>, total: usize) -> Result<(usize, usize)> {
    let Some(range) = range else {
        return Ok((1, total));
    };

    let (start, end) = match range.split_once('-') {
        Some((start, end)) => (
            start.trim().parse::<usize>().context("Invalid start chapter")?,
            end.trim().parse::<usize>().context("Invalid end chapter")?,
        ),
        None => {
            let chapter = range.trim().parse::<usize>().context("Invalid chapter number")?;
            (chapter, chapter)
        }
    };

    if start == 0 || start > end {
        anyhow::bail!("Invalid chapter range '{}'. Use 'start-end' (e.g. '1-10')", range);
    }
    if start > total {
        anyhow::bail!("Chapter range '{}' is past the last chapter ({})", range, total);
    }
    Ok((start, end.min(total)))
}

/// Chapters `start..=end`, keeping their position in the whole document.
fn select_chapters(chapters: &[Chapter], start: usize, end: usize) -> Vec<NumberedChapter> {
    chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| (i + 1, chapter))
        .filter(|(index, _)| (start..=end).contains(index))
        .map(|(index, chapter)| NumberedChapter {
            index,
            chapter: chapter.clone(),
        })
        .collect()
}

fn print_preview(chapters: &[NumberedChapter], splitter: &ChunkSplitter) {
    println!("{:>5}  {:<40} {:>8} {:>7}", "#", "Title", "Chars", "Chunks");
    for numbered in chapters {
        let text = &numbered.chapter.text;
        println!(
            "{:>5}  {:<40} {:>8} {:>7}",
            numbered.index,
            numbered.chapter.title,
            text.chars().count(),
            splitter.chunks(text).len()
        );
    }
}

fn print_report(report: &RunReport) {
    eprintln!();
    eprintln!(
        "Finished: {} succeeded, {} failed",
        report.succeeded().count(),
        report.failed().count()
    );
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(path) => eprintln!("  ok     {:04} {}", outcome.index, path.display()),
            Err(e) => eprintln!("  FAILED {:04} {}: {}", outcome.index, outcome.title, e),
        }
    }
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = AudiobookConfig::load()?;
            println!("Configuration file: {:?}", AudiobookConfig::config_path()?);
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::SetProvider { name } => {
            let kind: BackendKind = name.parse()?;
            let mut config = AudiobookConfig::load()?;
            config.provider = kind.config_key().to_string();
            config.save()?;
            println!("Default provider set to: {}", config.provider);
        }
        ConfigAction::SetVoice { voice } => {
            let mut config = AudiobookConfig::load()?;
            config.voice.voice = Some(voice.clone());
            config.save()?;
            println!("Default voice set to: {}", voice);
        }
        ConfigAction::SetWorkers { count } => {
            let mut config = AudiobookConfig::load()?;
            config.worker_count = (*count).max(1);
            config.save()?;
            println!("Default worker count set to: {}", config.worker_count);
        }
    }
    Ok(())
}
