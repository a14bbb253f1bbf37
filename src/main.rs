use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use watson_stt::core::media_type::media_type_from_path;
use watson_stt::utils::tls::install_crypto_provider;
use watson_stt::{
    ClientConfig, ReaderAudioSource, RecognizeCallback, RecognizeOptions, SpeechRecognitionResults,
    SpeechToText, SpeechToTextError,
};

/// Watson Speech-to-Text command line client
#[derive(Parser, Debug)]
#[command(name = "watson-stt")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available recognition models
    Models,

    /// Stream an audio file over the WebSocket interface and print transcripts
    Recognize {
        /// Audio file to transcribe
        file: PathBuf,

        /// Audio content type (guessed from the file extension if omitted)
        #[arg(long = "content-type")]
        content_type: Option<String>,

        /// Recognition model
        #[arg(short = 'm', long = "model")]
        model: Option<String>,

        /// Print interim results as they arrive
        #[arg(long = "interim")]
        interim: bool,
    },

    /// Transcribe an audio file with a single HTTP request
    Batch {
        /// Audio file to transcribe
        file: PathBuf,

        /// Audio content type (guessed from the file extension if omitted)
        #[arg(long = "content-type")]
        content_type: Option<String>,

        /// Recognition model
        #[arg(short = 'm', long = "model")]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Must run before any TLS connection is attempted
    install_crypto_provider();

    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        info!("Loading configuration from {}", config_path.display());
        ClientConfig::from_file(config_path)?
    } else {
        ClientConfig::from_env()?
    };
    let service = SpeechToText::new(config)?;

    match cli.command {
        Commands::Models => list_models(&service).await,
        Commands::Recognize {
            file,
            content_type,
            model,
            interim,
        } => {
            let options = RecognizeOptions {
                model,
                interim_results: interim.then_some(true),
                ..RecognizeOptions::new(resolve_content_type(&file, content_type)?)
            };
            stream_file(&service, &file, options).await
        }
        Commands::Batch {
            file,
            content_type,
            model,
        } => {
            let options = RecognizeOptions {
                model,
                ..RecognizeOptions::new(resolve_content_type(&file, content_type)?)
            };
            batch_file(&service, &file, options).await
        }
    }
}

fn resolve_content_type(file: &Path, content_type: Option<String>) -> anyhow::Result<String> {
    match content_type.or_else(|| media_type_from_path(file).map(str::to_string)) {
        Some(content_type) => Ok(content_type),
        None => bail!(
            "Cannot guess the audio format of {}; pass --content-type",
            file.display()
        ),
    }
}

async fn list_models(service: &SpeechToText) -> anyhow::Result<()> {
    let models = service.list_models().await?;
    for model in models.models {
        println!("{:<32} {:<8} {:>6} Hz  {}", model.name, model.language, model.rate, model.description);
    }
    Ok(())
}

async fn batch_file(
    service: &SpeechToText,
    file: &Path,
    options: RecognizeOptions,
) -> anyhow::Result<()> {
    let audio = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let results = service.recognize(audio, &options).await?;
    for result in &results.results {
        if let Some(alternative) = result.alternatives.first() {
            println!("{}", alternative.transcript.trim());
        }
    }
    Ok(())
}

async fn stream_file(
    service: &SpeechToText,
    file: &Path,
    options: RecognizeOptions,
) -> anyhow::Result<()> {
    let source = ReaderAudioSource::open(file).await?;
    let printer = Arc::new(TranscriptPrinter::default());
    let session = service.recognize_using_websocket(source, options, printer.clone())?;

    tokio::select! {
        _ = session.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, closing session");
            session.cancel();
            session.wait().await;
        }
    }

    if printer.failed.load(Ordering::Acquire) {
        bail!("Recognition failed");
    }
    Ok(())
}

/// Prints final transcripts to stdout and interim ones to stderr.
#[derive(Default)]
struct TranscriptPrinter {
    failed: AtomicBool,
}

#[async_trait]
impl RecognizeCallback for TranscriptPrinter {
    async fn on_transcription(&self, results: SpeechRecognitionResults) {
        let Some(transcript) = results.best_transcript() else {
            return;
        };
        if results.is_final() {
            println!("{transcript}");
        } else {
            eprint!("\r{transcript}");
        }
    }

    async fn on_error(&self, error: SpeechToTextError) {
        eprintln!("error: {error}");
        if error.is_fatal() {
            self.failed.store(true, Ordering::Release);
        }
    }

    async fn on_inactivity_timeout(&self, error: SpeechToTextError) {
        eprintln!("session timed out: {error}");
    }
}
