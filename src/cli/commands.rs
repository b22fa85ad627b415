//! CLI commands implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::config::Credentials;
use crate::llm::LlmConfig;
use crate::pipeline::{FlashcardPipeline, PipelineEvent, RecognitionPolicy};
use crate::recognition::{MathRecognizer, MathpixClient, RecognitionConfig};

#[derive(Parser)]
#[command(name = "mathdeck")]
#[command(about = "Math flashcard generation from photos via OCR and LLM")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Generate flashcards from one or more images of math content
    Generate {
        /// Image files, in the order they should be read
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Instructions for the card generator
        #[arg(short, long, default_value = "")]
        instructions: String,
        /// Steering between intuitive (0.0) and exam-level rigorous (1.0)
        #[arg(short, long, default_value = "0.5")]
        rigor: f64,
        /// Approximate number of cards to aim for
        #[arg(short = 'n', long)]
        count: Option<u32>,
        /// Write the resulting JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Recognize up to this many images concurrently (default: one at a time)
        #[arg(long)]
        parallel: Option<usize>,
    },

    /// Recognize math content in a single image and print the LaTeX
    Recognize {
        /// Image file
        image: PathBuf,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            images,
            instructions,
            rigor,
            count,
            output,
            parallel,
        } => generate(images, instructions, rigor, count, output, parallel).await,
        Commands::Recognize { image } => recognize(image).await,
    }
}

fn load_credentials() -> anyhow::Result<Credentials> {
    let credentials = Credentials::from_env();
    let missing = credentials.missing_fields();
    if !missing.is_empty() {
        eprintln!(
            "{} missing credentials: {}",
            style("error:").red().bold(),
            missing.join(", ")
        );
        eprintln!("Set MATHPIX_APP_ID, MATHPIX_APP_KEY, and GROQ_API_KEY (or put them in .env).");
        anyhow::bail!("missing credentials");
    }
    Ok(credentials)
}

fn load_image(path: &PathBuf) -> anyhow::Result<DynamicImage> {
    image::open(path).with_context(|| format!("Failed to open image {}", path.display()))
}

async fn generate(
    image_paths: Vec<PathBuf>,
    instructions: String,
    rigor: f64,
    count: Option<u32>,
    output: Option<PathBuf>,
    parallel: Option<usize>,
) -> anyhow::Result<()> {
    let credentials = load_credentials()?;

    let images = image_paths
        .iter()
        .map(load_image)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let policy = match parallel {
        Some(limit) if limit > 1 => RecognitionPolicy::Bounded(limit),
        _ => RecognitionPolicy::Sequential,
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = FlashcardPipeline::from_credentials(
        RecognitionConfig::default(),
        LlmConfig::default().with_env_overrides(),
        credentials,
    )?
    .with_policy(policy)
    .with_events(tx);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("valid progress template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::RecognitionStarted { total } => {
                    spinner.set_message(format!("Recognizing {total} image(s)..."));
                }
                PipelineEvent::ImageRecognized { index, total } => {
                    spinner.set_message(format!("Recognized image {index}/{total}"));
                }
                PipelineEvent::Generating => {
                    spinner.set_message("Generating flashcards...");
                }
                PipelineEvent::Extracting => {
                    spinner.set_message("Parsing response...");
                }
                PipelineEvent::Complete { .. } => {}
            }
        }
        spinner.finish_and_clear();
    });

    let instructions = if instructions.trim().is_empty() {
        // The pipeline rejects empty instructions; the CLI substitutes a
        // generic default instead of failing.
        crate::llm::DEFAULT_INSTRUCTIONS.to_string()
    } else {
        instructions
    };

    let result = pipeline.run(&images, &instructions, rigor, count).await;
    drop(pipeline); // closes the event channel so the spinner task exits
    let _ = progress.await;

    let drafts = result?;
    let json = serde_json::to_string_pretty(&drafts)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} {} flashcard(s) written to {}",
                style("Generated").green().bold(),
                drafts.len(),
                path.display()
            );
        }
        None => {
            println!("{json}");
            eprintln!(
                "{} {} flashcard(s)",
                style("Generated").green().bold(),
                drafts.len()
            );
        }
    }

    Ok(())
}

async fn recognize(image_path: PathBuf) -> anyhow::Result<()> {
    // Only the recognition provider is involved here.
    let credentials = Credentials::from_env();
    if credentials.mathpix_app_id.trim().is_empty() || credentials.mathpix_app_key.trim().is_empty()
    {
        eprintln!(
            "{} missing credentials: set MATHPIX_APP_ID and MATHPIX_APP_KEY (or put them in .env).",
            style("error:").red().bold()
        );
        anyhow::bail!("missing credentials");
    }
    let image = load_image(&image_path)?;

    let client = MathpixClient::new(RecognitionConfig::default(), credentials);
    let result = client.recognize(&image).await?;

    println!("{}", result.best_content());
    if let Some(confidence) = result.confidence {
        eprintln!("{} {:.1}%", style("Confidence:").dim(), confidence * 100.0);
    }

    Ok(())
}
