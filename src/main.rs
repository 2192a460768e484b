//! HumanSign CLI
//!
//! Package, simulate and verify `.humansign` archives.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use humansign::{
    archive::ARCHIVE_EXTENSION,
    capture::{CaptureSession, KeyInput, ManualClock},
    config::Config,
    service::ArchiveService,
    signature::compute_sha256_bytes,
    AnalysisResult, BiometricMetadata, TRUST_DECLARATION, VERSION,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "humansign")]
#[command(author = "HumanSign")]
#[command(version = VERSION)]
#[command(about = "Keystroke-timing authorship notarization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a .humansign archive
    Verify {
        /// Archive to verify
        file: PathBuf,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Package a text and its keystroke metadata into an archive
    Pack {
        /// File holding the final text
        #[arg(long)]
        text: PathBuf,

        /// File holding the metadata JSON
        #[arg(long)]
        metadata: PathBuf,

        /// Output path (defaults to the export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print the content hash of a text file
    Hash {
        file: PathBuf,
    },

    /// Type a text through a capture session with a synthetic cadence and package it
    Simulate {
        /// Text to type
        #[arg(long)]
        text: String,

        /// Output path (defaults to the export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Display the trust-model declaration
    Trust,

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("humansign=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { file, json } => cmd_verify(&file, json).await,
        Commands::Pack {
            text,
            metadata,
            output,
        } => cmd_pack(&text, &metadata, output).await,
        Commands::Hash { file } => cmd_hash(&file).await,
        Commands::Simulate { text, output } => cmd_simulate(&text, output).await,
        Commands::Trust => {
            println!("{TRUST_DECLARATION}");
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    }
}

async fn cmd_verify(file: &Path, json: bool) -> Result<()> {
    let service = ArchiveService::new(load_config());

    let result = match service.analyze_file(file).await {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!("analysis failed: {e}");
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_analysis(&result);
    }
    Ok(())
}

async fn cmd_pack(text: &Path, metadata: &Path, output: Option<PathBuf>) -> Result<()> {
    let text = tokio::fs::read_to_string(text)
        .await
        .with_context(|| format!("reading {}", text.display()))?;
    let metadata_json = tokio::fs::read_to_string(metadata)
        .await
        .with_context(|| format!("reading {}", metadata.display()))?;
    let metadata: BiometricMetadata =
        serde_json::from_str(&metadata_json).context("parsing metadata JSON")?;

    let path = write_archive(text, metadata, output).await?;
    println!("Archive written to {}", path.display());
    Ok(())
}

async fn cmd_hash(file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    println!("{}  {}", compute_sha256_bytes(&bytes), file.display());
    Ok(())
}

async fn cmd_simulate(text: &str, output: Option<PathBuf>) -> Result<()> {
    let chars: Vec<char> = text.chars().collect();
    // Start far enough back that no event lands in the future.
    let budget_ms = chars.len() as i64 * 300;
    let clock = ManualClock::starting_at(Utc::now().timestamp_millis() - budget_ms);

    let mut session = CaptureSession::with_clock(Box::new(clock.clone()));
    session.start();
    let mut typed = String::new();
    for (i, &c) in chars.iter().enumerate() {
        let input = if c == '\n' {
            KeyInput::new("Enter", "Enter")
        } else {
            KeyInput::from_char(c)
        };
        session.handle_key_down(input.clone());
        clock.advance(35.0 + (i % 4) as f64 * 10.0);
        session.handle_key_up(input);
        typed.push(c);
        session.set_text(typed.clone());
        clock.advance(synthetic_gap_ms(i, c));
    }
    session.stop();

    let stats = session.live_stats();
    println!("Simulated {} keystrokes", chars.len());
    println!("  Words per minute: {:.1}", stats.words_per_minute);
    println!("  Rhythm variance: {:.1}", stats.rhythm_variance);
    println!("  Thinking pauses: {}", stats.thinking_pauses);
    println!("  Human confidence: {:.0}", stats.human_confidence);

    let path = write_archive(text.to_string(), session.finalize_metadata(), output).await?;
    println!("Archive written to {}", path.display());
    Ok(())
}

/// Gap after a keystroke: irregular, with longer pauses after sentences.
fn synthetic_gap_ms(index: usize, c: char) -> f64 {
    let base = 55.0 + ((c as u32 as usize * 37 + index * 53) % 160) as f64;
    match c {
        '.' | '!' | '?' => base + 1100.0,
        ' ' => base + 40.0,
        _ => base,
    }
}

async fn write_archive(
    text: String,
    metadata: BiometricMetadata,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let mut config = load_config();
    let target = match output {
        Some(path) => {
            // Write next to the target so the final rename stays on one filesystem.
            config.export_path = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            Some(path.with_extension(ARCHIVE_EXTENSION))
        }
        None => None,
    };

    let service = ArchiveService::new(config);
    let written = service
        .download_archive(text, metadata)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {e}", e.user_message()))?;

    match target {
        Some(target) => {
            tokio::fs::rename(&written, &target)
                .await
                .with_context(|| format!("moving archive to {}", target.display()))?;
            Ok(target)
        }
        None => Ok(written),
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config, using defaults: {e}");
            Config::default()
        }
    }
}

fn print_analysis(result: &AnalysisResult) {
    println!("HumanSign Verification");
    println!("======================");
    println!();
    println!("Session: {}", result.session_id);
    println!("Verdict: {}", result.verdict);
    println!("Human score: {:.0}/100", result.human_score);
    println!(
        "Integrity: {}",
        if result.is_valid { "valid ✓" } else { "INVALID ✗" }
    );
    println!(
        "Tampering: {}",
        if result.is_tampered {
            "detected ✗"
        } else {
            "none detected ✓"
        }
    );
    println!();
    println!(
        "Behavioral score: {:.0} ({})",
        result.behavioral.score, result.behavioral.verdict
    );
    println!(
        "AI likelihood: {:.0}% (confidence {:.0})",
        result.ai.ai_probability, result.ai.confidence
    );

    if !result.anomalies.is_empty() {
        println!();
        println!("Anomalies:");
        for anomaly in &result.anomalies {
            println!("  - {anomaly}");
        }
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
