use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use krag_core::bootstrap::AppBuilder;
use krag_core::{Engine, IndexStatus};
use krag_index::IndexOutcome;
use krag_llm::ollama::OllamaProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[derive(Parser, Debug)]
#[command(
    name = "krag",
    version,
    about = "Ask questions about a legacy codebase with a local RAG pipeline"
)]
struct Cli {
    /// Config file (defaults to `KRAG_CONFIG` or config/default.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index the source and docs directories
    Index {
        /// Rebuild even if the index is already populated
        #[arg(short, long)]
        force: bool,
    },
    /// Drop every indexed chunk
    Clear,
    /// Answer a question from the indexed code
    Ask {
        question: String,
        /// Generate with this model instead of the configured one
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Show index, model and watcher statistics as JSON
    Stats,
    /// List supported models and whether they are installed
    Models,
    /// Check that a model works against the current index
    Switch { model: String },
    /// Download a model onto the Ollama host
    Pull { model: String },
    /// Delete a model from the Ollama host
    Remove { model: String },
    /// Index, then re-index whenever the source tree changes (Ctrl-C to stop)
    Watch {
        /// Source directory to index and watch instead of the configured one
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Installed before loading so config warnings are not lost.
    let filter = init_subscriber();
    let builder = AppBuilder::load(cli.config.as_deref())?;
    apply_debug(
        &filter,
        builder.config().logging.debug,
        std::env::var_os(EnvFilter::DEFAULT_ENV).is_some(),
    );

    let engine = builder.build_engine().await?;
    let result = run(&engine, cli.command).await;
    engine.shutdown().await;
    result
}

fn init_subscriber() -> FilterHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}

/// Switch to debug output when the config asks for it. `RUST_LOG` wins.
fn apply_debug(filter: &FilterHandle, debug: bool, env_filter_set: bool) {
    if !debug || env_filter_set {
        return;
    }
    if let Err(e) = filter.reload(EnvFilter::new("debug")) {
        tracing::warn!("failed to raise log level: {e}");
    }
}

async fn run(engine: &Engine<OllamaProvider>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Index { force } => print_outcome(&engine.index_documents(force).await?),
        Command::Clear => {
            engine.clear_index().await?;
            println!("Index cleared");
        }
        Command::Ask { question, model } => {
            if let Some(model) = model {
                engine.change_model(&model).await?;
            }
            let response = engine.query(&question).await;
            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!("\nSources:");
                for source in &response.sources {
                    println!("  {source}");
                }
            }
            println!("\n({:.2}s)", response.response_time);
        }
        Command::Stats => {
            let stats = engine.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            if stats.status == IndexStatus::Unreachable {
                bail!("vector index unreachable");
            }
        }
        Command::Models => {
            let models = engine.available_models().await;
            if let Some(err) = &models.error {
                eprintln!("Could not reach the model host: {err}");
            }
            let current = engine.current_model().await;
            for model in &models.available {
                let marker = if *model == current { "*" } else { " " };
                let info = engine.model_info(model);
                let disk = engine.model_disk_usage(model).await;
                println!(
                    "{marker} {model:<18} {:<6} {:<8} {:<10} {disk}",
                    info.params, info.ram_usage, info.speed
                );
            }
            for model in &models.not_available {
                println!("  {model:<18} (not installed)");
            }
            println!("{} model(s) installed on the host", models.total_installed);
        }
        Command::Switch { model } => {
            engine.change_model(&model).await?;
            println!("Model {model} is usable with the current index");
        }
        Command::Pull { model } => {
            engine.pull_model(&model).await?;
            println!("Model {model} pulled");
        }
        Command::Remove { model } => {
            engine.remove_model(&model).await?;
            println!("Model {model} removed");
        }
        Command::Watch { path } => {
            if let Some(path) = path {
                engine.set_source_path(&path).await?;
            }
            print_outcome(&engine.index_documents(false).await?);
            engine.start_auto_reindex(None).await?;
            println!(
                "Watching {} (Ctrl-C to stop)",
                engine.current_source_path().await.display()
            );
            tokio::signal::ctrl_c().await?;
            if let Some(stats) = engine.stop_auto_reindex().await {
                println!(
                    "{} change(s), {} re-index(es), {} suppressed",
                    stats.events, stats.triggered, stats.suppressed
                );
            }
            let background = engine.stats().await.background;
            if background.failed + background.dropped > 0 {
                println!(
                    "{} background re-index(es) failed, {} dropped",
                    background.failed, background.dropped
                );
                if let Some(err) = background.last_error {
                    println!("  last error: {err}");
                }
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &IndexOutcome) {
    match outcome {
        IndexOutcome::AlreadyIndexed { chunks } => {
            println!("Already indexed: {chunks} chunks (use --force to rebuild)");
        }
        IndexOutcome::Rebuilt(report) => {
            println!(
                "Indexed {} chunks from {} files in {}ms",
                report.chunks_indexed, report.files_loaded, report.duration_ms
            );
            if report.batches_failed > 0 {
                println!(
                    "  {} of {} batches failed ({} chunks skipped)",
                    report.batches_failed, report.batches_total, report.chunks_failed
                );
            }
            if report.files_unreadable + report.files_oversized > 0 {
                println!(
                    "  skipped {} unreadable and {} oversized files",
                    report.files_unreadable, report.files_oversized
                );
            }
        }
    }
}
