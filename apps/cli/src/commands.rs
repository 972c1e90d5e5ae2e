//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use lexrisk_core::laws::relevant_laws;
use lexrisk_core::{AnalysisOptions, AnalysisProgress, JobPhase, JobRegistry, Orchestrator};
use lexrisk_indexing::{IndexingClient, SimilarityClient};
use lexrisk_reasoning::ReasoningClient;
use lexrisk_shared::{
    AnalysisRecord, AnalysisReport, AppConfig, Document, Identity, init_config, load_config,
};
use lexrisk_storage::Storage;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LexRisk: legal risk analysis for contracts, orders and other documents.
#[derive(Parser)]
#[command(
    name = "lexrisk",
    version,
    about = "Analyze legal documents for risks under Kazakhstan legislation.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze a UTF-8 text document.
    Analyze {
        /// Path to the document.
        file: PathBuf,

        /// User the analysis belongs to.
        #[arg(short, long, env = "LEXRISK_USER")]
        user: String,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Do not record the analysis in history.
        #[arg(long)]
        no_save: bool,
    },

    /// Show past analyses for a user.
    History {
        /// User whose history to show.
        #[arg(short, long, env = "LEXRISK_USER")]
        user: String,

        /// Print the full analysis with this id.
        #[arg(long, conflicts_with = "clear")]
        id: Option<String>,

        /// Delete the user's entire history.
        #[arg(long)]
        clear: bool,
    },

    /// Find previously indexed documents similar to a query.
    Similar {
        /// User whose documents to search.
        #[arg(short, long, env = "LEXRISK_USER")]
        user: String,

        /// Free-text query.
        query: String,
    },

    /// List reference laws.
    Laws {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lexrisk=info",
        1 => "lexrisk=debug",
        _ => "lexrisk=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            file,
            user,
            json,
            no_save,
        } => cmd_analyze(&file, &user, json, no_save).await,
        Command::History { user, id, clear } => cmd_history(&user, id.as_deref(), clear).await,
        Command::Similar { user, query } => cmd_similar(&user, &query).await,
        Command::Laws { json } => cmd_laws(json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

async fn cmd_analyze(file: &Path, user: &str, json: bool, no_save: bool) -> Result<()> {
    let config = load_config()?;
    // Fails fast on a missing API key, before the file is even read.
    let reasoner = ReasoningClient::from_config(&config.openrouter)?;

    let text = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let identity = Identity::new(user);

    let registry = Arc::new(JobRegistry::new());
    registry.set_cache(&identity, text.clone());

    let progress = Arc::new(CliProgress::new());
    let mut orchestrator = Orchestrator::new(
        Arc::new(reasoner),
        Arc::clone(&registry),
        AnalysisOptions::from(&config.analysis),
    )
    .with_progress(progress.clone());

    if config.indexing.enabled {
        orchestrator = orchestrator.with_indexer(Arc::new(IndexingClient::new(&config.indexing)?));
    }

    info!(
        user = %identity,
        filename = %filename,
        model = %config.openrouter.model,
        "starting analysis"
    );

    let job = orchestrator.spawn(identity.clone(), Document::new(filename, text.clone()));
    let wait = job.wait();
    tokio::pin!(wait);

    let outcome = tokio::select! {
        outcome = &mut wait => outcome,
        _ = tokio::signal::ctrl_c() => {
            progress.spinner.set_message("Cancelling…");
            if let Err(e) = registry.cancel_job(&identity) {
                warn!(error = %e, "no running analysis to cancel");
            }
            wait.await
        }
    };
    progress.spinner.finish_and_clear();

    let report = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !no_save {
        save_history(&config, &identity, &report, &text).await;
    }

    // Indexing runs in the background; only hold the process open for it.
    orchestrator.wait_for_indexing().await;
    Ok(())
}

/// Record a finished analysis. Failures are logged, never fatal.
async fn save_history(config: &AppConfig, identity: &Identity, report: &AnalysisReport, text: &str) {
    let record = AnalysisRecord::from_report(identity, report, text);
    match persist(config, &record).await {
        Ok(()) => info!(id = %record.id, "analysis saved to history"),
        Err(e) => warn!(error = %e, "failed to save analysis to history"),
    }
}

async fn persist(config: &AppConfig, record: &AnalysisRecord) -> lexrisk_shared::Result<()> {
    let path = config.storage.history_db_path()?;
    let storage = Storage::open(&path).await?;
    storage.save_analysis(record).await
}

fn print_report(report: &AnalysisReport) {
    println!();
    println!("  Document: {}", report.filename);
    println!("  Type:     {}", report.document_type);
    println!("  Chunks:   {}", report.chunk_count);
    println!("  Time:     {}", report.timestamp.to_rfc3339());
    println!();
    println!("{}", report.analysis);
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl AnalysisProgress for CliProgress {
    fn phase(&self, phase: &JobPhase) {
        match phase {
            // Per-chunk messages come from chunk_started.
            JobPhase::PerChunkAnalysis { .. } => {}
            JobPhase::Chunking => self.spinner.set_message("Splitting document"),
            JobPhase::Classifying => self.spinner.set_message("Classifying document"),
            other => self.spinner.set_message(other.to_string()),
        }
    }

    fn chunk_started(&self, index: usize, total: usize) {
        self.spinner
            .set_message(format!("Analyzing [{index}/{total}]"));
    }

    fn chunk_finished(&self, index: usize, total: usize) {
        if index < total {
            self.spinner
                .println(format!("  ✓ chunk {index}/{total} analyzed"));
        }
    }
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

async fn cmd_history(user: &str, id: Option<&str>, clear: bool) -> Result<()> {
    let config = load_config()?;
    let path = config.storage.history_db_path()?;
    let identity = Identity::new(user);

    if clear {
        let storage = Storage::open(&path).await?;
        let removed = storage.delete_user_history(&identity).await?;
        println!("Removed {removed} analyses for {identity}.");
        return Ok(());
    }

    if !path.exists() {
        println!("No analyses recorded yet.");
        return Ok(());
    }
    let storage = Storage::open_readonly(&path).await?;

    if let Some(id) = id {
        let record = storage
            .get_analysis(id)
            .await?
            .filter(|r| r.identity == identity)
            .ok_or_else(|| eyre!("no analysis '{id}' for user '{identity}'"))?;
        println!("# {} ({})", record.filename, record.document_type);
        println!("{}", record.created_at.to_rfc3339());
        println!();
        println!("{}", record.analysis);
        return Ok(());
    }

    let records = storage.user_history(&identity).await?;
    if records.is_empty() {
        println!("No analyses recorded for {identity}.");
        return Ok(());
    }

    for record in &records {
        println!(
            "  {}  {:<14} {}  ({} chars)  {}",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.document_type.label(),
            record.filename,
            record.content_len,
            record.id,
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// similar / laws / config
// ---------------------------------------------------------------------------

async fn cmd_similar(user: &str, query: &str) -> Result<()> {
    let config = load_config()?;
    if !config.indexing.enabled {
        return Err(eyre!("similarity search is disabled ([indexing] enabled = false)"));
    }

    let client = SimilarityClient::new(&config.indexing)?;
    let matches = client.search(&Identity::new(user), query).await?;

    if matches.is_empty() {
        println!("No similar documents found.");
        return Ok(());
    }

    for (rank, hit) in matches.iter().enumerate() {
        let filename = hit
            .metadata
            .get("filename")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        println!(
            "  {:>2}. {:.3}  {}  {}",
            rank + 1,
            hit.score,
            filename,
            hit.id.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

fn cmd_laws(json: bool) -> Result<()> {
    let laws = relevant_laws();
    if json {
        println!("{}", serde_json::to_string_pretty(&laws)?);
        return Ok(());
    }
    for law in &laws {
        println!("  {:<24} {}", law.name, law.url);
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
