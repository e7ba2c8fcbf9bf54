//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use dealscope_core::analysis::{AnalysisClient, AnalysisPrompt, parse_sections};
use dealscope_core::pipeline::{self, ProgressReporter};
use dealscope_crm::CrmClient;
use dealscope_shared::{AppConfig, load_config, require_env};
use dealscope_storage::{AnalysisType, FeedbackRecord, Store};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DealScope — turn CRM deals into model-ready context and analyses.
#[derive(Parser)]
#[command(
    name = "dealscope",
    version,
    about = "Aggregate a CRM deal's full history into one document and analyze it.",
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
    /// Run a full analysis: aggregate the deal, call the model, save the result.
    Analyze {
        /// Deal identifier in the CRM.
        deal_id: String,

        /// Analysis type id from the prompt catalog.
        #[arg(short = 't', long = "type")]
        type_id: String,
    },

    /// Build and print the deal context document without calling the model.
    Context {
        /// Deal identifier in the CRM.
        deal_id: String,

        /// Write the document to a file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Prompt catalog management.
    Types {
        #[command(subcommand)]
        action: Option<TypesAction>,
    },

    /// Record feedback on one section of a saved analysis.
    Feedback {
        /// Analysis identifier (from `analyze` or `history`).
        analysis_id: String,

        /// Section id within the analysis (e.g. section_1).
        section_id: String,

        /// Thumbs rating: up or down.
        #[arg(long)]
        rating: String,

        /// Optional explanation.
        #[arg(long)]
        reason: Option<String>,

        /// Optional corrected text.
        #[arg(long)]
        correction: Option<String>,
    },

    /// Search saved analyses by deal name or id.
    History {
        /// Search query (empty lists the most recent).
        query: Option<String>,

        /// Filter by analysis type id.
        #[arg(short = 't', long = "type")]
        type_id: Option<String>,

        /// Maximum rows to show.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Prompt catalog subcommands.
#[derive(Subcommand)]
pub(crate) enum TypesAction {
    /// Add or update a catalog entry (updates bump the prompt version).
    Add {
        /// Stable type id (e.g. risk_review).
        #[arg(long)]
        id: String,

        /// Human-readable name.
        #[arg(long)]
        name: String,

        /// File containing the system prompt text.
        #[arg(long)]
        prompt_file: PathBuf,

        /// Optional one-line description.
        #[arg(long)]
        description: Option<String>,
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
        0 => "dealscope=info",
        1 => "dealscope=debug",
        _ => "dealscope=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze { deal_id, type_id } => cmd_analyze(&deal_id, &type_id).await,
        Command::Context { deal_id, out } => cmd_context(&deal_id, out.as_deref()).await,
        Command::Types { action } => match action {
            None => cmd_types_list().await,
            Some(TypesAction::Add {
                id,
                name,
                prompt_file,
                description,
            }) => cmd_types_add(&id, &name, &prompt_file, description.as_deref()).await,
        },
        Command::Feedback {
            analysis_id,
            section_id,
            rating,
            reason,
            correction,
        } => cmd_feedback(&analysis_id, &section_id, &rating, reason, correction).await,
        Command::History {
            query,
            type_id,
            limit,
        } => cmd_history(query.as_deref().unwrap_or(""), type_id.as_deref(), limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

fn build_crm_client(config: &AppConfig) -> Result<CrmClient> {
    let token = require_env(&config.crm.token_env)?;
    Ok(CrmClient::new(&config.crm.base_url, token)?)
}

fn build_analysis_client(config: &AppConfig) -> Result<AnalysisClient> {
    let api_key = require_env(&config.analysis.api_key_env)?;
    Ok(AnalysisClient::new(
        &config.analysis.base_url,
        api_key,
        config.analysis.model.clone(),
        config.analysis.max_tokens,
    )?)
}

async fn open_store(config: &AppConfig) -> Result<Store> {
    let path = config.storage.resolved_db_path()?;
    Ok(Store::open(&path).await?)
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_analyze(deal_id: &str, type_id: &str) -> Result<()> {
    let config = load_config()?;
    let crm = build_crm_client(&config)?;
    let analysis = build_analysis_client(&config)?;
    let store = open_store(&config).await?;

    let entry = store
        .get_analysis_type(type_id)
        .await?
        .ok_or_else(|| eyre!("unknown analysis type '{type_id}' — see `dealscope types`"))?;

    let prompt = AnalysisPrompt {
        type_id: entry.type_id.clone(),
        system_prompt: entry.system_prompt.clone(),
        version: entry.version,
    };

    info!(deal_id, type_id, "starting analysis run");

    let reporter = CliProgress::new();
    let run = pipeline::run_analysis(
        &crm,
        &analysis,
        &store,
        deal_id,
        &config.crm.internal_host,
        &prompt,
        &reporter,
    )
    .await;
    reporter.finish();
    let run = run?;

    println!();
    println!("  Analysis complete!");
    println!("  ID:    {}", run.analysis_id);
    println!("  Deal:  {}", run.deal_name);
    println!("  Type:  {} ({})", entry.name, entry.type_id);
    println!("  Model: {}", run.model);
    println!();
    println!("{}", run.response);
    println!();
    if !run.sections.is_empty() {
        println!(
            "  Sections for feedback: {}",
            run.sections
                .iter()
                .map(|s| format!("{} ({})", s.section_id, s.section_title))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
    }

    Ok(())
}

async fn cmd_context(deal_id: &str, out: Option<&std::path::Path>) -> Result<()> {
    let config = load_config()?;
    let crm = build_crm_client(&config)?;

    info!(deal_id, "building deal context");

    let reporter = CliProgress::new();
    let context =
        pipeline::build_deal_context(&crm, deal_id, &config.crm.internal_host, &reporter).await;
    reporter.finish();
    let context = context?;

    match out {
        Some(path) => {
            std::fs::write(path, &context.document)?;
            println!(
                "  Wrote {} chars to {} ({} engagements, {} URLs)",
                context.document.len(),
                path.display(),
                context.engagements.len(),
                context.url_index.len()
            );
        }
        None => println!("{}", context.document),
    }

    Ok(())
}

async fn cmd_types_list() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let types = store.list_analysis_types().await?;
    if types.is_empty() {
        println!("No analysis types configured. Add one with `dealscope types add`.");
        return Ok(());
    }

    for entry in types {
        println!(
            "  {}  v{}  {}{}",
            entry.type_id,
            entry.version,
            entry.name,
            entry
                .description
                .map(|d| format!(" — {d}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn cmd_types_add(
    id: &str,
    name: &str,
    prompt_file: &std::path::Path,
    description: Option<&str>,
) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let system_prompt = std::fs::read_to_string(prompt_file)
        .map_err(|e| eyre!("cannot read prompt file {}: {e}", prompt_file.display()))?;
    if system_prompt.trim().is_empty() {
        return Err(eyre!("prompt file {} is empty", prompt_file.display()));
    }

    store
        .upsert_analysis_type(&AnalysisType {
            type_id: id.to_string(),
            name: name.to_string(),
            description: description.map(String::from),
            system_prompt,
            is_active: true,
            version: 1,
        })
        .await?;

    let saved = store
        .get_analysis_type(id)
        .await?
        .ok_or_else(|| eyre!("analysis type '{id}' not found after save"))?;
    println!("  Saved analysis type '{id}' (v{})", saved.version);
    Ok(())
}

async fn cmd_feedback(
    analysis_id: &str,
    section_id: &str,
    rating: &str,
    reason: Option<String>,
    correction: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let analysis = store
        .get_analysis(analysis_id)
        .await?
        .ok_or_else(|| eyre!("no analysis with id '{analysis_id}'"))?;

    // Resolve the section title from the stored response so feedback rows
    // stay meaningful even if the prompt changes later.
    let sections = parse_sections(&analysis.response);
    let section = sections
        .iter()
        .find(|s| s.section_id == section_id)
        .ok_or_else(|| {
            eyre!(
                "analysis '{analysis_id}' has no section '{section_id}' (has: {})",
                sections
                    .iter()
                    .map(|s| s.section_id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;

    let inserted = store
        .insert_feedback(&FeedbackRecord {
            analysis_id: analysis_id.to_string(),
            section_id: section_id.to_string(),
            section_title: section.section_title.clone(),
            rating: rating.to_string(),
            reason,
            correction,
            prompt_version: analysis.prompt_version,
        })
        .await?;

    if inserted {
        println!("  Feedback recorded for {analysis_id}/{section_id}.");
    } else {
        println!("  Feedback for {analysis_id}/{section_id} already exists — not duplicated.");
    }
    Ok(())
}

async fn cmd_history(query: &str, type_id: Option<&str>, limit: u32) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let rows = store.search_analyses(query, type_id, limit).await?;
    if rows.is_empty() {
        println!("No analyses found.");
        return Ok(());
    }

    for row in rows {
        println!(
            "  {}  {}  {}  [{}]",
            row.created_at, row.analysis_id, row.deal_name, row.analysis_type
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = dealscope_shared::init_config()?;
    println!("  Created {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    println!("CRM base URL:      {}", config.crm.base_url);
    println!("CRM token env:     {}", config.crm.token_env);
    println!("CRM internal host: {}", config.crm.internal_host);
    println!("Analysis base URL: {}", config.analysis.base_url);
    println!("Analysis key env:  {}", config.analysis.api_key_env);
    println!("Analysis model:    {}", config.analysis.model);
    println!("Max tokens:        {}", config.analysis.max_tokens);
    println!(
        "Database:          {}",
        config.storage.resolved_db_path()?.display()
    );
    Ok(())
}
