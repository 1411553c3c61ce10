//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docuify_core::{DocuifyEngine, Node, PreloadReport, QueryContext, preload, preload_tree};
use docuify_plugins::FrontMatterPlugin;
use docuify_shared::{AppConfig, FilterConfig, PreloadConfig, init_config, load_config, resolve_token};
use docuify_sources::{GithubConfig, GithubSource, LocalFileSource};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Docuify: turn a pile of documents into a queryable tree.
#[derive(Parser)]
#[command(
    name = "docuify",
    version,
    about = "Assemble documentation trees from local or GitHub sources, run plugins, and query them.",
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

/// Where items come from, plus the options shared by every build.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["local", "github"])))]
pub(crate) struct SourceArgs {
    /// Local directory to read.
    #[arg(long)]
    pub local: Option<PathBuf>,

    /// GitHub repository as OWNER/REPO (token read from the configured env var).
    #[arg(long)]
    pub github: Option<String>,

    /// Branch to list (GitHub only).
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Path prefix to keep (required with --github).
    #[arg(long)]
    pub path: Option<String>,

    /// Keep only items matching this glob (repeatable).
    #[arg(long = "include")]
    pub include: Vec<String>,

    /// Drop items matching this glob (repeatable).
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Skip the front-matter plugin.
    #[arg(long)]
    pub no_frontmatter: bool,

    /// Maximum concurrent content loads when preloading.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the tree and print the JSON build envelope.
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the flattened file list instead of the tree.
        #[arg(long)]
        flat: bool,

        /// Load every file's content before printing.
        #[arg(long)]
        preload: bool,
    },

    /// Query the flattened file list with a partial JSON pattern.
    Query {
        #[command(flatten)]
        source: SourceArgs,

        /// Partial JSON pattern, e.g. '{"extension":"md"}'. Matches all when omitted.
        #[arg(long = "where")]
        pattern: Option<String>,

        /// Stop at the first match.
        #[arg(long)]
        first: bool,

        /// Print each match's transformed content.
        #[arg(long)]
        content: bool,

        /// Load every file before querying, so load-time attributes
        /// (front matter) can be matched.
        #[arg(long)]
        preload: bool,
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

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docuify=info",
        1 => "docuify=debug",
        _ => "docuify=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
        Command::Build {
            source,
            flat,
            preload,
        } => cmd_build(&source, flat, preload).await,
        Command::Query {
            source,
            pattern,
            first,
            content,
            preload,
        } => cmd_query(&source, pattern.as_deref(), first, content, preload).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Engine setup
// ---------------------------------------------------------------------------

/// Build an engine from CLI flags layered over the config file.
fn engine_for(args: &SourceArgs, config: &AppConfig) -> Result<DocuifyEngine> {
    let mut engine = match (&args.local, &args.github) {
        (Some(dir), _) => DocuifyEngine::new(LocalFileSource::new(dir)),
        (None, Some(repo)) => {
            let token = resolve_token(config)?;
            let github = GithubConfig::from_defaults(
                &config.github,
                token,
                repo,
                &args.branch,
                args.path.clone().unwrap_or_default(),
            );
            DocuifyEngine::new(GithubSource::new(github)?)
        }
        (None, None) => return Err(eyre!("either --local or --github is required")),
    };

    let mut filter: FilterConfig = config.filter.clone();
    filter.include_patterns.extend(args.include.iter().cloned());
    filter.exclude_patterns.extend(args.exclude.iter().cloned());
    engine = engine.with_path_filter(&filter)?;

    if config.defaults.frontmatter && !args.no_frontmatter {
        engine = engine.with_plugin(FrontMatterPlugin::new());
    }

    Ok(engine)
}

fn preload_config(args: &SourceArgs, config: &AppConfig) -> PreloadConfig {
    let mut preload = PreloadConfig::from(config);
    if let Some(concurrency) = args.concurrency {
        preload.concurrency = concurrency;
    }
    preload
}

fn report_preload(report: &PreloadReport) {
    eprintln!(
        "  Preloaded: {}/{} files in {:.1}s",
        report.loaded,
        report.attempted,
        report.duration.as_secs_f64()
    );
    for failure in &report.failures {
        eprintln!("  Failed:    {}: {}", failure.path, failure.error);
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(args: &SourceArgs, flat: bool, with_preload: bool) -> Result<()> {
    let config = load_config()?;
    let engine = engine_for(args, &config)?;
    let preload_cfg = preload_config(args, &config);

    info!(
        source = engine.source_name(),
        plugins = ?engine.plugin_names(),
        flat,
        "building"
    );

    let progress = CliProgress::new();
    progress.phase(format!("Fetching from {}", engine.source_name()));

    let json = if flat {
        let output = engine.flat_build().await?;
        if with_preload {
            progress.phase(format!("Preloading {} files", output.payload.len()));
            let report = preload(&output.payload, &preload_cfg).await;
            progress.done();
            report_preload(&report);
        } else {
            progress.done();
        }
        serde_json::to_string_pretty(&output)?
    } else {
        let output = engine.build().await?;
        if with_preload {
            progress.phase("Preloading files");
            let report = preload_tree(&output.payload, &preload_cfg).await;
            progress.done();
            report_preload(&report);
        } else {
            progress.done();
        }
        serde_json::to_string_pretty(&output)?
    };

    println!("{json}");
    Ok(())
}

async fn cmd_query(
    args: &SourceArgs,
    pattern: Option<&str>,
    first: bool,
    show_content: bool,
    with_preload: bool,
) -> Result<()> {
    let pattern: Value = match pattern {
        Some(raw) => serde_json::from_str(raw).map_err(|e| eyre!("invalid --where pattern '{raw}': {e}"))?,
        None => Value::Null,
    };

    let config = load_config()?;
    let engine = engine_for(args, &config)?;
    let preload_cfg = preload_config(args, &config);

    let progress = CliProgress::new();
    progress.phase(format!("Fetching from {}", engine.source_name()));
    let output = engine.flat_build().await?;

    if with_preload {
        progress.phase(format!("Preloading {} files", output.payload.len()));
        let report = preload(&output.payload, &preload_cfg).await;
        progress.done();
        report_preload(&report);
    } else {
        progress.done();
    }

    let ctx = QueryContext::new(output.payload);
    let matches: Vec<&Node> = if first {
        ctx.find_first(&pattern).into_iter().collect()
    } else {
        ctx.find_many(&pattern)
    };

    info!(%pattern, matches = matches.len(), "query completed");

    for node in matches {
        if show_content {
            let text = ctx.load_content(node).await?;
            println!("==> {} <==", node.full_path());
            println!("{text}");
        } else {
            println!("{}", node.full_path());
        }
    }

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner on stderr; hidden automatically when stderr is not a terminal.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn phase(&self, name: impl Into<String>) {
        self.spinner.set_message(name.into());
    }

    fn done(&self) {
        self.spinner.finish_and_clear();
    }
}
