//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use docbuild_core::{ModuleSummary, ProgressReporter, SiteSummary, build_module, build_site};
use docbuild_shared::{CONFIG_FILE_NAME, init_config, load_config, load_project};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docbuild: run the toolchain's tests and publish its documentation.
#[derive(Parser)]
#[command(
    name = "docbuild",
    version,
    about = "Build cross-linked toolchain documentation from manuals, dictionaries and live test transcripts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Project file (defaults to ./docbuild.toml, or built-in defaults).
    #[arg(long, global = true, env = "DOCBUILD_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Build one module, or every module plus the aggregated site.
    Build {
        /// Module to build on its own (no aggregation).
        module: Option<String>,

        /// Print the build summary as JSON.
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
    /// Write the default project file to the working directory.
    Init,
    /// Show the configuration and the paths it resolves to.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docbuild=info",
        1 => "docbuild=debug",
        _ => "docbuild=trace",
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
    let config = cli.config.as_deref();
    match cli.command {
        Command::Build { module, json } => cmd_build(config, module.as_deref(), json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config),
        },
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

async fn cmd_build(config: Option<&Path>, module: Option<&str>, json: bool) -> Result<()> {
    let project = load_project(config)?;
    let reporter = CliProgress::new();

    match module {
        Some(name) => {
            let module = project.module(name)?;
            info!(module = %module.name, "building single module");
            let result = build_module(&project, module, &reporter).await;
            reporter.done();
            let summary = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_module(&summary);
                println!("  Digest: {}", summary.digest);
                println!();
            }
        }
        None => {
            info!(modules = project.modules.len(), "building site");
            let result = build_site(&project, &reporter).await;
            reporter.done();
            let summary = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_site(&summary);
            }
        }
    }
    Ok(())
}

fn print_module(summary: &ModuleSummary) {
    println!();
    println!("  Module: {}", summary.name);
    println!("  Pages:  {}", summary.pages);
    println!("  Tests:  {}", summary.tests);
    println!("  Output: {}", summary.html_dir.display());
    println!("  Time:   {:.1}s", summary.elapsed.as_secs_f64());
}

fn print_site(summary: &SiteSummary) {
    for module in &summary.modules {
        print_module(module);
    }
    println!();
    println!("  Site built successfully!");
    println!("  Path:   {}", summary.site_dir.display());
    println!("  Pages:  {} top-level", summary.pages);
    println!("  Time:   {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Digest: {}", summary.digest);
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, module: &str, name: &str) {
        self.spinner.set_message(format!("[{module}] {name}"));
    }

    fn test_recorded(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Running tests [{current}/{total}] {name}"));
    }

    fn page_published(&self, page: &str) {
        self.spinner.set_message(format!("Rendered {page}"));
    }

    fn done(&self) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = std::env::current_dir()?.join(CONFIG_FILE_NAME);
    init_config(&path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: Option<&Path>) -> Result<()> {
    let (config, root) = load_config(config)?;
    let project = config.resolve(&root)?;

    println!("{}", toml::to_string_pretty(&config)?);
    println!("# Resolved paths");
    println!("# root       {}", project.root.display());
    println!("# site       {}", project.site_dir.display());
    println!("# templates  {}", project.template_dir.display());
    for module in &project.modules {
        println!(
            "# {:<10} {} ({} tests, binary {})",
            module.name,
            module.doc_dir.display(),
            module.suite.kind.label(),
            module.binary.display()
        );
    }
    Ok(())
}
