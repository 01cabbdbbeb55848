//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use lakeexport_core::{BuildOptions, build, convert_file, crawl};
use lakeexport_crawler::CrawlOptions;
use lakeexport_markdown::ConvertOptions;
use lakeexport_shared::{
    AppConfig, CONFIG_FILE_NAME, ProgressReporter, init_config, load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// lakeexport: export a knowledge-base account to Markdown.
#[derive(Parser)]
#[command(
    name = "lakeexport",
    version,
    about = "Download knowledge-base documents and convert them to Markdown.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to the JSON config file.
    #[arg(long, global = true, env = "LAKEEXPORT_CONFIG", default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Also write debug-level logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Verbosity level (-v, -vv).
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
    /// Download every repo and document of the account into local storage.
    Crawl {
        /// Ignore cached timestamps and refetch everything.
        #[arg(long)]
        full: bool,
    },

    /// Convert the crawled documents into a Markdown tree.
    Build {
        /// Reconvert documents even if their source is unchanged.
        #[arg(long)]
        force: bool,

        /// Put every document at its repo root instead of following the catalog.
        #[arg(long)]
        flat: bool,

        /// Storage directory to read (defaults to `storage_dir` from config).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory (defaults to `output_dir` from config).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Convert a single raw document, Lake, HTML or Markdown file.
    Convert {
        /// File to convert.
        file: PathBuf,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Document URL for resolving relative links.
        #[arg(long)]
        base_url: Option<String>,

        /// Omit the YAML frontmatter.
        #[arg(long)]
        no_frontmatter: bool,
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
    /// Write a new config file.
    Init {
        /// API token.
        #[arg(long)]
        token: String,
    },
    /// Show resolved configuration with the token masked.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Console logs go to stderr so `convert` output on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, fmt};

    let filter = match cli.verbose {
        0 => "lakeexport=info",
        1 => "lakeexport=debug",
        _ => "lakeexport=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let console = match cli.log_format {
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    let file = match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(EnvFilter::new("lakeexport=debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config, command, ..
    } = cli;

    match command {
        Command::Crawl { full } => cmd_crawl(&config, full).await,
        Command::Build {
            force,
            flat,
            input,
            out,
        } => cmd_build(&config, force, flat, input, out),
        Command::Convert {
            file,
            output,
            base_url,
            no_frontmatter,
        } => cmd_convert(&file, output.as_deref(), base_url, !no_frontmatter),
        Command::Config { action } => match action {
            ConfigAction::Init { token } => cmd_config_init(&config, &token),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_crawl(config_path: &Path, full: bool) -> Result<()> {
    let config = load_config_from(config_path)?;
    info!(host = %config.host, full, "crawling account");

    let reporter = CliProgress::new();
    let result = crawl(&config, CrawlOptions { full }, &reporter).await?;

    println!();
    println!("  Crawl finished for {}", result.login);
    println!(
        "  Repos:     {} ({} crawled, {} unchanged, {} removed)",
        result.repos_total, result.repos_crawled, result.repos_unchanged, result.repos_removed
    );
    println!(
        "  Documents: {} fetched, {} unchanged, {} removed",
        result.docs_fetched, result.docs_unchanged, result.docs_removed
    );
    println!("  Storage:   {}", config.storage_dir);
    println!("  Time:      {:.1}s", result.duration.as_secs_f64());
    print_failures(&result.errors);
    println!();

    Ok(())
}

fn cmd_build(
    config_path: &Path,
    force: bool,
    flat: bool,
    input: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path)?;
    let opts = BuildOptions {
        storage_dir: input.unwrap_or_else(|| PathBuf::from(&config.storage_dir)),
        output_dir: out.unwrap_or_else(|| PathBuf::from(&config.output_dir)),
        host: config.host.clone(),
        force,
        flat,
        frontmatter: true,
    };
    info!(force, flat, "building markdown");

    let reporter = CliProgress::new();
    let result = build(&opts, &reporter)?;

    println!();
    println!("  Build finished");
    println!("  Repos:     {}", result.repos);
    println!(
        "  Documents: {} converted, {} unchanged, {} removed",
        result.converted, result.unchanged, result.removed
    );
    println!("  Output:    {}", opts.output_dir.display());
    println!("  Time:      {:.1}s", result.duration.as_secs_f64());
    print_failures(&result.errors);
    println!();

    Ok(())
}

fn cmd_convert(
    file: &Path,
    output: Option<&Path>,
    base_url: Option<String>,
    frontmatter: bool,
) -> Result<()> {
    if let Some(url) = &base_url {
        Url::parse(url).map_err(|e| eyre!("invalid base URL '{url}': {e}"))?;
    }

    let opts = ConvertOptions {
        source_url: base_url,
        frontmatter,
        ..Default::default()
    };
    let result = convert_file(file, &opts)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("cannot create {}", parent.display()))?;
            }
            std::fs::write(path, &result.markdown)
                .wrap_err_with(|| format!("cannot write {}", path.display()))?;
            info!(
                output = %path.display(),
                title = %result.title,
                words = result.word_count,
                warnings = result.warnings.len(),
                "document converted"
            );
        }
        None => print!("{}", result.markdown),
    }

    Ok(())
}

fn cmd_config_init(path: &Path, token: &str) -> Result<()> {
    init_config(path, token)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: &Path) -> Result<()> {
    let config: AppConfig = load_config_from(path)?;
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

fn print_failures(errors: &[(String, String)]) {
    if errors.is_empty() {
        return;
    }
    println!("  Failures:  {} (retried on the next run)", errors.len());
    for (item, message) in errors {
        println!("    - {item}: {message}");
    }
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
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn doc_fetched(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {title}"));
    }

    fn doc_converted(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Converting [{current}/{total}] {path}"));
    }

    fn done(&self) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_build_flags() {
        let cli = Cli::try_parse_from([
            "lakeexport",
            "-vv",
            "--config",
            "alt.json",
            "build",
            "--force",
            "--out",
            "md",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from("alt.json"));
        match cli.command {
            Command::Build {
                force, flat, out, ..
            } => {
                assert!(force);
                assert!(!flat);
                assert_eq!(out, Some(PathBuf::from("md")));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn convert_writes_output_file() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("page.lake");
        let output = tmp.path().join("out/page.md");
        std::fs::write(&input, "<h1>Page</h1><p>Body</p>").unwrap();

        cmd_convert(&input, Some(&output), None, false).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "# Page\n\nBody\n");
    }

    #[test]
    fn convert_rejects_bad_base_url() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("page.lake");
        std::fs::write(&input, "<p>x</p>").unwrap();
        assert!(cmd_convert(&input, None, Some("not a url".into()), true).is_err());
    }

    #[test]
    fn config_init_then_show() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        cmd_config_init(&path, "secret-token").unwrap();
        assert!(cmd_config_init(&path, "other").is_err());
        cmd_config_show(&path).unwrap();
    }
}
