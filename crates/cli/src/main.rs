//! mirrorcheck command-line tool.
//!
//! Compares mirrored files between two repositories and reports which are in
//! sync, which side has moved on since their last shared content, and by how
//! many commits. Also generates and validates configuration files.

mod report;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mirrorcheck_core::config::{AppConfig, RepoConfig};
use mirrorcheck_core::models::report_to_json;
use mirrorcheck_core::{open_repository, Comparator, FilePair, Repository};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// mirrorcheck command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "mirrorcheck",
    version,
    about = "Check whether mirrored files are in sync across Git and SVN trees"
)]
struct Cli {
    /// Path to the TOML configuration file
    /// [default: <config dir>/mirrorcheck/config.toml].
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides RUST_LOG and
    /// the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare the configured (or given) file pairs.
    Compare {
        /// Print the report as JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// List the commits each side made since the common ancestor.
        #[arg(long)]
        commits: bool,

        /// Exit with status 2 when any pair is not in sync.
        #[arg(long)]
        fail_on_drift: bool,

        /// File pairs as `left=right`, or one path used on both sides.
        /// Replaces the `[[files]]` list from the config.
        files: Vec<String>,
    },

    /// Generate an example configuration file.
    Init {
        /// Output path for the generated config file [default: --config path].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file and open both repositories.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Init { output } => {
            init_logging(cli.log_level.as_deref(), None);
            cmd_init(&output.unwrap_or(config_path))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            init_logging(cli.log_level.as_deref(), None);
            cmd_validate(&config_path)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compare {
            json,
            commits,
            fail_on_drift,
            files,
        } => {
            let config = load_config(&config_path)?;
            init_logging(cli.log_level.as_deref(), Some(&config.log_level));
            cmd_compare(config, &files, json, commits, fail_on_drift)
        }
    }
}

/// Install the stderr subscriber. Precedence: `--log-level`, `RUST_LOG`,
/// the config's `log_level`, then `warn`.
fn init_logging(cli_level: Option<&str>, config_level: Option<&str>) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config_level.unwrap_or("warn"))),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("mirrorcheck").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("mirrorcheck.toml"))
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let mut config = AppConfig::load_from_file(path).context("failed to load configuration file")?;
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    Ok(config)
}

fn open_side(side: &str, config: &RepoConfig) -> Result<Box<dyn Repository>> {
    open_repository(config).with_context(|| {
        format!(
            "failed to open {} {} repository at {}",
            side,
            config.kind,
            config.path.display()
        )
    })
}

/// Parse `left=right` / `path` arguments.
fn parse_file_args(files: &[String]) -> Result<Vec<FilePair>> {
    files
        .iter()
        .map(|arg| FilePair::parse(arg).ok_or_else(|| anyhow::anyhow!("invalid file pair '{}': expected 'left=right' or 'path'", arg)))
        .collect()
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_compare(
    mut config: AppConfig,
    files: &[String],
    json: bool,
    commits: bool,
    fail_on_drift: bool,
) -> Result<ExitCode> {
    let cli_pairs = parse_file_args(files)?;
    if !cli_pairs.is_empty() {
        config.files = cli_pairs;
    }
    config.validate(!files.is_empty()).context("invalid configuration")?;

    let left = open_side("left", &config.left)?;
    let right = open_side("right", &config.right)?;
    let comparator = Comparator::new(left.as_ref(), right.as_ref());

    let spinner = ProgressBar::new(config.files.len() as u64);
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} [{pos}/{len}] {msg}")
            .context("invalid progress template")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut results = Vec::with_capacity(config.files.len());
    for pair in &config.files {
        spinner.set_message(pair.left.clone());
        if let Some(result) = comparator.compare_file(&pair.left, &pair.right) {
            results.push(result);
        }
        spinner.inc(1);
    }
    spinner.finish_and_clear();
    info!(compared = results.len(), requested = config.files.len(), "comparison finished");

    if json {
        println!("{}", report_to_json(&results).context("failed to serialize report")?);
    } else {
        println!();
        println!("{}", style::header(&format!("{} ⇄ {}", left.label(), right.label())));
        println!();
        if results.is_empty() {
            println!("{}", style::warn("No files compared (all pairs ignored)"));
        } else {
            println!("{}", report::results_table(&results));
        }
        if commits {
            report::print_subsequent_commits(&results, left.as_ref(), right.as_ref());
        }
        println!();
        let summary = report::summary_line(&results);
        if results.iter().any(|r| r.status.is_drift()) {
            println!("{}", style::warn(&summary));
        } else {
            println!("{}", style::success(&summary));
        }
    }

    if fail_on_drift && results.iter().any(|r| r.status.is_drift()) {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# mirrorcheck configuration
#
# `left` is usually the canonical development tree and `right` its mirror.

log_level = "warn"

[left]
kind = "git"                      # "git" or "svn"
path = "/path/to/canonical"
# executable = "git"
# slow = false                    # override the backend's cost hint
ignore_patterns = ["vendor/**"]

[[left.transforms]]
kind = "remove_marked_comments"
tag = "mirror-only"

[right]
kind = "svn"
path = "/path/to/mirror-checkout"
# username = "deploy"
# password_env = "SVN_PASSWORD"

# [right.options]
# config-dir = "/path/to/svn-config"

[[right.transforms]]
kind = "substitute"
files = ["*.php", "*.txt"]
substitutions = [
    { pattern = "Version: [0-9.]+", replacement = "Version: X" },
]

[[files]]
left = "src/plugin.php"
right = "plugin.php"

[[files]]
left = "readme.txt"
right = "readme.txt"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("failed to create config directory")?;
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("{}", style::success(&format!("Example configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Point [left] and [right] at your repositories");
    println!("  2. List the mirrored files under [[files]]");
    println!("  3. Validate with: mirrorcheck validate --config {}", output.display());
    println!("  4. Compare with:  mirrorcheck compare --config {}", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  [OK] Environment variable references processed");

    match config.validate(true) {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }
    if config.files.is_empty() {
        println!("  [WARN] No [[files]] configured; pass file pairs to `compare`");
    }

    let mut failed = false;
    for (side, repo_config) in [("left", &config.left), ("right", &config.right)] {
        match open_repository(repo_config) {
            Ok(repo) => println!(
                "  [OK] {:<5} {} ({} transform(s), {})",
                side,
                repo.label(),
                repo.transforms().len(),
                if repo.is_slow() { "slow" } else { "fast" }
            ),
            Err(e) => {
                println!("  [FAIL] {:<5} {}", side, e);
                failed = true;
            }
        }
    }
    if failed {
        println!();
        println!("{}", style::error("Configuration is not usable."));
        anyhow::bail!("could not open repositories");
    }

    println!();
    println!("Configuration summary:");
    println!("  Left  : {} {}", config.left.kind, config.left.path.display());
    println!("  Right : {} {}", config.right.kind, config.right.path.display());
    println!("  Files : {}", config.files.len());
    println!(
        "  SVN password: {}",
        match (&config.left.password, &config.right.password) {
            (None, None) => "not set",
            _ => "set",
        }
    );
    println!();
    println!("{}", style::success("Configuration is valid."));

    Ok(())
}
