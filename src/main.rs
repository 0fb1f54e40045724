//! Archon CLI - architecture linter for Swift codebases

use anyhow::{Context as _, Result};
use archon::config::{ColorMode, Config, OutputFormat};
use archon::discover;
use archon::engine::Engine;
use archon::output::{JsonFormatter, OutputFormatter, TextFormatter};
use archon::registry::RuleRegistry;
use archon::rules::core_pack;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use glob::glob;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "archon",
    version,
    about = "Architecture linter for Swift codebases",
    long_about = "Statically analyzes Swift source against architectural conventions: \
                  state/action shape, view complexity, and module coupling."
)]
struct Cli {
    /// Files, directories, or glob patterns to analyze
    paths: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value = "0")]
    jobs: usize,

    /// Disable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// Only enable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    select: Option<Vec<String>>,

    /// Additional script rule pack directory
    #[arg(long)]
    rules_dir: Option<PathBuf>,

    /// Show per-rule timing statistics
    #[arg(long)]
    stats: bool,

    /// List registered rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Do not descend into subdirectories
    #[arg(long)]
    no_recursive: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    env_logger::init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(2);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load_default().context("failed to load configuration")?,
    };

    config.merge_cli(
        Some(match cli.format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }),
        Some(cli.verbose),
        if cli.jobs > 0 { Some(cli.jobs) } else { None },
        cli.disable.clone(),
        cli.select.clone(),
    );

    if cli.no_color || config.output.color == ColorMode::Never {
        colored::control::set_override(false);
    }

    let registry = build_registry(&config, cli.rules_dir.as_deref())?;

    for failure in registry.load_failures() {
        eprintln!(
            "{}: failed to load rule from {}: {}",
            "warning".yellow(),
            failure.file.display(),
            failure.error
        );
    }

    if cli.list_rules {
        print_rules(&registry);
        return Ok(0);
    }

    let files = collect_files(&config, &cli.paths, !cli.no_recursive)?;
    if files.is_empty() {
        eprintln!("{}: no files found to analyze", "warning".yellow());
        return Ok(0);
    }

    let rules = registry.active_rules();
    if rules.is_empty() {
        eprintln!("{}: no active rules configured", "warning".yellow());
    }

    if cli.verbose {
        eprintln!("analyzing {} files with {} rules", files.len(), rules.len());
    }

    let engine = Engine::new(config.clone());
    let report = engine.validate(&rules, &files);

    let formatter: Box<dyn OutputFormatter> = match config.output.format {
        OutputFormat::Text => {
            let mut text = TextFormatter::new();
            text.show_stats = config.output.statistics;
            Box::new(text)
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
    };
    print!("{}", formatter.format(&report));

    if cli.stats {
        print_timings(&report);
    }

    Ok(report.exit_code())
}

/// Assemble the registry: built-in pack plus configured script packs
fn build_registry(
    config: &Config,
    extra_pack: Option<&std::path::Path>,
) -> Result<RuleRegistry> {
    let mut registry = RuleRegistry::new();

    let core: Vec<_> = core_pack(&config.thresholds)
        .into_iter()
        .filter(|rule| config.is_category_enabled(&rule.descriptor().category.to_string()))
        .collect();
    registry
        .register_pack("core", core)
        .context("failed to register built-in rules")?;

    let default_pack = PathBuf::from(".archon/rules");
    if default_pack.is_dir() {
        registry.add_script_pack("project", &default_pack);
    }
    for (i, dir) in config.rules.packs.iter().enumerate() {
        registry.add_script_pack(&format!("pack-{}", i), dir);
    }
    if let Some(dir) = extra_pack {
        registry.add_script_pack("cli", dir);
    }

    registry.load_rules().context("failed to load rules")?;
    Ok(registry)
}

/// Expand positional arguments into an ordered file list
fn collect_files(config: &Config, paths: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let roots: Vec<String> = if paths.is_empty() {
        vec![".".to_string()]
    } else {
        paths.to_vec()
    };

    let mut files = Vec::new();
    for arg in &roots {
        let path = PathBuf::from(arg);
        if path.is_dir() {
            let discovered = discover::find_files(
                &path,
                &config.files.include,
                &config.files.exclude,
                recursive,
            )
            .with_context(|| format!("discovery failed under {}", path.display()))?;
            files.extend(discovered);
        } else if path.is_file() {
            files.push(path);
        } else {
            let matches = glob(arg).with_context(|| format!("invalid pattern '{}'", arg))?;
            for entry in matches.flatten() {
                if entry.is_file() {
                    files.push(entry);
                }
            }
        }
    }

    Ok(files)
}

fn print_rules(registry: &RuleRegistry) {
    println!(
        "{:<24} {:<10} {:<10} {:<10} {}",
        "RULE", "CATEGORY", "SEVERITY", "STATE", "ORIGIN"
    );
    for descriptor in registry.descriptors() {
        println!(
            "{:<24} {:<10} {:<10} {:<10} {}",
            descriptor.name,
            descriptor.category.to_string(),
            descriptor.severity.to_string(),
            descriptor.state.to_string(),
            descriptor.origin
        );
    }
}

fn print_timings(report: &archon::engine::RunReport) {
    eprintln!(
        "\n{:<24} {:>12} {:>12} {:>8} {:>10}",
        "RULE", "TOTAL", "AVG", "EVALS", "FINDINGS"
    );
    for timing in report.sorted_timings() {
        eprintln!(
            "{:<24} {:>10.2}ms {:>10.2}us {:>8} {:>10}",
            timing.rule,
            timing.total_time.as_secs_f64() * 1000.0,
            timing.avg_time().as_secs_f64() * 1_000_000.0,
            timing.evaluation_count,
            timing.violation_count
        );
    }
}
