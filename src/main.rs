//! CLI entry point for `eml2pdf`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use eml2pdf::config::{self, Config, RendererKind};
use eml2pdf::export::backend::PageSpec;
use eml2pdf::export::pipeline::{self, BatchReport, Options, ReportEntry};

/// Convert .eml email messages into sanitized PDF or HTML documents.
#[derive(Parser)]
#[command(name = "eml2pdf", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory searched (recursively) for .eml files
    #[arg(value_name = "INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory receiving the rendered documents (created if missing)
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Also write the final HTML next to each output
    #[arg(short, long)]
    debug_html: bool,

    /// Number of worker threads (default: available parallelism)
    #[arg(short = 'n', long = "number-of-procs", value_name = "N")]
    jobs: Option<usize>,

    /// Page size and optional orientation, e.g. "a4" or "letter landscape"
    #[arg(short, long, value_name = "SIZE")]
    page: Option<String>,

    /// Do not sanitize the HTML. Only use with messages you trust.
    #[arg(long = "unsafe")]
    unsafe_html: bool,

    /// Rendering backend
    #[arg(long, value_enum)]
    renderer: Option<RendererKind>,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
    /// Write the current configuration to the config file
    InitConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        Some(Commands::InitConfig) => cmd_init_config(&config),
        None => cmd_convert(&cli, &config),
    }
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "eml2pdf.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "eml2pdf", &mut std::io::stdout());
    Ok(())
}

fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn cmd_init_config(config: &Config) -> anyhow::Result<()> {
    config::save_config(config)?;
    if let Some(path) = config::config_file_path() {
        println!("  Wrote {}", path.display());
    }
    Ok(())
}

fn cmd_convert(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let (Some(input_dir), Some(output_dir)) = (&cli.input_dir, &cli.output_dir) else {
        anyhow::bail!("INPUT_DIR and OUTPUT_DIR are required (see --help)");
    };

    let page_str = cli.page.as_deref().unwrap_or(&config.output.page);
    let page: PageSpec = page_str.parse()?;

    let unsafe_html = cli.unsafe_html || config.output.unsafe_html;
    if unsafe_html {
        tracing::warn!("Sanitization disabled: remote content and scripts are kept");
    }

    // Parallel workers interleave their log lines, so verbose runs use one.
    let jobs = if cli.verbose > 0 {
        1
    } else {
        cli.jobs.unwrap_or(config.performance.jobs)
    };

    std::fs::create_dir_all(output_dir).map_err(|e| {
        anyhow::anyhow!(
            "Could not create output directory {}: {e}",
            output_dir.display()
        )
    })?;

    let inputs = pipeline::discover_inputs(input_dir)?;
    if inputs.is_empty() {
        println!("  No .eml files found in {}", input_dir.display());
        return Ok(());
    }

    let renderer = config.build_renderer(cli.renderer.unwrap_or(config.output.renderer));
    let options = Options {
        output_dir: output_dir.clone(),
        page,
        unsafe_html,
        debug_html: cli.debug_html || config.output.debug_html,
    };

    let start = Instant::now();
    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let report = pipeline::process_all(&inputs, &options, renderer.as_ref(), jobs, &|entry: &ReportEntry| {
        match entry {
            ReportEntry::Produced { .. } => {}
            ReportEntry::Skipped { input, reason } => {
                pb.println(format!("  Skipped {}: {reason}", input.display()));
            }
            ReportEntry::Failed { input, error } => {
                pb.println(format!("  Failed {}: {error}", input.display()));
            }
        }
        pb.inc(1);
    })?;
    pb.finish_and_clear();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, output_dir, start.elapsed().as_secs_f64());
    }
    Ok(())
}

fn print_summary(report: &BatchReport, output_dir: &Path, secs: f64) {
    println!();
    println!("  Conversion complete:");
    println!("  {:<25} {}", "Converted", report.produced());
    println!("  {:<25} {}", "Skipped", report.skipped());
    println!("  {:<25} {}", "Failed", report.failed());
    println!("  {:<25} {}", "Output directory", output_dir.display());
    println!("  {:<25} {secs:.2}s", "Elapsed");
    println!();
}
