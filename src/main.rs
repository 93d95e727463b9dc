//! CLI entry point for `mimewalk`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};

use mimewalk::config::{self, Config};
use mimewalk::{parse_message, DecodeOptions, ParsedMessage};

#[derive(Parser)]
#[command(
    name = "mimewalk",
    version,
    about = "Decode and inspect the MIME structure of raw email messages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to $MIMEWALK_CONFIG or the user config dir)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a message and print its bodies, parts, and diagnostics
    Parse {
        /// Raw message file (.eml)
        file: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        /// Fail on the first problem instead of recording it
        #[arg(long)]
        strict: bool,
        /// Do not keep decoded attachment content
        #[arg(long)]
        no_content: bool,
    },
    /// List the supported charset labels
    Charsets,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Parse {
            file,
            json,
            strict,
            no_content,
        } => {
            let mut options = config.decode.clone();
            options.strict |= strict;
            options.include_content &= !no_content;
            cmd_parse(&file, &options, json)
        }
        Commands::Charsets => cmd_charsets(),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mimewalk.log");
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

fn read_and_parse(path: &Path, options: &DecodeOptions) -> anyhow::Result<ParsedMessage> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let raw = std::fs::read(path)?;
    let start = Instant::now();
    let message = parse_message(&raw, options)?;
    tracing::info!(
        path = %path.display(),
        parts = message.structure.len(),
        diagnostics = message.errors.len(),
        elapsed = ?start.elapsed(),
        "Parsed message"
    );
    Ok(message)
}

/// Parse a message and print a summary (or JSON).
fn cmd_parse(path: &Path, options: &DecodeOptions, json: bool) -> anyhow::Result<()> {
    let message = read_and_parse(path, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message_summary(path, &message);
    }
    Ok(())
}

/// Print every charset label the decoder understands.
fn cmd_charsets() -> anyhow::Result<()> {
    println!("utf-8");
    for label in mimewalk::parser::charset::labels() {
        println!("{label}");
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimewalk", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn print_message_summary(path: &Path, message: &ParsedMessage) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "File", path.display());
    println!(
        "  {:<20} {}",
        "Text body",
        body_summary(&message.text_body)
    );
    println!(
        "  {:<20} {}",
        "HTML body",
        body_summary(&message.html_body)
    );

    println!();
    println!("  Structure:");
    for node in &message.structure {
        let id = if node.part_id.is_empty() {
            "(root)"
        } else {
            node.part_id.as_str()
        };
        println!(
            "  {:indent$}{:<12} {:<32} {:>10}  {}",
            "",
            id,
            node.content_type,
            format_size(node.raw_size as u64, BINARY),
            format!("{:?}", node.strategy).to_lowercase(),
            indent = node.depth * 2
        );
    }

    let attachments: Vec<_> = message.all_attachments().collect();
    if !attachments.is_empty() {
        println!();
        println!(
            "  {:<8} {:<10} {:<30} {:<28} {:>10}",
            "Part", "Kind", "Filename", "Type", "Size"
        );
        println!("  {}", "-".repeat(90));
        for att in attachments {
            let size = format_size(att.size, BINARY);
            let size = if att.has_content() {
                size
            } else {
                format!("{size}*")
            };
            println!(
                "  {:<8} {:<10} {:<30} {:<28} {:>10}",
                att.part_id,
                att.disposition.as_str(),
                truncate_str(&att.filename, 30),
                truncate_str(&att.content_type, 28),
                size
            );
        }
    }

    if !message.errors.is_empty() {
        println!();
        println!("  Diagnostics ({}):", message.errors.len());
        for diag in &message.errors {
            println!("    {diag}");
        }
    }
    println!();
}

fn body_summary(body: &str) -> String {
    if body.is_empty() {
        return "(none)".to_string();
    }
    let first_line = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    format!(
        "{} chars: {}",
        body.chars().count(),
        truncate_str(first_line.trim(), 50)
    )
}

/// Truncate a string to `max_chars` characters, appending "..." if truncated.
fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
