//! CLI entry point for `buildmail`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use buildmail::attach::{
    AttachContext, AttachmentCollector, FileBuildLog, LogAttachmentBuilder, ZipCompressor,
};
use buildmail::compose::{inspect, MessageBuilder, Multipart};
use buildmail::config::Config;
use buildmail::listener::{
    is_not_console_event, ConsoleListener, Diagnostic, RecordingListener, Tee, TracingListener,
};
use buildmail::model::attachment::{AttachmentEntry, AttachmentSpec};
use buildmail::model::budget::{SizeBudget, SizeLimit};
use buildmail::template::EnvExpander;
use buildmail::workspace::{LocalWorkspace, Workspace};

/// Collect build workspace files and logs as size-limited mail attachments.
#[derive(Parser)]
#[command(name = "buildmail", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Options shared by commands that resolve attachments.
#[derive(clap::Args)]
struct CollectArgs {
    /// Build workspace directory
    workspace: PathBuf,

    /// Comma-separated glob patterns, may contain ${VAR} tokens
    #[arg(short, long)]
    pattern: String,

    /// Total attachment ceiling in bytes (0 = unlimited); overrides the config
    #[arg(long, value_name = "BYTES", allow_hyphen_values = true)]
    max_size: Option<i64>,

    /// Template variable for pattern expansion
    #[arg(short = 'D', long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    /// Also expand tokens from the process environment
    #[arg(long)]
    env: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files a pattern would attach
    Collect {
        #[command(flatten)]
        args: CollectArgs,
        #[arg(long)]
        json: bool,
    },
    /// Write a notification message with attachments to a file
    Bundle {
        #[command(flatten)]
        args: CollectArgs,
        /// Output .eml file
        #[arg(short, long)]
        output: PathBuf,
        /// Console log to attach as build.log
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,
        /// Attach the build log as build.zip
        #[arg(long)]
        compress_log: bool,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Vec<String>,
        #[arg(long)]
        subject: Option<String>,
        /// Plain-text message body
        #[arg(long, default_value = "")]
        body: String,
    },
    /// List the attachments of a message file
    Inspect {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
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
    let config = buildmail::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Collect { args, json } => cmd_collect(&args, json, &config),
        Commands::Bundle {
            args,
            output,
            log,
            compress_log,
            from,
            to,
            subject,
            body,
        } => {
            let envelope = Envelope {
                from: from.unwrap_or_else(|| config.message.from.clone()),
                to: if to.is_empty() {
                    config.message.to.clone()
                } else {
                    to
                },
                subject: subject.unwrap_or_else(|| config.message.subject.clone()),
                body,
            };
            let compress = compress_log || config.attachments.compress_build_log;
            cmd_bundle(&args, &output, log.as_deref(), compress, &envelope, &config)
        }
        Commands::Inspect { path, json } => cmd_inspect(&path, json),
        Commands::Config { init } => cmd_config(&config, init),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::filter::filter_fn;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Console diagnostics already reach stderr through ConsoleListener.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(is_not_console_event));

    let log_dir = buildmail::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender =
            tracing_appender::rolling::never(&log_dir, buildmail::config::LOG_FILE_NAME);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Headers and body for `bundle`.
struct Envelope {
    from: String,
    to: Vec<String>,
    subject: String,
    body: String,
}

/// Open the workspace, treating an unusable directory as "no workspace".
fn open_workspace(path: &Path, config: &Config) -> Option<LocalWorkspace> {
    match LocalWorkspace::with_default_excludes(path, config.attachments.default_excludes) {
        Ok(ws) => Some(ws),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Workspace unavailable");
            None
        }
    }
}

fn expander_for(args: &CollectArgs) -> EnvExpander {
    let vars = EnvExpander::from_assignments(&args.vars);
    if args.env {
        EnvExpander::from_env().merged(vars)
    } else {
        vars
    }
}

fn budget_for(args: &CollectArgs, config: &Config) -> SizeBudget {
    SizeBudget::new(args.max_size.unwrap_or_else(|| config.max_attachment_size()))
}

/// Resolve the pattern and print what would be attached.
fn cmd_collect(args: &CollectArgs, json: bool, config: &Config) -> anyhow::Result<()> {
    let ws = open_workspace(&args.workspace, config);
    let expander = expander_for(args);
    let console = ConsoleListener::new(std::io::stderr());
    let recorder = RecordingListener::new();
    let listener = Tee(&console, &recorder);
    let ctx = AttachContext::new(ws.as_ref().map(|w| w as &dyn Workspace), &expander, &listener);

    let mut budget = budget_for(args, config);
    let entries =
        AttachmentCollector::new(AttachmentSpec::new(args.pattern.as_str())).collect(&ctx, &mut budget);

    if json {
        print_collect_json(&entries, &budget, &recorder.diagnostics())?;
    } else {
        print_collect_table(&entries, &budget);
    }
    Ok(())
}

/// Collect attachments, add the build log, and write the message.
fn cmd_bundle(
    args: &CollectArgs,
    output: &Path,
    log: Option<&Path>,
    compress: bool,
    envelope: &Envelope,
    config: &Config,
) -> anyhow::Result<()> {
    if envelope.to.is_empty() {
        anyhow::bail!("No recipients: pass --to or set `to` under [message] in the config");
    }
    let ws = open_workspace(&args.workspace, config);
    let expander = expander_for(args);
    let console = ConsoleListener::new(std::io::stderr());
    let listener = Tee(&console, &TracingListener);
    let ctx = AttachContext::new(ws.as_ref().map(|w| w as &dyn Workspace), &expander, &listener);

    let mut budget = budget_for(args, config);
    let mut multipart = Multipart::mixed();
    if !envelope.body.is_empty() {
        multipart.add_text("text/plain", envelope.body.as_str());
    }
    AttachmentCollector::new(AttachmentSpec::new(args.pattern.as_str())).attach(
        &mut multipart,
        &ctx,
        &mut budget,
    );
    if let Some(log) = log {
        let compressor = ZipCompressor::with_level(config.attachments.compression_level);
        LogAttachmentBuilder::with_compressor(Arc::new(compressor)).attach(
            &mut multipart,
            Arc::new(FileBuildLog::new(log)),
            &budget,
            compress,
            &listener,
        );
    }

    let mut message = MessageBuilder::new(envelope.from.as_str(), envelope.subject.as_str());
    for recipient in &envelope.to {
        message = message.to(recipient.as_str());
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(output)?);

    let pb = ProgressBar::new(multipart.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Writing [{bar:40.cyan/blue}] {pos}/{len} parts")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    let stats = message.write_to(&multipart, &mut writer, &listener, &|current, _total| {
        pb.set_position(current as u64);
    })?;
    pb.finish_and_clear();

    println!();
    println!("  {:<20} {}", "Attachments", stats.attachments);
    if stats.omitted > 0 {
        println!("  {:<20} {}", "Omitted", stats.omitted);
    }
    println!(
        "  {:<20} {}",
        "Attachment size",
        format_size(stats.attachment_bytes, BINARY)
    );
    println!("  {:<20} {}", "Output file", output.display());
    println!();
    Ok(())
}

/// List attachments of a message file.
fn cmd_inspect(path: &Path, json: bool) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let attachments = inspect::inspect_file(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&attachments)?);
        return Ok(());
    }

    println!();
    println!("  {} attachment(s)", attachments.len());
    if attachments.is_empty() {
        println!();
        return Ok(());
    }
    println!();
    println!("  {:<4} {:<40} {:<30} {:>10}", "#", "Name", "Type", "Size");
    println!("  {}", "-".repeat(87));
    for (i, att) in attachments.iter().enumerate() {
        let name: String = att.filename.chars().take(39).collect();
        println!(
            "  {:<4} {:<40} {:<30} {:>10}",
            i + 1,
            name,
            att.content_type,
            format_size(att.size, BINARY)
        );
    }
    println!();
    Ok(())
}

/// Print the effective configuration, optionally saving it.
fn cmd_config(config: &Config, init: bool) -> anyhow::Result<()> {
    let path = buildmail::config::config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    if init {
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }
        buildmail::config::save_config(config, &path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    println!(
        "# log file: {}",
        buildmail::config::log_file_path(config).display()
    );
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "buildmail", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf: Vec<u8> = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print collected entries as a human-readable table.
fn print_collect_table(entries: &[AttachmentEntry], budget: &SizeBudget) {
    println!();
    println!("  {} attachment(s)", entries.len());
    println!();
    if !entries.is_empty() {
        println!("  {:<4} {:<40} {:<30} {:>10}", "#", "Name", "Type", "Size");
        println!("  {}", "-".repeat(87));
        for (i, entry) in entries.iter().enumerate() {
            let name: String = entry.name().chars().take(39).collect();
            println!(
                "  {:<4} {:<40} {:<30} {:>10}",
                i + 1,
                name,
                entry.content_type(),
                format_size(entry.size().unwrap_or(0), BINARY)
            );
        }
        println!();
    }
    let ceiling = budget
        .ceiling()
        .map(|c| format_size(c, BINARY))
        .unwrap_or_else(|| "unlimited".to_string());
    println!(
        "  {:<20} {} of {}",
        "Total",
        format_size(budget.used(), BINARY),
        ceiling
    );
    println!();
}

/// Print collected entries and diagnostics as JSON.
fn print_collect_json(
    entries: &[AttachmentEntry],
    budget: &SizeBudget,
    diagnostics: &[Diagnostic],
) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = entries
        .iter()
        .map(|e| {
            serde_json::json!({
                "name": e.name(),
                "content_type": e.content_type(),
                "content_id": e.content_id(),
                "size": e.size(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "attachment_count": entries.len(),
        "attachments": items,
        "total_size": budget.used(),
        "max_size": budget.ceiling(),
        "diagnostics": diagnostics,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
