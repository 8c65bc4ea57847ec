//! CLI entry point for `blobmail`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};

use blobmail::config::{self, Config};
use blobmail::ingest::{IngestEvent, IngestionTagger};
use blobmail::model::mail::{MailboxEntry, MessageContent, RenderedMessage};
use blobmail::store::backend::ObjectBackend;
use blobmail::store::dir::DirBackend;
use blobmail::viewer::Mailbox;

#[derive(Parser)]
#[command(name = "blobmail", version, about = "Mailbox viewer over tagged blob storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Bucket directory (overrides `storage.root`)
    #[arg(long, global = true, value_name = "DIR", env = "BLOBMAIL_ROOT")]
    root: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the mailbox, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one message
    Show {
        key: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete one message
    Delete { key: String },
    /// Tag newly delivered messages
    Tag {
        /// Message ids (object names under the ingest prefix)
        #[arg(required_unless_present = "event")]
        message_ids: Vec<String>,
        /// Read message ids from a delivery notification JSON file
        #[arg(long, value_name = "FILE", conflicts_with = "message_ids")]
        event: Option<PathBuf>,
    },
    /// Write the effective configuration to the config file
    InitConfig,
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

    let mut config = config::load_config();
    if let Some(root) = cli.root {
        config.storage.root = Some(root);
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::List { json } => cmd_list(&config, json),
        Commands::Show { key, json } => cmd_show(&config, &key, json),
        Commands::Delete { key } => cmd_delete(&config, &key),
        Commands::Tag { message_ids, event } => cmd_tag(&config, message_ids, event.as_deref()),
        Commands::InitConfig => cmd_init_config(&config),
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

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "blobmail.log");
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

fn open_backend(config: &Config) -> anyhow::Result<Arc<dyn ObjectBackend>> {
    let root = config::storage_root(config);
    let backend = DirBackend::open(&root)?.with_page_size(config.storage.page_size);
    tracing::debug!(root = %backend.root().display(), "Opened bucket");
    Ok(Arc::new(backend))
}

fn cmd_list(config: &Config, json: bool) -> anyhow::Result<()> {
    let mailbox = Mailbox::from_config(open_backend(config)?, config);
    let entries = mailbox.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_entries_table(&entries);
    }
    Ok(())
}

fn cmd_show(config: &Config, key: &str, json: bool) -> anyhow::Result<()> {
    let mailbox = Mailbox::from_config(open_backend(config)?, config);
    let message = match mailbox.view(key) {
        Ok(message) => message,
        Err(e) if e.is_not_found() => anyhow::bail!("No such message: {key}"),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message(&message);
    }
    Ok(())
}

fn cmd_delete(config: &Config, key: &str) -> anyhow::Result<()> {
    let mailbox = Mailbox::from_config(open_backend(config)?, config);
    mailbox.delete(key)?;
    println!("  Deleted {key}");
    Ok(())
}

fn cmd_tag(config: &Config, message_ids: Vec<String>, event: Option<&Path>) -> anyhow::Result<()> {
    let ids = match event {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let event = IngestEvent::from_json(&json)?;
            event.message_ids().map(str::to_string).collect()
        }
        None => message_ids,
    };

    let tagger = IngestionTagger::new(open_backend(config)?, config.storage.ingest_prefix.clone());
    let mut failed = 0usize;
    for (id, outcome) in tagger.tag_all(ids.iter().map(String::as_str)) {
        match outcome {
            Ok(tags) => println!("  {:<40} {} tag(s)", tagger.object_key(id), tags.len()),
            Err(e) => {
                eprintln!("  {:<40} FAILED: {e}", tagger.object_key(id));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} message(s) could not be tagged", ids.len());
    }
    Ok(())
}

fn cmd_init_config(config: &Config) -> anyhow::Result<()> {
    let path = config::save_config(config)?;
    println!("  Wrote {}", path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "blobmail", &mut std::io::stdout());
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

/// Print the listing as a human-readable table.
fn print_entries_table(entries: &[MailboxEntry]) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {} message(s)", entries.len());
    println!();

    if entries.is_empty() {
        return;
    }

    println!(
        "  {:<17} {:<28} {:<40} {:>8}  {}",
        "Date", "From", "Subject", "Size", "Key"
    );
    println!("  {}", "-".repeat(110));

    for entry in entries {
        let date = entry.last_modified.format("%Y-%m-%d %H:%M").to_string();
        let from: String = entry.sender.chars().take(27).collect();
        let subject: String = entry.subject.chars().take(39).collect();
        println!(
            "  {:<17} {:<28} {:<40} {:>8}  {}",
            date,
            from,
            subject,
            format_size(entry.size, BINARY),
            entry.key
        );
    }
    println!();
}

/// Print one message with a short header block.
fn print_message(message: &RenderedMessage) {
    let entry = &message.entry;
    println!("  {:<10} {}", "From:", entry.sender);
    if let Some(to) = &entry.recipient {
        println!("  {:<10} {}", "To:", to);
    }
    println!("  {:<10} {}", "Subject:", entry.subject);
    println!(
        "  {:<10} {}",
        "Date:",
        entry.last_modified.format("%Y-%m-%d %H:%M:%S %Z")
    );
    println!("  {:<10} {}", "Key:", entry.key);
    println!();
    match &message.content {
        MessageContent::Text(text) | MessageContent::Html(text) => println!("{text}"),
        MessageContent::Empty => println!("  (no displayable content)"),
    }
}
