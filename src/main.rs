//! CLI entry point for `mailkeep`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailkeep::archive::{IngestOptions, Outcome, RecordAssembler};
use mailkeep::config::Config;
use mailkeep::model::mail::ProcessedRecord;
use mailkeep::parser::eml::read_eml;
use mailkeep::store::processed::ProcessedSet;
use mailkeep::store::records::RecordStore;

#[derive(Parser)]
#[command(
    name = "mailkeep",
    version,
    about = "Archive broadcast email as decoded records and image previews"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Archive root (overrides `archive.root` from the config file)
    #[arg(long, global = true, env = "MAILKEEP_ROOT", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive `.eml` files (UID = file stem)
    Ingest {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
        /// UID to use instead of the file stem (single file only)
        #[arg(long)]
        uid: Option<String>,
        /// Process even if the UID was processed before, replacing its stored raw copy
        #[arg(short, long)]
        force: bool,
        /// Leave mail addressed to the owner alone
        #[arg(long)]
        skip_personal: bool,
    },
    /// Rebuild records from the raw store (all stored UIDs if none given)
    Replay { uids: Vec<String> },
    /// Print a stored record
    Show {
        uid: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Also save it to the config file location
        #[arg(long)]
        write: bool,
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

    let mut config = mailkeep::config::load_config();
    if let Some(root) = cli.root {
        config.archive.root = root;
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Ingest {
            files,
            uid,
            force,
            skip_personal,
        } => cmd_ingest(
            config,
            &files,
            uid,
            IngestOptions {
                force,
                skip_personal,
            },
        ),
        Commands::Replay { uids } => cmd_replay(config, uids),
        Commands::Show { uid, json } => cmd_show(config, &uid, json),
        Commands::Config { write } => cmd_config(&config, write),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailkeep::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailkeep.log");
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

fn progress_bar(len: usize, verb: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {verb} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {{msg}}"
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// UID for a message file: its stem, e.g. `mail/4711.eml` → `4711`.
fn uid_for(path: &Path) -> anyhow::Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(String::from)
        .with_context(|| format!("cannot derive a UID from {}", path.display()))
}

fn cmd_ingest(
    config: Config,
    files: &[PathBuf],
    uid: Option<String>,
    options: IngestOptions,
) -> anyhow::Result<()> {
    if uid.is_some() && files.len() != 1 {
        anyhow::bail!("--uid needs exactly one file");
    }

    let mut processed = ProcessedSet::load(config.archive.processed_path())?;
    let mut assembler = RecordAssembler::new(config);

    let pb = progress_bar(files.len(), "Archiving")?;
    let start = Instant::now();
    let (mut written, mut skipped, mut failed) = (0usize, 0usize, 0usize);

    for path in files {
        let uid = match &uid {
            Some(uid) => uid.clone(),
            None => uid_for(path)?,
        };
        pb.set_message(uid.clone());

        let result = read_eml(path).and_then(|raw| assembler.ingest(&uid, &raw, &mut processed, options));
        match result {
            Ok(Outcome::Written(_)) => {
                written += 1;
                processed.persist()?;
            }
            Ok(Outcome::AlreadyProcessed | Outcome::Personal) => skipped += 1,
            Err(e) => {
                tracing::warn!(uid = %uid, path = %path.display(), error = %e, "Message not archived");
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "{written} archived, {skipped} skipped, {failed} failed in {:.2?}",
        start.elapsed()
    );
    Ok(())
}

fn cmd_replay(config: Config, uids: Vec<String>) -> anyhow::Result<()> {
    let mut assembler = RecordAssembler::new(config);
    let uids = if uids.is_empty() {
        assembler.raw_store().uids()?
    } else {
        uids
    };

    let pb = progress_bar(uids.len(), "Replaying")?;
    let report = assembler.replay(&uids, |uid| {
        pb.set_message(uid.to_string());
        pb.inc(1);
    });
    pb.finish_and_clear();

    println!(
        "{} rebuilt ({} images), {} missing, {} failed",
        report.written, report.images, report.missing, report.failed
    );
    Ok(())
}

fn cmd_show(config: Config, uid: &str, json: bool) -> anyhow::Result<()> {
    let record = RecordStore::new(config.archive.content_path())
        .read(uid)?
        .with_context(|| format!("no record for UID {uid}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

fn print_record(record: &ProcessedRecord) {
    println!("UID:      {}", record.uid);
    println!("From:     {}", record.from);
    println!("To:       {}", record.to);
    if !record.cc.is_empty() {
        println!("Cc:       {}", record.cc);
    }
    println!("Date:     {}", record.date);
    println!("Subject:  {}", record.subject);
    for name in &record.attachments {
        println!("Attached: {name}");
    }
    for path in &record.images {
        println!("Image:    {}", path.display());
    }
    for issue in &record.issues {
        println!("Issue:    {issue}");
    }
    for text in &record.text_contents {
        println!("\n{}", text.trim_end());
    }
    if record.text_contents.is_empty() && !record.html_contents.is_empty() {
        println!("\n({} HTML part(s), use --json to see them)", record.html_contents.len());
    }
}

fn cmd_config(config: &Config, write: bool) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if write {
        mailkeep::config::save_config(config)?;
        if let Some(path) = mailkeep::config::config_file_path() {
            eprintln!("Saved to {}", path.display());
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailkeep", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
