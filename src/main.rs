use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use followgrid::bulk_mode::WatchBulkMode;
use followgrid::config::Settings;
use followgrid::mutator::ConfirmGate;
use followgrid::projector::DisplayItem;
use followgrid::topic::TopicStatus;
use followgrid::util::{fit_column, parse_origin, strip_control_chars};
use followgrid::{
    BatchOperation, EventSink, GridController, GridError, GridEvent, HttpForumApi, Topic,
    TopicId,
};

/// Get the config directory path (~/.config/followgrid/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("followgrid"))
}

/// Atomically replace `dst` with `content` using write-to-temp-then-rename.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temporary file '{}'", temp_path.display()))?;

    temp_file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to write temporary file '{}'", temp_path.display())
    })?;
    temp_file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to sync temporary file '{}'", temp_path.display())
    })?;
    drop(temp_file);

    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!("Failed to remove existing '{}'", dst.display())
        })?;
    }

    std::fs::rename(&temp_path, dst).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            dst.display()
        )
    })
}

// ============================================================================
// Topic File
// ============================================================================

/// Accepts a bare array or the forum's `{"topic_list": {"topics": [...]}}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TopicFile {
    Bare(Vec<Topic>),
    Wrapped { topic_list: TopicList },
}

#[derive(Deserialize)]
struct TopicList {
    #[serde(default)]
    topics: Vec<Topic>,
}

fn load_topics(path: &Path) -> Result<Vec<Topic>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read topics file: {}", path.display()))?;
    let parsed: TopicFile = serde_json::from_str(&content)
        .with_context(|| format!("Topics file is not a topic list: {}", path.display()))?;
    Ok(match parsed {
        TopicFile::Bare(topics) => topics,
        TopicFile::Wrapped { topic_list } => topic_list.topics,
    })
}

fn save_topics(path: &Path, topics: &[Topic]) -> Result<()> {
    let json = serde_json::to_vec_pretty(topics).context("Failed to serialize topics")?;
    atomic_write(path, &json)
}

// ============================================================================
// Confirmation
// ============================================================================

/// Asks on stdin unless `--yes` was given.
struct StdinConfirm {
    assume_yes: bool,
}

impl ConfirmGate for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{} [y/N] ", prompt);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match reader.read_line(&mut line).await {
            Ok(_) => matches!(line.trim(), "y" | "Y" | "yes" | "YES"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read confirmation, treating as no");
                false
            }
        }
    }
}

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "followgrid", about = "Followed-topics grid with bulk actions")]
struct Args {
    /// Settings file (defaults to ~/.config/followgrid/settings.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Topic list JSON, rewritten in place after changes
    #[arg(long, value_name = "FILE")]
    topics: PathBuf,

    /// Forum origin, overriding the settings file
    #[arg(long, value_name = "URL")]
    origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the projected grid
    Render {
        /// Show selection checkboxes
        #[arg(long)]
        bulk: bool,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Toggle the vote on one topic
    Vote { id: TopicId },
    /// Apply a batch operation to the given topics
    Bulk {
        /// follow, unfollow, close, archive, unlist, delete, reset-bump-date
        #[arg(value_parser = parse_operation)]
        operation: BatchOperation,
        #[arg(required = true)]
        ids: Vec<TopicId>,
        /// Skip the delete confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Change one status flag on one topic
    Status {
        id: TopicId,
        #[arg(value_parser = parse_status)]
        status: TopicStatus,
        /// on or off
        #[arg(value_parser = parse_switch)]
        enabled: Switch,
    },
    /// Delete one topic
    Delete {
        id: TopicId,
        #[arg(long)]
        yes: bool,
    },
    /// Print (or open) a topic's URL
    Visit {
        id: TopicId,
        /// Open in the default browser
        #[arg(long)]
        open: bool,
    },
}

fn parse_operation(s: &str) -> Result<BatchOperation, String> {
    BatchOperation::from_name(s).ok_or_else(|| {
        let names: Vec<&str> = BatchOperation::ALL.iter().map(|op| op.name()).collect();
        format!("unknown operation '{}' (expected one of: {})", s, names.join(", "))
    })
}

fn parse_status(s: &str) -> Result<TopicStatus, String> {
    match s {
        "closed" => Ok(TopicStatus::Closed),
        "archived" => Ok(TopicStatus::Archived),
        "visible" => Ok(TopicStatus::Visible),
        "pinned" => Ok(TopicStatus::Pinned),
        other => Err(format!(
            "unknown status '{}' (expected closed, archived, visible, pinned)",
            other
        )),
    }
}

#[derive(Debug, Clone, Copy)]
struct Switch(bool);

fn parse_switch(s: &str) -> Result<Switch, String> {
    match s {
        "on" | "true" | "1" => Ok(Switch(true)),
        "off" | "false" | "0" => Ok(Switch(false)),
        other => Err(format!("expected on/off, got '{}'", other)),
    }
}

// ============================================================================
// Output
// ============================================================================

fn print_table(items: &[DisplayItem]) {
    for item in items {
        let checkbox = match (item.show_checkbox, item.selected) {
            (false, _) => "",
            (true, true) => "[x] ",
            (true, false) => "[ ] ",
        };
        let tags: Vec<&str> = item.tags.iter().map(|t| t.name.as_str()).collect();
        println!(
            "{}{:>6}  {}  {}  {:>4} {}  {}  {}",
            checkbox,
            item.id,
            fit_column(&strip_control_chars(&item.title), 40),
            fit_column(&strip_control_chars(&item.category_name), 14),
            item.vote_count,
            fit_column(&item.vote_label, 9),
            fit_column(&item.username, 14),
            tags.join(", ")
        );
    }
}

/// Print action errors the grid does not emit as events.
fn report_failure(err: &GridError) {
    // Remote failures already arrive as GridEvent::Error.
    if let GridError::UnknownTopic(_) = err {
        eprintln!("Error: {}", err);
    }
}

/// Report queued grid events. Returns whether a reload was requested.
fn drain_events(rx: &mut UnboundedReceiver<GridEvent>, origin: &url::Url, open: bool) -> bool {
    let mut reload = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            GridEvent::Navigate { url } => {
                let absolute = origin
                    .join(&url)
                    .map(String::from)
                    .unwrap_or_else(|_| url.clone());
                println!("{}", absolute);
                if open {
                    if let Err(e) = open::that(&absolute) {
                        eprintln!("Error: failed to open browser: {}", e);
                    }
                }
            }
            GridEvent::Error { message } => eprintln!("Error: {}", message),
            GridEvent::Notice { message } => println!("{}", message),
            GridEvent::ReloadRequested => reload = true,
        }
    }
    reload
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(p) => p.clone(),
        None => get_config_dir()?.join("settings.toml"),
    };
    let mut settings = Settings::load(&config_path)
        .with_context(|| format!("Failed to load settings: {}", config_path.display()))?;
    if let Some(origin) = &args.origin {
        settings.origin = origin.clone();
    }
    let origin = parse_origin(&settings.origin).context("Invalid forum origin")?;

    let http_client = reqwest::Client::builder()
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;
    let mut api =
        HttpForumApi::new(http_client, origin.clone()).with_timeout(settings.request_timeout());
    if let Some(key) = settings.api_key_secret() {
        api = api.with_credentials(key, settings.api_username.clone());
    } else {
        tracing::debug!("No API key configured, sending unauthenticated requests");
    }

    let topics = load_topics(&args.topics)?;
    tracing::info!(count = topics.len(), "Loaded topics");

    let (assume_yes, bulk) = match &args.command {
        Command::Bulk { yes, .. } => (*yes, true),
        Command::Delete { yes, .. } => (*yes, false),
        Command::Render { bulk, .. } => (false, *bulk),
        _ => (false, false),
    };
    let signal = WatchBulkMode::new(bulk);
    let (sink, mut rx) = EventSink::channel();
    let mut grid = GridController::new(
        settings,
        origin.clone(),
        api,
        StdinConfirm { assume_yes },
        &signal,
        sink,
    );
    grid.replace_topics(topics);

    let mut deleted: HashSet<TopicId> = HashSet::new();
    let mut changed = false;
    let mut failed = false;
    let mut open_urls = false;

    match args.command {
        Command::Render { json, .. } => {
            let items = grid.items();
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print_table(&items);
            }
        }
        Command::Vote { id } => match grid.toggle_vote(id).await {
            Ok(voted) => {
                println!("{} topic {}", if voted { "Followed" } else { "Unfollowed" }, id);
                changed = true;
            }
            Err(e) => {
                report_failure(&e);
                failed = true;
            }
        },
        Command::Bulk { operation, ids, .. } => {
            for id in grid.select_ids(ids) {
                eprintln!("Warning: topic {} is not in the topic list, skipping", id);
            }
            let outcome = grid.bulk_apply(operation).await;
            if outcome.aborted {
                println!("Cancelled.");
            }
            if outcome.reload_required {
                deleted.extend(outcome.succeeded.iter().copied());
            }
            changed = !outcome.succeeded.is_empty();
            failed = outcome.has_failures();
        }
        Command::Status {
            id,
            status,
            enabled,
        } => match grid.set_topic_status(id, status, enabled.0).await {
            Ok(()) => changed = true,
            Err(e) => {
                report_failure(&e);
                failed = true;
            }
        },
        Command::Delete { id, .. } => match grid.delete_topic(id).await {
            Ok(true) => {
                deleted.insert(id);
                changed = true;
            }
            Ok(false) => println!("Cancelled."),
            Err(e) => {
                report_failure(&e);
                failed = true;
            }
        },
        Command::Visit { id, open } => {
            open_urls = open;
            grid.visit(id);
        }
    }

    let reload = drain_events(&mut rx, &origin, open_urls);

    if changed {
        let mut topics = grid.into_topics();
        if reload {
            tracing::info!(removed = deleted.len(), "Reloading topic list after delete");
            topics.retain(|t| !deleted.contains(&t.id));
        }
        save_topics(&args.topics, &topics)?;
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}
