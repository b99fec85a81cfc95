mod bookmarks;
mod fetch;
mod pattern;
mod report;
mod scan;
mod state;

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand};

const DEFAULT_STATE_PATH: &str = "leaderboard_state.json";

#[derive(Parser)]
#[command(name = "lb_watch", about = "Track model names across leaderboard pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the bookmarked leaderboards and report changes
    Check {
        /// Exported browser bookmarks (Netscape HTML format)
        bookmarks: PathBuf,
        /// Model name to look for (repeatable)
        #[arg(short, long, required = true)]
        model: Vec<String>,
        /// Force the rendered (browser) fetch for every URL
        #[arg(long)]
        dynamic: bool,
        /// Bookmarks folder holding the leaderboard URLs
        #[arg(long, default_value = bookmarks::DEFAULT_FOLDER)]
        folder: String,
        /// Snapshot file used to diff runs against each other
        #[arg(long, default_value = DEFAULT_STATE_PATH)]
        state: PathBuf,
    },
    /// Show the persisted snapshot without fetching anything
    Status {
        #[arg(long, default_value = DEFAULT_STATE_PATH)]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            bookmarks: bookmarks_path,
            model,
            dynamic,
            folder,
            state: state_path,
        } => {
            // An unreadable bookmarks file is fatal: no URLs, nothing to do.
            let urls = bookmarks::load_folder(&bookmarks_path, &folder)?;
            if urls.is_empty() {
                println!("Folder {:?} has no bookmarks; nothing to scan.", folder);
                return Ok(());
            }

            let patterns = pattern::build_patterns(&model)?;
            let fetcher = fetch::Fetcher::new(fetch::FetchConfig::default())?;

            println!(
                "Checking {} URLs for {} model names...",
                urls.len(),
                patterns.len()
            );
            let scans = scan::scan_all(&fetcher, &urls, &patterns, dynamic).await;

            let prior = state::load(&state_path);
            let (next, diff) = state::merge(&prior, &scans, Utc::now());
            state::save(&next, &state_path)?;

            print!("{}", report::render(&scans, &diff));
        }
        Commands::Status { state: state_path } => {
            let snapshot = state::load(&state_path);
            if snapshot.urls.is_empty() {
                println!(
                    "No snapshot at {} yet. Run 'check' first.",
                    state_path.display()
                );
                return Ok(());
            }
            print!("{}", report::render_state(&snapshot));
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
