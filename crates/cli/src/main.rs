//! DryScan CLI — command-line duplicate-code analysis.
//!
//! Calls `dryscan-core` directly; this binary is a thin presentation layer
//! over `init`/`updateIndex`/`findDuplicates`/`applyExclusionFromLatestReport`/
//! `cleanExclusions`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dryscan_core::config::ConfigCache;
use dryscan_core::{DryScanApp, HttpEmbeddingClient};

/// DryScan — semantic code-duplication analysis from the terminal.
#[derive(Parser)]
#[command(name = "dryscan", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index for a repository from scratch
    Init {
        /// Repository root (default: current directory)
        path: Option<PathBuf>,
    },
    /// Incrementally re-index changed files
    Update {
        /// Repository root (default: current directory)
        path: Option<PathBuf>,
    },
    /// Find and report duplicate pairs
    Dupes {
        /// Repository root (default: current directory)
        path: Option<PathBuf>,

        /// Print results instead of just writing the report artifact
        #[arg(long)]
        pretty: bool,

        /// Apply the exclusion for a short id returned by a previous scan
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Prune excludedPairs entries that no longer match any live pair
    Clean {
        /// Repository root (default: current directory)
        path: Option<PathBuf>,
    },
}

fn resolve_root(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| std::env::current_dir().expect("could not determine current directory"))
        .canonicalize()
        .expect("path not found")
}

async fn open_app(root: &std::path::Path) -> dryscan_core::Result<DryScanApp> {
    let config = ConfigCache::new().load(root)?;
    let embedder = HttpEmbeddingClient::new(&config.embedding_source, config.context_length)?;
    DryScanApp::open(root, Box::new(embedder))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("dryscan=info".parse().unwrap()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            let root = resolve_root(path);
            let app = open_app(&root).await.unwrap_or_else(|e| fail(&e));
            let summary = app.init().await.unwrap_or_else(|e| fail(&e));
            print_summary(&summary, cli.json);
        }
        Commands::Update { path } => {
            let root = resolve_root(path);
            let app = open_app(&root).await.unwrap_or_else(|e| fail(&e));
            let summary = app.update_index().await.unwrap_or_else(|e| fail(&e));
            print_summary(&summary, cli.json);
        }
        Commands::Dupes { path, pretty, exclude } => {
            let root = resolve_root(path);
            let app = open_app(&root).await.unwrap_or_else(|e| fail(&e));

            if let Some(short_id) = exclude {
                let outcome = app.apply_exclusion_from_latest_report(&short_id).unwrap_or_else(|e| fail(&e));
                if cli.json {
                    println!("{}", serde_json::json!({ "exclusion": outcome.exclusion, "added": outcome.added }));
                } else if outcome.added {
                    println!("excluded: {}", outcome.exclusion);
                } else {
                    println!("already excluded: {}", outcome.exclusion);
                }
                return;
            }

            let report = app.find_duplicates_and_report().unwrap_or_else(|e| fail(&e));
            if pretty {
                println!(
                    "score: {:.1} ({})  groups: {}  total lines: {}",
                    report.score.score, report.score.grade, report.score.duplicate_groups, report.score.total_lines
                );
                for group in &report.duplicates {
                    println!(
                        "  [{}] {:.2}  {} ({}:{}-{})  <->  {} ({}:{}-{})",
                        group.short_id,
                        group.similarity,
                        group.left.name,
                        group.left.file_path,
                        group.left.start_line,
                        group.left.end_line,
                        group.right.name,
                        group.right.file_path,
                        group.right.start_line,
                        group.right.end_line,
                    );
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            }
        }
        Commands::Clean { path } => {
            let root = resolve_root(path);
            let app = open_app(&root).await.unwrap_or_else(|e| fail(&e));
            let result = app.clean_exclusions().unwrap_or_else(|e| fail(&e));
            if cli.json {
                println!("{}", serde_json::json!({ "kept": result.kept, "removed": result.removed }));
            } else {
                println!("kept: {}  removed: {}", result.kept, result.removed);
            }
        }
    }
}

fn print_summary(summary: &dryscan_core::UpdateSummary, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "added": summary.added,
                "changed": summary.changed,
                "deleted": summary.deleted,
                "unchanged": summary.unchanged,
            })
        );
    } else {
        println!("added: {}  changed: {}  deleted: {}  unchanged: {}", summary.added, summary.changed, summary.deleted, summary.unchanged);
    }
}

fn fail(err: &dryscan_core::DryError) -> ! {
    eprintln!("dryscan: {err}");
    std::process::exit(1);
}
