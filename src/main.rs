//! Command-line entry point for the Bed Wars rating engine
//!
//! Rebuilds ratings from an archive, applies newly completed matches to a
//! saved rating state, and prints leaderboards.

use anyhow::Result;
use bedwars_rating::archive::{load_archive, PlayerDirectory, StateSnapshot};
use bedwars_rating::config::AppConfig;
use bedwars_rating::metrics::MetricsCollector;
use bedwars_rating::rating::{
    global_leaderboard, mode_leaderboard, ApplyOutcome, InMemoryRatingStorage, LeaderboardEntry,
    MatchProcessor, RatingSeeder, ReplayDriver,
};
use bedwars_rating::service::LiveRatingService;
use bedwars_rating::Mode;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Bed Wars Rating Engine - multi-team Elo ratings from match archives
#[derive(Parser)]
#[command(
    name = "bedwars-rating",
    version,
    about = "Multi-team Elo rating engine for Bed Wars matches",
    long_about = "Computes per-mode player ratings from completed Bed Wars matches. Ratings can be \
                 rebuilt from a full match archive or updated incrementally as matches finish; \
                 both paths share the same classification, scoring and rating rules."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        global = true,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, global = true, help = "Enable debug mode with verbose logging")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild every rating from a match archive
    Replay {
        /// Match archive (JSON array or one record per line)
        archive: PathBuf,

        /// Where to write the rebuilt rating state
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Player directory with the legacy top-player set
        #[arg(long, value_name = "FILE")]
        directory: Option<PathBuf>,

        /// Number of stabilization passes
        #[arg(long)]
        passes: Option<u32>,

        /// Replay modes one after another instead of in parallel
        #[arg(long)]
        sequential: bool,

        /// Print Prometheus metrics when done
        #[arg(long)]
        metrics: bool,
    },

    /// Apply newly completed matches to a saved rating state
    Apply {
        /// Match records to apply, in completion order
        matches: PathBuf,

        /// Rating state file, created if missing
        #[arg(short, long, value_name = "FILE")]
        state: PathBuf,

        /// Player directory with the legacy top-player set
        #[arg(long, value_name = "FILE")]
        directory: Option<PathBuf>,
    },

    /// Print a leaderboard from a saved rating state
    Leaderboard {
        /// Rating state file
        state: PathBuf,

        /// Mode to rank; the global rating is used when omitted
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Player directory for display names
        #[arg(long, value_name = "FILE")]
        directory: Option<PathBuf>,
    },

    /// Validate configuration and exit
    CheckConfig,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Display startup banner with the active rating parameters
fn display_startup_banner(config: &AppConfig) {
    info!("🛏️  Bed Wars Rating Engine");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   K-factor: {} (Mega {})",
        config.rating.k_factor, config.rating.mega_k_factor
    );
    info!(
        "   Seeds: {} (legacy {})",
        config.rating.initial_rating, config.rating.legacy_initial_rating
    );
    info!(
        "   Replay: {} pass(es), carryover {}, parallel modes {}",
        config.replay.passes, config.replay.carryover_weight, config.replay.parallel_modes
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file, environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Command::Replay {
        passes, sequential, ..
    } = &args.command
    {
        if let Some(passes) = passes {
            config.replay.passes = *passes;
        }
        if *sequential {
            config.replay.parallel_modes = false;
        }
    }

    bedwars_rating::config::validate_config(&config)?;
    Ok(config)
}

fn load_directory(path: Option<&Path>) -> Result<PlayerDirectory> {
    match path {
        Some(path) => PlayerDirectory::load(path),
        None => Ok(PlayerDirectory::default()),
    }
}

fn run_replay(
    config: AppConfig,
    archive: &Path,
    output: &Path,
    directory: Option<&Path>,
    print_metrics: bool,
) -> Result<()> {
    let directory = load_directory(directory)?;
    let matches = load_archive(archive)?;
    let metrics = Arc::new(MetricsCollector::new()?);

    let driver = ReplayDriver::new(config)?
        .with_legacy_players(directory.legacy_players.iter().cloned())
        .with_metrics(metrics.clone());
    let result = driver.run(matches)?;

    if let Some(summary) = result.last_pass() {
        info!(
            "✅ Replay finished: {} applied, {} invalid, {} duplicates",
            summary.applied, summary.invalid, summary.duplicates
        );
        for (reason, count) in &summary.rejections {
            info!("   rejected {}: {}", reason, count);
        }
    }

    let snapshot = StateSnapshot {
        ledger: result.ledger,
        index: result.index,
    };
    snapshot.save(output)?;
    info!("Rating state written to {}", output.display());

    if print_metrics {
        print!("{}", metrics.gather_text()?);
    }

    Ok(())
}

async fn run_apply(
    config: AppConfig,
    matches: &Path,
    state: &Path,
    directory: Option<&Path>,
) -> Result<()> {
    let directory = load_directory(directory)?;
    let records = load_archive(matches)?;
    let snapshot = StateSnapshot::load_or_default(state)?;

    let capacity = config.service.live_queue_capacity;
    let seeder = RatingSeeder::new(&config.rating)
        .with_legacy_players(directory.legacy_players.iter().cloned());
    let storage = Arc::new(InMemoryRatingStorage::from_snapshot(snapshot.ledger));
    let processor = MatchProcessor::new(config, storage)?
        .with_index(snapshot.index)
        .with_seeder(seeder);

    let (handle, task) = LiveRatingService::spawn(processor, capacity);

    let mut applied = 0usize;
    let mut failure = None;
    for record in records {
        let match_id = record.id.clone();
        match handle.submit(record).await {
            Ok(ApplyOutcome::Applied(report)) => {
                applied += 1;
                info!("✅ {} applied ({})", match_id, report.mode);
                for change in &report.applied {
                    info!(
                        "   {}: {:.1} -> {:.1}",
                        directory.display_name(&change.player_id),
                        change.previous_rating,
                        change.new_rating
                    );
                }
            }
            Ok(ApplyOutcome::AlreadyApplied) => info!("{} already applied, skipped", match_id),
            Ok(ApplyOutcome::OutOfOrder { latest, received }) => warn!(
                "{} at {} is older than the latest applied match at {}, skipped",
                match_id, received, latest
            ),
            Ok(ApplyOutcome::Invalid(reason)) => info!("{} not rated: {}", match_id, reason),
            Err(e) => {
                error!("Failed to apply {}: {}", match_id, e);
                failure = Some(e);
                break;
            }
        }
    }

    // Everything applied so far is consistent with the index, so it is saved
    // even when a later match failed.
    if applied > 0 {
        let snapshot = handle.snapshot().await?;
        snapshot.save(state)?;
        info!("Rating state written to {} ({} matches applied)", state.display(), applied);
    }

    drop(handle);
    task.await?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_leaderboard(rows: &[LeaderboardEntry], directory: &PlayerDirectory) {
    for row in rows {
        println!(
            "{:>4}. {:<24} {:>7.1}  {:>5} games  {:>5.1}% wins",
            row.rank,
            directory.display_name(&row.player_id),
            row.rating,
            row.games_played,
            row.win_rate * 100.0
        );
    }
}

fn run_leaderboard(
    state: &Path,
    mode: Option<Mode>,
    limit: usize,
    directory: Option<&Path>,
) -> Result<()> {
    let directory = load_directory(directory)?;
    let snapshot = StateSnapshot::load(state)?;

    let mut rows = match mode {
        Some(mode) => mode_leaderboard(&snapshot.ledger.states, mode),
        None => global_leaderboard(&snapshot.ledger.states),
    };
    rows.truncate(limit);

    print_leaderboard(&rows, &directory);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match args.command {
        Command::CheckConfig => {
            display_startup_banner(&config);
            info!("Configuration validation successful");
            Ok(())
        }
        Command::Replay {
            archive,
            output,
            directory,
            metrics,
            ..
        } => {
            display_startup_banner(&config);
            // Replay is CPU-bound; keep it off the async workers
            tokio::task::spawn_blocking(move || {
                run_replay(config, &archive, &output, directory.as_deref(), metrics)
            })
            .await?
        }
        Command::Apply {
            matches,
            state,
            directory,
        } => run_apply(config, &matches, &state, directory.as_deref()).await,
        Command::Leaderboard {
            state,
            mode,
            limit,
            directory,
        } => run_leaderboard(&state, mode, limit, directory.as_deref()),
    }
}
