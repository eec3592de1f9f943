//! Nudge: reminder scheduling daemon
//!
//! Main binary with subcommands:
//! - `run`: Notifier loop over a reminder store
//! - `add`, `list`, `remove`: Manage reminders in a store
//! - `preview`: Show upcoming triggers for a recurrence without storing it

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod daemon;
mod reminders;

use reminders::{PatternArgs, TimingArgs};

#[derive(Parser)]
#[command(name = "nudge")]
#[command(about = "Recurring reminder scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the notifier loop until interrupted
    Run {
        /// Reminder store (JSON file)
        #[arg(long, env = "NUDGE_STORE", default_value = "reminders.json")]
        store: PathBuf,

        /// Seconds between sweeps
        #[arg(long, env = "NUDGE_POLL_INTERVAL", default_value = "900")]
        poll_interval: u64,

        /// POST fired reminders here instead of logging them
        #[arg(long, env = "NUDGE_WEBHOOK_URL")]
        webhook_url: Option<String>,

        /// Zone whose midnight sweep alignment counts from (default: server local time)
        #[arg(long, env = "NUDGE_ALIGN_ZONE")]
        align_zone: Option<String>,

        /// Start sweeping immediately instead of on the next interval boundary
        #[arg(long)]
        no_align: bool,
    },

    /// Add a reminder to the store
    Add {
        /// Reminder store (JSON file)
        #[arg(long, env = "NUDGE_STORE", default_value = "reminders.json")]
        store: PathBuf,

        /// Chat user who receives the reminder
        #[arg(long)]
        user: i64,

        /// Text to deliver
        #[arg(long)]
        message: String,

        #[command(flatten)]
        timing: TimingArgs,

        #[command(subcommand)]
        pattern: PatternArgs,
    },

    /// List reminders in the store
    List {
        /// Reminder store (JSON file)
        #[arg(long, env = "NUDGE_STORE", default_value = "reminders.json")]
        store: PathBuf,

        /// Only show this user's reminders
        #[arg(long)]
        user: Option<i64>,

        /// Include finished reminders
        #[arg(long)]
        all: bool,
    },

    /// Remove a reminder from the store
    Remove {
        /// Reminder store (JSON file)
        #[arg(long, env = "NUDGE_STORE", default_value = "reminders.json")]
        store: PathBuf,

        /// Reminder id
        id: Uuid,
    },

    /// Recompute a stalled or stuck reminder's next trigger
    Reschedule {
        /// Reminder store (JSON file)
        #[arg(long, env = "NUDGE_STORE", default_value = "reminders.json")]
        store: PathBuf,

        /// Reminder id
        id: Uuid,
    },

    /// Show the next triggers of a recurrence
    Preview {
        /// Number of triggers to show
        #[arg(long, short = 'n', default_value = "5")]
        count: usize,

        #[command(flatten)]
        timing: TimingArgs,

        #[command(subcommand)]
        pattern: PatternArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "nudge=info,nudge_scheduler=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            store,
            poll_interval,
            webhook_url,
            align_zone,
            no_align,
        } => {
            daemon::run(daemon::DaemonConfig {
                store,
                poll_interval,
                webhook_url,
                align_zone,
                align: !no_align,
            })
            .await
        }

        Commands::Add {
            store,
            user,
            message,
            timing,
            pattern,
        } => reminders::add(&store, user, message, &timing, &pattern).await,

        Commands::List { store, user, all } => reminders::list(&store, user, all).await,

        Commands::Remove { store, id } => reminders::remove(&store, id).await,

        Commands::Reschedule { store, id } => reminders::reschedule(&store, id).await,

        Commands::Preview {
            count,
            timing,
            pattern,
        } => reminders::preview(&timing, &pattern, count),
    }
}
