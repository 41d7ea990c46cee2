use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mhunt_core::RunMode;
use mhunt_sources::{SourceCatalog, SourceSelector};
use mhunt_sync::{CronDriver, HuntConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "mhunt")]
#[command(about = "Mission Hunter: scheduled freelance opportunity hunting")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one hunt for every active user.
    Run {
        #[arg(long, default_value = "daily")]
        mode: RunMode,
    },
    /// Hunt for a single user now.
    Hunt {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value = "daily")]
        mode: RunMode,
    },
    /// Start the cron triggers and wait for ctrl-c.
    Schedule,
    Migrate,
    /// Show which sites a profile text would be pointed at.
    Sources {
        #[arg(long)]
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Schedule) {
        Commands::Run { mode } => {
            let runtime = mhunt_sync::runtime_from_env().await?;
            match runtime.scheduler.run_guarded(mode).await {
                Some(report) => println!(
                    "hunt complete: run_id={} mode={} considered={} skipped={} processed={} failed={} missions={}",
                    report.run_id,
                    report.mode,
                    report.users_considered,
                    report.users_skipped,
                    report.users_processed,
                    report.errors.len(),
                    report.missions_found
                ),
                None => println!("a {mode} hunt is already running"),
            }
        }
        Commands::Hunt { user, mode } => {
            let runtime = mhunt_sync::runtime_from_env().await?;
            let outcome = runtime
                .pipeline()
                .hunt_user_by_id(user, mode)
                .await
                .with_context(|| format!("hunting for user {user}"))?;
            println!(
                "user hunt complete: candidates={} accepted={} rejected={} duplicates={} created={}",
                outcome.candidates, outcome.accepted, outcome.rejected, outcome.duplicates, outcome.created
            );
        }
        Commands::Schedule => {
            let runtime = mhunt_sync::runtime_from_env().await?;
            let Some(mut sched) = CronDriver::maybe_start(
                runtime.config.scheduler_enabled,
                runtime.scheduler.clone(),
                &runtime.config.crons,
            )
            .await?
            else {
                tracing::warn!("HUNT_SCHEDULER_ENABLED is off; nothing to schedule");
                return Ok(());
            };
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            tracing::info!("shutting down scheduler");
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::Migrate => {
            let runtime = mhunt_sync::runtime_from_env().await?;
            runtime.store.migrate().await?;
            println!("migrations applied");
        }
        Commands::Sources { role } => {
            let config = HuntConfig::from_env();
            let selector = SourceSelector::new(SourceCatalog::load_or_fallback(&config.catalog_path));
            let niches: Vec<&str> = SourceSelector::matching_niches(&role)
                .iter()
                .map(|bucket| bucket.key())
                .collect();
            println!("niches: {}", if niches.is_empty() { "-".to_string() } else { niches.join(", ") });
            for site in selector.select(&role) {
                println!("{site}");
            }
        }
    }

    Ok(())
}
