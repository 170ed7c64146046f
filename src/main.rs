use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use teamscope::config::{Command, Config, Settings};
use teamscope::shutdown::wait_for_shutdown_signal;
use teamscope::web::WebServer;
use teamscope_core::teams::validate_team_name;
use teamscope_core::TeamMonitor;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug);

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    let paths = settings.store_paths();
    tracing::debug!(
        "Store: teams={:?} tasks={:?}",
        paths.teams_dir,
        paths.tasks_dir
    );
    let monitor = TeamMonitor::new(paths);

    match cli.command() {
        Command::Serve => serve(settings, monitor).await,
        Command::Snapshot { team } => snapshot(&monitor, team.as_deref()).await,
    }
}

async fn serve(settings: Settings, monitor: TeamMonitor) -> Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    WebServer::new(settings, monitor).run(shutdown).await
}

/// One aggregation pass printed as pretty JSON
async fn snapshot(monitor: &TeamMonitor, team: Option<&str>) -> Result<()> {
    if let Some(team) = team {
        validate_team_name(team)?;
    }

    let mut snapshots = monitor
        .get_all_snapshots()
        .await
        .context("Failed to aggregate team store")?;
    if let Some(team) = team {
        snapshots.retain(|s| s.name() == team);
    }

    println!("{}", serde_json::to_string_pretty(&snapshots)?);
    Ok(())
}

fn setup_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("teamscope=debug,teamscope_core=debug")
        } else {
            EnvFilter::new("teamscope=info,teamscope_core=info")
        }
    });

    // Logs go to stderr so `snapshot` output stays clean JSON
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
