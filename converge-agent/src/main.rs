//! converge-agent: reconciliation loop for a desired-state manifest.
//!
//! Runs the convergence engine against a simulated remote API:
//! - Loads a JSON manifest of resource specs, owners first
//! - Runs passes until every resource converges or fails terminally
//! - Persists pending operations and conditions to a status file after
//!   every pass, so a restarted agent resumes polling instead of
//!   reissuing mutations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use converge::remote::memory::MemoryRemote;
use converge::{ConvergenceDriver, DriverConfig, PassRunner, StatusFile};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod agent;

use agent::{Agent, Finish};

/// Convergence agent
#[derive(Parser, Debug)]
#[command(name = "converge-agent", version, about)]
struct Args {
    /// Manifest of resource specs (JSON list tagged by "kind")
    #[arg(long)]
    manifest: PathBuf,

    /// Status file holding pending operations and conditions
    #[arg(long, default_value = "converge-status.json")]
    status_file: PathBuf,

    /// Abandon pending operations older than this many seconds
    #[arg(long, default_value = "1800")]
    staleness_secs: u64,

    /// Seconds to wait between passes while work is pending
    #[arg(long, default_value = "15")]
    requeue_secs: u64,

    /// Per-call timeout in seconds (0 disables it)
    #[arg(long, default_value = "12")]
    call_timeout_secs: u64,

    /// Stop after this many passes even if not converged
    #[arg(long)]
    max_passes: Option<u32>,

    /// Polls before a simulated operation completes (0 = synchronous)
    #[arg(long, default_value = "2")]
    sim_poll_rounds: u32,

    /// Owner known to exist outside the manifest (repeatable)
    #[arg(long = "external-owner")]
    external_owners: Vec<String>,

    /// Delete the manifest's resources instead of converging them
    #[arg(long)]
    delete: bool,
}

impl Args {
    fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            staleness_bound: Duration::from_secs(self.staleness_secs),
            requeue_after: Duration::from_secs(self.requeue_secs),
            call_timeout: (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs)),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "converge=info,converge_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.driver_config();

    info!("Starting converge-agent");
    info!("Manifest: {}", args.manifest.display());
    info!(
        "Staleness bound {:?}, requeue {:?}, call timeout {:?}",
        config.staleness_bound, config.requeue_after, config.call_timeout
    );

    let specs = agent::load_manifest(&args.manifest).await?;
    let remote = Arc::new(MemoryRemote::with_async_polls(args.sim_poll_rounds));
    let runner = PassRunner::new(ConvergenceDriver::new(remote, config)).with_external_owners(args.external_owners);

    let agent = Agent::new(runner, specs, StatusFile::new(&args.status_file))
        .max_passes(args.max_passes)
        .deleting(args.delete);

    match agent.run().await? {
        Finish::Converged => Ok(()),
        Finish::PassLimit => {
            info!("Pending work remains; rerun to resume from {}", args.status_file.display());
            Ok(())
        }
        Finish::Failed(count) => bail!("{} resources failed; see {}", count, args.status_file.display()),
    }
}
