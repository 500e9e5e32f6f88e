//! slircd-permchan - permanent channel persistence daemon
//!
//! Loads the permanent channel snapshot into an in-memory channel registry
//! and keeps the snapshot current until interrupted.

use slircd_permchan::config::{Config, validation};
use slircd_permchan::metrics;
use slircd_permchan::permchan::PermChannels;
use slircd_permchan::permchan::gate::GateOutcome;
use slircd_permchan::permchan::scheduler::TickOutcome;
use slircd_permchan::state::{ChannelRegistry, ModeRegistry, StaticServerList};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = load_config(&config_path)?;

    info!(
        server = %config.server.name,
        filename = %config.permchanneldb.filename,
        "Starting slircd-permchan"
    );

    metrics::init();

    let mut registry = ChannelRegistry::new(config.server.name.clone(), ModeRegistry::with_defaults());
    let mut permchans = PermChannels::new(&config);
    permchans.install(&mut registry)?;

    let servers = StaticServerList(config.server.linked_servers);
    match permchans.on_collaborators_ready(&mut registry, &servers) {
        GateOutcome::Loaded(report) => info!(
            channels = registry.len(),
            created = report.created,
            "Permanent channels ready"
        ),
        GateOutcome::SkippedLinked { servers } => {
            info!(servers, "Starting without stored permanent channels")
        }
        GateOutcome::AlreadyFired => {}
    }

    let mut hangup = Hangup::new()?;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(permchans.interval()) => {
                if let TickOutcome::Failed { retry_in } = permchans.tick(&registry) {
                    warn!(retry_in = retry_in.as_secs(), "Permanent channel database is stale");
                }
            }
            _ = hangup.recv() => {
                info!(path = %config_path, "Rehashing");
                match load_config(&config_path) {
                    Ok(new_config) => permchans.reconfigure(&new_config, &mut registry),
                    Err(e) => error!(error = %e, "Rehash failed, keeping current config"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    // Flush pending changes before exit
    if let TickOutcome::Failed { .. } = permchans.tick(&registry) {
        error!("Exiting with unsaved permanent channel changes");
    }
    debug!(metrics = %metrics::gather_metrics(), "Final metrics");
    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let config = Config::load(path).map_err(|e| {
        error!(path = %path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {path}", errors.len());
    }
    Ok(config)
}

/// SIGHUP listener; never fires off unix.
#[cfg(unix)]
struct Hangup(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Hangup {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self(signal(SignalKind::hangup())?))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}
