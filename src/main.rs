use devproxy::config::Config;
use devproxy::discovery::ConfigDiscovery;
use devproxy::proxy::{DestinationResolver, ResolvedDestinations, cancellation};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Delay before retrying a failed resolution pass
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let policy = cfg.scheme_policy();
    let discovery = Arc::new(ConfigDiscovery::new(cfg.services.clone(), policy.clone()));
    let resolver = DestinationResolver::new(discovery.clone(), policy);
    let destination_override = cfg.destination_override();

    let (cancel_source, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            cancel_source.cancel();
        }
    });

    spawn_reload_on_hangup(discovery)?;

    let Some(first) = resolver
        .try_resolve(&cfg.destinations, destination_override.as_ref(), &cancel)
        .await
    else {
        tracing::info!("Cancelled before destinations were resolved");
        return Ok(());
    };
    let mut current = first?;
    log_destinations(&current);

    // Set when the last pass failed; the previous result stays in use.
    let mut stale = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = current.change_token.changed(), if !stale => {
                tracing::info!("Discovery changed, re-resolving destinations");
            }
            _ = tokio::time::sleep(RETRY_DELAY), if stale => {
                tracing::info!("Retrying destination resolution");
            }
        }

        let next = resolver
            .try_resolve(&cfg.destinations, destination_override.as_ref(), &cancel)
            .await;

        match next {
            Some(Ok(next)) => {
                current = next;
                stale = false;
                log_destinations(&current);
            }
            Some(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    destinations = current.len(),
                    "Resolution failed, keeping last known destinations"
                );
                stale = true;
            }
            None => break,
        }
    }

    Ok(())
}

fn log_destinations(resolved: &ResolvedDestinations) {
    let mut names: Vec<_> = resolved.destinations.keys().collect();
    names.sort();

    for name in names {
        let destination = &resolved.destinations[name];
        tracing::info!(
            destination = %name,
            address = %destination.address,
            host = ?destination.host,
            health = ?destination.health,
            "Destination"
        );
    }
}

/// Reload the service table from the configuration file on SIGHUP
#[cfg(unix)]
fn spawn_reload_on_hangup(discovery: Arc<ConfigDiscovery>) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match Config::load() {
                Ok(cfg) => discovery.update(cfg.services).await,
                Err(e) => tracing::warn!(error = %e, "Failed to reload configuration"),
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_discovery: Arc<ConfigDiscovery>) -> anyhow::Result<()> {
    Ok(())
}
