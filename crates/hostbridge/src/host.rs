//! Wires the default collaborators to a [`HostBridge`] and serves it.

use std::sync::Arc;
use std::time::Duration;

use hostbridge_core::{FeedbackClient, ReleaseDelivery, ReleaseDeliveryConfig, ReleaseFeed};
use hostbridge_platform::AppPaths;
use hostbridge_shell::ShellProbe;
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bridge::{Collaborators, HostBridge};
use crate::lifecycle::{ChannelSink, ShutdownSignal};
use crate::settings::BridgeSettings;
use crate::transport;

const REQUEST_QUEUE: usize = 64;

fn update_http_client(timeout_secs: u64) -> reqwest::Client {
    let timeout = Duration::from_secs(timeout_secs);
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .unwrap_or_else(|error| {
            warn!("Falling back to default HTTP client for updates: {error}");
            reqwest::Client::new()
        })
}

fn release_delivery(paths: &AppPaths, settings: &BridgeSettings) -> ReleaseDelivery {
    let feed = settings
        .update_repo
        .as_deref()
        .map(str::trim)
        .filter(|repo| !repo.is_empty())
        .map(ReleaseFeed::github);

    ReleaseDelivery::new(
        update_http_client(settings.http_timeout_secs),
        ReleaseDeliveryConfig {
            feed,
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            staging_dir: paths.update_staging_dir(),
        },
    )
}

/// Serve the bridge over stdin/stdout until a quit is issued or stdin closes.
///
/// # Errors
/// Returns an error when writing to stdout fails.
pub async fn run_stdio(paths: &AppPaths, settings: &BridgeSettings) -> std::io::Result<()> {
    serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        paths,
        settings,
    )
    .await
}

/// Serve the bridge over an arbitrary line-oriented stream pair.
///
/// # Errors
/// Returns an error when writing to `writer` fails.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    paths: &AppPaths,
    settings: &BridgeSettings,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let shutdown = ShutdownSignal::new();
    let (push_tx, push_rx) = mpsc::unbounded_channel();

    let delivery = Arc::new(release_delivery(paths, settings));
    delivery.cleanup_stale_staging();

    let bridge = HostBridge::new(Collaborators {
        prober: Arc::new(ShellProbe::detect(Duration::from_secs(
            settings.shell_probe_timeout_secs,
        ))),
        feedback: Arc::new(FeedbackClient::new(
            reqwest::Client::new(),
            settings.api_base_url.clone(),
        )),
        updates: delivery.clone(),
        lifecycle: Arc::new(shutdown.clone()),
        ui: Arc::new(ChannelSink::new(push_tx)),
    });

    // Subscribed above, so no outcome of this check can be missed.
    if settings.auto_download_updates {
        let delivery = Arc::clone(&delivery);
        tokio::spawn(async move { delivery.check_and_download().await });
    } else {
        info!("Automatic update download disabled");
    }

    let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
    let done = CancellationToken::new();
    let bridge_done = done.clone();
    let bridge_task = async move {
        bridge.run(request_rx, shutdown.token()).await;
        bridge_done.cancel();
    };

    let ((), served) = tokio::join!(
        bridge_task,
        transport::serve(reader, writer, request_tx, push_rx, done)
    );
    served
}
