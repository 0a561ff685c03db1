//! Chat platform adapters and the inbound command runtime.
//!
//! Adapters implement [`traits::ChatPlatform`] for outbound calls and
//! [`traits::ChannelAdapter`] for their receive loop. The runtime keeps the
//! adapter connected and answers every inbound command in order.

pub mod discord;
pub mod memory;
pub mod traits;

use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage};
use crate::commands::CommandServices;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

const INBOUND_QUEUE_SIZE: usize = 64;
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Handle for the spawned channels runtime.
pub struct ChannelRuntimeHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl ChannelRuntimeHandle {
    /// Request shutdown and wait for the runtime to stop.
    pub async fn shutdown(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Spawn the runtime on the current tokio runtime.
pub fn start_runtime(
    adapter: Arc<dyn ChannelAdapter>,
    services: CommandServices,
    reconnect_delay: Duration,
) -> ChannelRuntimeHandle {
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        tokio::select! {
            result = run_runtime(adapter, services, reconnect_delay) => {
                if let Err(err) = result {
                    tracing::error!("channels runtime failed: {err}");
                }
            }
            _ = stop_rx => {
                tracing::info!("channels runtime stopping");
            }
        }
    });
    ChannelRuntimeHandle {
        stop_tx: Some(stop_tx),
        task,
    }
}

/// Keep `adapter` connected and answer its commands until the inbound
/// channel closes.
///
/// # Errors
/// Returns an error when the adapter worker exits unexpectedly.
pub async fn run_runtime(
    adapter: Arc<dyn ChannelAdapter>,
    services: CommandServices,
    reconnect_delay: Duration,
) -> anyhow::Result<()> {
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<ChannelInboundMessage>(INBOUND_QUEUE_SIZE);

    let mut workers = JoinSet::new();
    {
        let adapter = Arc::clone(&adapter);
        workers.spawn(async move {
            keep_connected(adapter, inbound_tx, reconnect_delay).await;
        });
    }
    tracing::info!(platform = adapter.id(), "channels runtime started");

    while let Some(message) = inbound_rx.recv().await {
        let Some(reply) = services.handle_message(&message).await else {
            continue;
        };
        if let Err(err) = adapter.send_message(&message.reply_target, &reply).await {
            tracing::warn!(
                platform = adapter.id(),
                target = %message.reply_target,
                "failed to send command reply: {err}"
            );
        }
    }

    workers.abort_all();
    while workers.join_next().await.is_some() {}
    Ok(())
}

/// Run the adapter's receive loop forever, backing off between failures.
async fn keep_connected(
    adapter: Arc<dyn ChannelAdapter>,
    inbound_tx: mpsc::Sender<ChannelInboundMessage>,
    reconnect_delay: Duration,
) {
    let base_delay = reconnect_delay.max(Duration::from_millis(1));
    let mut delay = base_delay;
    loop {
        match adapter.run(inbound_tx.clone()).await {
            Ok(()) => {
                tracing::warn!(platform = adapter.id(), "channel stopped; restarting");
                delay = base_delay;
            }
            Err(err) => {
                tracing::warn!(
                    platform = adapter.id(),
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "channel failed: {err}"
                );
            }
        }
        if inbound_tx.is_closed() {
            return;
        }
        tokio::time::sleep(delay).await;
        delay = delay.saturating_mul(2).min(MAX_RECONNECT_DELAY.max(base_delay));
    }
}
