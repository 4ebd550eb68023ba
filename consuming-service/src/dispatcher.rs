use async_trait::async_trait;
use consuming_core::{Dispatcher, Publication};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Logs every dispatched record instead of forwarding it anywhere. The real
/// application-defined handler (HTTP, gRPC, or otherwise) lives outside this
/// crate; this stands in for it so the binary runs standalone.
pub struct LoggingDispatcher;

#[async_trait]
impl Dispatcher for LoggingDispatcher {
    async fn dispatch_command(
        &self,
        _cancel: &CancellationToken,
        method: &str,
        data: &[u8],
    ) -> anyhow::Result<()> {
        info!(method, bytes = data.len(), "dispatching command");
        Ok(())
    }

    async fn dispatch_publication(
        &self,
        _cancel: &CancellationToken,
        channels: &[String],
        publication: &Publication,
    ) -> anyhow::Result<()> {
        info!(
            channels = ?channels,
            idempotency_key = %publication.idempotency_key,
            delta = publication.delta,
            bytes = publication.data.len(),
            "dispatching publication"
        );
        Ok(())
    }
}
