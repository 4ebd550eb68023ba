use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::record::Publication;

/// The narrow interface the core calls out to for every parsed record (spec
/// 4.4 external, spec 6). Implemented outside the core — typically by the
/// HTTP/gRPC API layer's command and publication handlers.
///
/// Any returned error is treated as transient; the only way to stop retrying
/// is cancellation of `cancel`.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch_command(
        &self,
        cancel: &CancellationToken,
        method: &str,
        data: &[u8],
    ) -> anyhow::Result<()>;

    async fn dispatch_publication(
        &self,
        cancel: &CancellationToken,
        channels: &[String],
        publication: &Publication,
    ) -> anyhow::Result<()>;
}
