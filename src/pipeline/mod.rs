//! Forward pipeline: upstream call, then parse and persist.
//!
//! # Data Flow
//! ```text
//! handler (validated upload, fresh Workspace)
//!     → pool.rs (wait for a free slot, detach)
//!     → UpstreamClient::forward (async network I/O)
//!     → assemble.rs on the blocking pool (parse, classify, write files)
//!     → ForwardResult back to the handler
//! ```
//!
//! # Design Decisions
//! - Jobs are detached tasks: a client disconnect never leaves a
//!   half-written workspace behind
//! - Disk work runs under `spawn_blocking`, never on the async workers

pub mod assemble;
pub mod pool;

pub use assemble::{assemble, save_download, ForwardResult, DEFAULT_DOWNLOAD_FILENAME};
pub use pool::WorkerPool;

use crate::error::BridgeError;
use crate::upstream::{ForwardRequest, UpstreamClient};
use crate::workspace::{ManifestEntry, Workspace, WorkspaceRoot};

/// Forward the upload, then de-multiplex the response into `workspace`.
pub async fn forward_and_assemble(
    client: UpstreamClient,
    request: ForwardRequest,
    workspace: Workspace,
) -> Result<ForwardResult, BridgeError> {
    let response = client.forward(request).await?;
    blocking(move || assemble(&response, &workspace)).await
}

/// Forward the upload and save the raw response body into `workspace`.
pub async fn forward_and_save(
    client: UpstreamClient,
    request: ForwardRequest,
    workspace: Workspace,
) -> Result<ManifestEntry, BridgeError> {
    let response = client.forward(request).await?;
    blocking(move || save_download(&response, &workspace)).await
}

async fn blocking<F, T>(work: F) -> Result<T, BridgeError>
where
    F: FnOnce() -> Result<T, BridgeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BridgeError::Internal(format!("blocking task failed: {e}")))?
}

/// Create a workspace for one request off the async workers.
pub async fn open_workspace(root: &WorkspaceRoot) -> Result<Workspace, BridgeError> {
    let root = root.clone();
    blocking(move || root.create_workspace().map_err(BridgeError::from)).await
}
