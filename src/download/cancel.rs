//! Ctrl-C wiring for the cancellation token.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawns a listener that cancels `token` on the first Ctrl-C.
///
/// The listener exits once the token is cancelled by anyone, so it never
/// outlives the run it guards. Abort the handle to stop listening early.
#[must_use = "dropping the handle detaches the listener"]
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    info!("interrupt received, cancelling downloads");
                    token.cancel();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            },
        }
    })
}
