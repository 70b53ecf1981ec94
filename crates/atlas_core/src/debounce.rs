//! crates/atlas_core/src/debounce.rs
//!
//! Trailing-edge debouncer for free-text input.
//!
//! Keystrokes are pushed without blocking; a background worker emits the latest
//! value once the input has been quiet for the configured period. The worker is
//! stopped through a `CancellationToken` when the `Debouncer` is dropped.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The input side of a debounced channel.
pub struct Debouncer<T> {
    input: watch::Sender<T>,
    cancellation_token: CancellationToken,
}

/// Creates a debouncer seeded with `initial`, which is treated as already emitted.
///
/// Must be called from within a tokio runtime.
pub fn debounced<T>(initial: T, quiet_period: Duration) -> (Debouncer<T>, mpsc::UnboundedReceiver<T>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let (input, watch_rx) = watch::channel(initial.clone());
    let (output, output_rx) = mpsc::unbounded_channel();
    let cancellation_token = CancellationToken::new();

    tokio::spawn(debounce_worker(
        watch_rx,
        output,
        initial,
        quiet_period,
        cancellation_token.clone(),
    ));

    (
        Debouncer {
            input,
            cancellation_token,
        },
        output_rx,
    )
}

impl<T> Debouncer<T> {
    /// Records the latest input and restarts the quiet period.
    pub fn push(&self, value: T) {
        self.input.send_replace(value);
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

async fn debounce_worker<T>(
    mut input: watch::Receiver<T>,
    output: mpsc::UnboundedSender<T>,
    mut last_emitted: T,
    quiet_period: Duration,
    cancellation_token: CancellationToken,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => return,
            changed = input.changed() => if changed.is_err() { return },
        }

        // Wait out the quiet period, restarting it on every further change.
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => return,
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(quiet_period) => break,
            }
        }

        let value = input.borrow_and_update().clone();
        if value == last_emitted {
            continue;
        }
        last_emitted = value.clone();
        debug!("Debounced input settled.");
        if output.send(value).is_err() {
            return;
        }
    }
}
