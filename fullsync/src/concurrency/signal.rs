//! Payload-less broadcast signals built on [`tokio::sync::watch`].

use tokio::sync::watch;

pub type SignalTx = watch::Sender<()>;

pub type SignalRx = watch::Receiver<()>;

/// Creates a signal channel.
///
/// Receivers created now see the initial value as already seen, so only signals sent afterwards
/// are reported by `changed()` and `has_changed()`.
pub fn create_signal() -> (SignalTx, SignalRx) {
    watch::channel(())
}
