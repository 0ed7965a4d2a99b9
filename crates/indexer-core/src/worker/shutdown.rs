//! Signal handling for graceful shutdown and config reload. Grounded on
//! `zjj-core::coordination::worker_lifecycle::wait_for_shutdown_signal` and
//! `zjj`'s `commands::queue_worker::setup_shutdown_signal`: a broadcast
//! channel fed by spawned signal-listener tasks, polled from the worker
//! loop via `tokio::select!` rather than blocking on the signal directly.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Shutdown,
    ReloadConfig,
}

pub struct ShutdownHandle {
    rx: broadcast::Receiver<ControlSignal>,
}

impl ShutdownHandle {
    /// Awaits the next control signal. Resolves immediately with
    /// `ControlSignal::Shutdown` if the sender side was dropped, since a
    /// worker with no way to ever receive a signal should not spin forever.
    pub async fn recv(&mut self) -> ControlSignal {
        match self.rx.recv().await {
            Ok(signal) => signal,
            Err(broadcast::error::RecvError::Closed) => ControlSignal::Shutdown,
            Err(broadcast::error::RecvError::Lagged(_)) => ControlSignal::Shutdown,
        }
    }
}

/// Spawns listener tasks for SIGINT/SIGTERM (mapped to `Shutdown`) and
/// SIGHUP (mapped to `ReloadConfig`), returning a handle the worker loop
/// polls alongside its own sleep/select. Falls back to ctrl_c-only on
/// non-unix targets.
#[must_use]
pub fn install_signal_handlers() -> ShutdownHandle {
    let (tx, rx) = broadcast::channel(8);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let shutdown_tx = tx.clone();
        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => return,
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(_) => return,
            };
            tokio::select! {
                _ = sigterm.recv() => { let _ = shutdown_tx.send(ControlSignal::Shutdown); }
                _ = sigint.recv() => { let _ = shutdown_tx.send(ControlSignal::Shutdown); }
            }
        });

        let reload_tx = tx.clone();
        tokio::spawn(async move {
            let Ok(mut sighup) = signal(SignalKind::hangup()) else {
                return;
            };
            loop {
                sighup.recv().await;
                if reload_tx.send(ControlSignal::ReloadConfig).is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        let shutdown_tx = tx.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown_tx.send(ControlSignal::Shutdown);
        });
    }

    drop(tx);
    ShutdownHandle { rx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_sender_resolves_as_shutdown() {
        let (tx, rx) = broadcast::channel(1);
        drop(tx);
        let mut handle = ShutdownHandle { rx };
        assert_eq!(handle.recv().await, ControlSignal::Shutdown);
    }

    #[tokio::test]
    async fn forwards_sent_signal() {
        let (tx, rx) = broadcast::channel(1);
        let mut handle = ShutdownHandle { rx };
        tx.send(ControlSignal::ReloadConfig).unwrap();
        assert_eq!(handle.recv().await, ControlSignal::ReloadConfig);
    }
}
