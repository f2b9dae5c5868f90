//! Shutdown signal listener.

use std::future::pending;
use tracing::warn;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
#[cfg(windows)]
use tokio::signal::windows::{ctrl_c, CtrlC};

/// Listens for SIGINT (Ctrl-C) and, on Unix, SIGTERM for the lifetime of a
/// launch.
///
/// Handlers are registered in [`Shutdown::listen`], not on first poll, so a
/// signal that arrives between stages is buffered and seen by the next
/// [`Shutdown::recv`] instead of killing the process or getting lost.
pub(crate) struct Shutdown {
    #[cfg(unix)]
    interrupt: Option<Signal>,
    #[cfg(unix)]
    terminate: Option<Signal>,
    #[cfg(windows)]
    ctrl_c: Option<CtrlC>,
}

impl Shutdown {
    /// Register the signal handlers. Must be called inside a Tokio runtime.
    ///
    /// A handler that cannot be installed is logged and never fires, so a
    /// broken signal setup is never mistaken for an interruption.
    #[cfg(unix)]
    pub(crate) fn listen() -> Self {
        Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT"),
            terminate: register(SignalKind::terminate(), "SIGTERM"),
        }
    }

    #[cfg(windows)]
    pub(crate) fn listen() -> Self {
        let ctrl_c = ctrl_c()
            .map_err(|e| warn!("Failed to listen for Ctrl-C: {e}"))
            .ok();
        Self { ctrl_c }
    }

    /// Resolves once a shutdown signal has been received, including one that
    /// arrived while nobody was waiting.
    #[cfg(unix)]
    pub(crate) async fn recv(&mut self) {
        tokio::select! {
            () = wait(&mut self.interrupt) => {}
            () = wait(&mut self.terminate) => {}
        }
    }

    #[cfg(windows)]
    pub(crate) async fn recv(&mut self) {
        if let Some(ctrl_c) = self.ctrl_c.as_mut() {
            if ctrl_c.recv().await.is_some() {
                return;
            }
        }
        pending::<()>().await;
    }
}

#[cfg(unix)]
fn register(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(listener) => Some(listener),
        Err(e) => {
            warn!("Failed to create {name} signal handler: {e}");
            None
        }
    }
}

#[cfg(unix)]
async fn wait(listener: &mut Option<Signal>) {
    if let Some(listener) = listener.as_mut() {
        if listener.recv().await.is_some() {
            return;
        }
    }
    pending::<()>().await;
}
