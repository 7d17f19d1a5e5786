//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Signals are forwarded as values on a channel; what a repeated signal
//!   means is decided by the supervisor or the worker runtime
//! - Tests inject signals by sending on the same channel type

use std::fmt;
use std::io;

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownSignal {
    /// `SIGINT`: graceful once, forced when repeated.
    Interrupt,
    /// `SIGTERM`: graceful, bounded by the grace timer.
    Terminate,
}

impl ShutdownSignal {
    pub fn as_nix(self) -> Signal {
        match self {
            ShutdownSignal::Interrupt => Signal::SIGINT,
            ShutdownSignal::Terminate => Signal::SIGTERM,
        }
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_nix().as_str())
    }
}

/// Start listening for `SIGINT` and `SIGTERM`.
///
/// Every delivery is forwarded; the listener task ends when the receiver
/// is dropped.
pub fn listen() -> io::Result<mpsc::Receiver<ShutdownSignal>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = sigint.recv() => ShutdownSignal::Interrupt,
                Some(()) = sigterm.recv() => ShutdownSignal::Terminate,
                else => break,
            };
            tracing::info!(signal = %received, "Signal received");
            if tx.send(received).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_posix_signals() {
        assert_eq!(ShutdownSignal::Interrupt.as_nix(), Signal::SIGINT);
        assert_eq!(ShutdownSignal::Terminate.to_string(), "SIGTERM");
    }
}
