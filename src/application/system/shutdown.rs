//! Process-wide cancellation
//!
//! [`Shutdown`] owns the flag; every task holds a [`ShutdownSignal`] and
//! returns once it fires. SIGINT, SIGTERM and SIGQUIT trigger it.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger on the first OS termination signal.
    pub fn listen_for_os_signals(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Unable to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = wait_for_unix_signal(tokio::signal::unix::SignalKind::terminate(), "SIGTERM");
            #[cfg(unix)]
            let quit = wait_for_unix_signal(tokio::signal::unix::SignalKind::quit(), "SIGQUIT");

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();
            #[cfg(not(unix))]
            let quit = std::future::pending::<()>();

            let mut stopped = shutdown.signal();
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
                _ = terminate => info!("Received SIGTERM"),
                _ = quit => info!("Received SIGQUIT"),
                // Triggered from elsewhere; stop listening.
                _ = stopped.cancelled() => return,
            }

            shutdown.trigger();
        })
    }
}

#[cfg(unix)]
async fn wait_for_unix_signal(kind: tokio::signal::unix::SignalKind, name: &str) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("Unable to install {} handler: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been triggered (or its owner dropped).
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    /// Owned variant for APIs that take a `Future<Output = ()>`.
    pub async fn wait(mut self) {
        self.cancelled().await;
    }
}
