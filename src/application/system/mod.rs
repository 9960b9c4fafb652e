//! Process supervision
//!
//! A [`Supervisor`] spawns every long-running duty (listeners, tickers) as an
//! independent task bound to one [`Shutdown`], and on shutdown waits for all of
//! them before the process exits.

pub mod agent;
pub mod server;
pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};

use anyhow::{Result, anyhow};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct Supervisor {
    shutdown: Shutdown,
    tasks: Vec<(&'static str, JoinHandle<Result<()>>)>,
}

impl Supervisor {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            tasks: Vec::new(),
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Spawn a task that receives its own cancellation signal.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.shutdown.signal()));
        info!("Started task: {}", name);
        self.tasks.push((name, handle));
    }

    /// Wait for every task; the first failure is returned after all have stopped.
    ///
    /// A task that fails early triggers shutdown for the rest.
    pub async fn wait(self) -> Result<()> {
        let Self { shutdown, tasks } = self;
        let mut first_error = None;

        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .map(|(name, handle)| async move { (name, handle.await) })
            .collect();

        while let Some((name, outcome)) = pending.next().await {
            let failure = match outcome {
                Ok(Ok(())) => {
                    info!("Task stopped: {}", name);
                    None
                }
                Ok(Err(e)) => Some(anyhow!("{} failed: {:#}", name, e)),
                Err(join_error) => Some(anyhow!("{} panicked: {}", name, join_error)),
            };
            if let Some(e) = failure {
                error!("{}", e);
                shutdown.trigger();
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Install OS signal handlers, then wait for every task.
    pub async fn run_until_signal(self) -> Result<()> {
        let listener = self.shutdown.listen_for_os_signals();
        let result = self.wait().await;
        listener.abort();
        result
    }
}

/// Run `tick` every `period` until cancelled; the first tick fires after one period.
pub async fn run_periodic<F, Fut>(period: Duration, mut signal: ShutdownSignal, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = signal.cancelled() => return,
            _ = ticker.tick() => tick().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_waits_for_all_tasks_after_trigger() {
        let shutdown = Shutdown::new();
        let mut supervisor = Supervisor::new(shutdown.clone());
        let stopped = Arc::new(AtomicUsize::new(0));

        for name in ["a", "b"] {
            let stopped = stopped.clone();
            supervisor.spawn(name, move |signal| async move {
                signal.wait().await;
                stopped.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        shutdown.trigger();
        supervisor.wait().await.unwrap();
        assert_eq!(stopped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_task_stops_the_rest() {
        let shutdown = Shutdown::new();
        let mut supervisor = Supervisor::new(shutdown.clone());

        supervisor.spawn("listener", |_| async { Err(anyhow!("address in use")) });
        supervisor.spawn("ticker", |signal| async move {
            signal.wait().await;
            Ok(())
        });

        let err = tokio::time::timeout(Duration::from_secs(1), supervisor.wait())
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("address in use"));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks_until_cancelled() {
        let shutdown = Shutdown::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = ticks.clone();
        let task = tokio::spawn(run_periodic(
            Duration::from_secs(10),
            shutdown.signal(),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        tokio::time::sleep(Duration::from_secs(35)).await;
        shutdown.trigger();
        task.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
