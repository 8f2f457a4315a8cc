//! Process harness for the pipeline binaries.
//!
//! Runs named long-running processes concurrently until one fails or a
//! shutdown signal arrives, then tears down through closers. Closers run
//! sequentially in registration order so resource teardown can be layered
//! (close the queue connection before the store connection), under one
//! overall timeout. SIGINT, SIGTERM and SIGQUIT all funnel into a single
//! cancellation token; repeated signals re-cancel the same token, so
//! teardown runs at most once.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

/// A named long-running process, handed the shared cancellation token.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> ProcessFuture + Send>;

/// A teardown step, run after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> ProcessFuture + Send>;

pub struct Runner {
    processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds a named app process. Processes run concurrently; the first
    /// failure cancels the rest.
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Adds a closer. Closers run after every process has stopped,
    /// sequentially, in the order they were registered.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Overall timeout for the whole closer sequence. Default 10 seconds.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally owned cancellation token instead of a fresh one.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs processes to completion, tears down, and exits the process:
    /// non-zero when any app process returned an error.
    pub async fn run(self) {
        let failed = self.execute().await;
        if failed {
            tracing::error!("Exiting with error");
            std::process::exit(1);
        } else {
            tracing::info!("Exiting normally");
            std::process::exit(0);
        }
    }

    async fn execute(self) -> bool {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        spawn_signal_listeners(&token);

        let mut failed = false;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "Process completed");
                }
                Ok((name, Err(err))) => {
                    tracing::error!(process = %name, "Process failed: {:#}", err);
                    failed = true;
                    token.cancel();
                }
                Err(err) => {
                    tracing::error!(error = %err, "Process panicked");
                    failed = true;
                    token.cancel();
                }
            }
        }

        run_closers(self.closers, self.closer_timeout).await;

        failed
    }
}

fn spawn_signal_listeners(token: &CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received interrupt signal");
                ctrl_c_token.cancel();
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install interrupt handler");
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, name) in [
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::quit(), "SIGQUIT"),
        ] {
            let signal_token = token.clone();
            tokio::spawn(async move {
                let Ok(mut stream) = signal(kind) else {
                    tracing::error!(signal = name, "Failed to install signal handler");
                    return;
                };
                while stream.recv().await.is_some() {
                    tracing::info!(signal = name, "Received shutdown signal");
                    signal_token.cancel();
                }
            });
        }
    }
}

/// Closer failures are logged and swallowed so teardown always finishes;
/// the deadline spans the whole sequence.
async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    tracing::info!(timeout = ?timeout, "Running closers");

    let sequence = async {
        for (index, closer) in closers.into_iter().enumerate() {
            match closer().await {
                Ok(()) => tracing::debug!(index, "Closer completed"),
                Err(err) => tracing::error!(index, "Closer failed: {:#}", err),
            }
        }
    };

    match tokio::time::timeout(timeout, sequence).await {
        Ok(()) => tracing::info!("All closers completed"),
        Err(_) => tracing::error!(timeout = ?timeout, "Closers timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn cancellation_stops_processes_and_runs_closers() {
        let closer_runs = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        token.cancel();

        let failed = Runner::new()
            .with_cancellation_token(token)
            .with_named_process("looper", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer({
                let runs = Arc::clone(&closer_runs);
                move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .execute()
            .await;

        assert!(!failed);
        assert_eq!(closer_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_cancellation_closes_only_once() {
        let closer_runs = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        token.cancel();

        Runner::new()
            .with_cancellation_token(token.clone())
            .with_named_process("looper", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer({
                let runs = Arc::clone(&closer_runs);
                move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .execute()
            .await;

        assert_eq!(closer_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closers_run_sequentially_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();
        token.cancel();

        let mut runner = Runner::new()
            .with_cancellation_token(token)
            .with_named_process("looper", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            });

        for name in ["queue", "store", "telemetry"] {
            runner = runner.with_closer({
                let order = Arc::clone(&order);
                move || async move {
                    order.lock().unwrap().push(name);
                    Ok(())
                }
            });
        }

        runner.execute().await;

        assert_eq!(*order.lock().unwrap(), vec!["queue", "store", "telemetry"]);
    }

    #[tokio::test]
    async fn failing_process_cancels_the_others_and_flags_the_exit() {
        let failed = Runner::new()
            .with_named_process("faulty", |_ctx| async move {
                Err(anyhow::anyhow!("broker connection lost"))
            })
            .with_named_process("healthy", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .execute()
            .await;

        assert!(failed);
    }

    #[tokio::test(start_paused = true)]
    async fn closer_sequence_is_bounded_by_the_timeout() {
        let reached = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        token.cancel();

        Runner::new()
            .with_cancellation_token(token)
            .with_named_process("looper", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer(move || async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .with_closer({
                let reached = Arc::clone(&reached);
                move || async move {
                    reached.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .with_closer_timeout(Duration::from_secs(5))
            .execute()
            .await;

        // The hung first closer consumed the whole deadline.
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }
}
