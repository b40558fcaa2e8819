//! Event pump: the one place the harness yields to the outside world.
//!
//! Waiting on an identity operation never blocks a thread. Instead the waiter
//! calls [`EventPump::tick`] repeatedly; each tick lets other tasks (the
//! identity service, its notification delivery, signal handlers) make
//! progress for a bounded slice of time and reports whether the whole run
//! should stop.

use async_trait::async_trait;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Processes one slice of external work.
#[async_trait]
pub trait EventPump: Send {
    /// Yield for up to `hint`. Returns `true` if shutdown was requested.
    ///
    /// Must return in bounded time.
    async fn tick(&mut self, hint: Duration) -> bool;
}

/// Production pump backed by the tokio timer and a shutdown token.
#[derive(Debug, Clone)]
pub struct RuntimePump {
    shutdown: CancellationToken,
    ticks: u64,
}

impl RuntimePump {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown, ticks: 0 }
    }

    /// Number of ticks processed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[async_trait]
impl EventPump for RuntimePump {
    async fn tick(&mut self, hint: Duration) -> bool {
        self.ticks += 1;
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                tracing::debug!("Shutdown observed on tick {}", self.ticks);
            }
            _ = tokio::time::sleep(hint) => {}
        }
        self.shutdown.is_cancelled()
    }
}

/// Cancel `token` when the process receives Ctrl-C.
///
/// The returned task also ends quietly if the token is cancelled elsewhere.
pub fn shutdown_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    tracing::info!("Ctrl-C received, requesting shutdown");
                    token.cancel();
                }
                Err(e) => tracing::warn!("Unable to listen for Ctrl-C: {}", e),
            },
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tick_without_shutdown() {
        let mut pump = RuntimePump::new(CancellationToken::new());
        let start = tokio::time::Instant::now();

        assert!(!pump.tick(Duration::from_millis(100)).await);
        assert!(!pump.tick(Duration::from_millis(100)).await);

        assert_eq!(pump.ticks(), 2);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_ends_tick_early() {
        let token = CancellationToken::new();
        let mut pump = RuntimePump::new(token.clone());
        token.cancel();

        let start = tokio::time::Instant::now();
        assert!(pump.tick(Duration::from_secs(60)).await);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_tick() {
        let token = CancellationToken::new();
        let mut pump = RuntimePump::new(token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        assert!(pump.tick(Duration::from_secs(10)).await);
        assert!(pump.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_ctrl_c_task_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        let handle = shutdown_on_ctrl_c(token.clone());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ctrl-c task should end after cancellation")
            .unwrap();
    }
}
