use failure::Fail;
use std::future::{pending, Future};
use std::io;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum WaitError {
    #[fail(display = "timed out after {:?} waiting on {}", _0, _1)]
    TimedOut(Duration, String),
    #[fail(display = "cancelled while waiting on {}", _0)]
    Cancelled(String),
}

/// Polls `condition` every `interval` until it holds.
///
/// Gives up with [`WaitError::TimedOut`] once `timeout` has elapsed, or with
/// [`WaitError::Cancelled`] as soon as `cancel` resolves. Without a timeout the
/// wait is unbounded.
pub async fn wait_until<C, F>(
    what: &str,
    interval: Duration,
    timeout: Option<Duration>,
    cancel: F,
    mut condition: C,
) -> Result<(), WaitError>
where
    C: FnMut() -> bool,
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let deadline = timeout.map(|timeout| started + timeout);
    tokio::pin!(cancel);

    loop {
        if condition() {
            return Ok(());
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(WaitError::TimedOut(now - started, what.to_string()));
                }
                interval.min(deadline - now)
            }
            None => interval,
        };

        info!("waiting on {}...", what);
        tokio::select! {
            _ = &mut cancel => return Err(WaitError::Cancelled(what.to_string())),
            _ = sleep(pause) => {}
        }
    }
}

/// Resolves when `signal` fires. If the signal can't be listened for, the
/// error is logged and the returned future never resolves.
pub async fn cancel_on<S>(signal: S)
where
    S: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("listening for cancellation signal, {}", e);
        pending::<()>().await;
    }
}
