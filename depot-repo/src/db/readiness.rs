//! Startup readiness wait.
//!
//! Databases started alongside the service (compose stacks, sidecars) often accept
//! connections a few seconds after we do. [`wait_ready`] probes at a fixed
//! interval until the database answers or the wait budget runs out.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection, PgPool};
use tokio::time::{self, Instant, MissedTickBehavior};

/// Fixed spacing between probes; also the minimum wait budget and the longest
/// a single probe may take.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Something that can answer a liveness probe.
#[async_trait]
pub trait Ping: Send + Sync {
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl Ping for PgPool {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.acquire().await?;
        conn.ping().await
    }
}

/// Pings over a fresh connection outside any pool.
///
/// A pool retries failed connects until its acquire timeout and then reports
/// only that it timed out; a direct connect surfaces the driver's own error
/// (refused, auth, unknown database).
#[derive(Debug, Clone)]
pub struct DirectPing {
    options: PgConnectOptions,
}

impl DirectPing {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Ping for DirectPing {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        let mut conn = PgConnection::connect_with(&self.options).await?;
        let answered = conn.ping().await;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "closing readiness connection failed");
        }
        answered
    }
}

/// Wait until `db` answers a ping or `max_wait` has elapsed.
///
/// The first probe is immediate and later ones follow a [`PROBE_INTERVAL`] tick.
/// A budget below one interval is raised to one interval. Each probe is cut off
/// after one interval or at the deadline. Once the deadline passes a last probe
/// is made and its outcome is what the caller gets; if it fails, the error is the
/// last one the database reported. A probe that is cut off never replaces an
/// earlier reported error.
///
/// Dropping the returned future stops the wait at once.
pub async fn wait_ready<P>(db: &P, max_wait: Duration) -> Result<(), sqlx::Error>
where
    P: Ping + ?Sized,
{
    let max_wait = max_wait.max(PROBE_INTERVAL);
    let started = Instant::now();
    let deadline = started + max_wait;

    let mut attempts = 1u32;
    let mut last = match probe(db, deadline).await {
        Some(Ok(())) => return Ok(()),
        Some(Err(e)) => Some(e),
        None => None,
    };

    let mut ticker = time::interval_at(started + PROBE_INTERVAL, PROBE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let expired = time::sleep_until(deadline);
    tokio::pin!(expired);

    loop {
        tokio::select! {
            _ = &mut expired => break,
            _ = ticker.tick() => {
                tracing::debug!(attempts, error = ?last, "database not ready yet");
                attempts += 1;
                match probe(db, deadline).await {
                    Some(Ok(())) => {
                        tracing::debug!(attempts, "database answered");
                        return Ok(());
                    }
                    Some(Err(e)) => last = Some(e),
                    None => {}
                }
            }
        }
    }

    tracing::debug!(attempts, ?max_wait, "wait budget spent, final probe");
    match time::timeout(PROBE_INTERVAL, db.ping()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(last.unwrap_or_else(|| no_answer(max_wait))),
    }
}

/// `None` when the probe was cut off before the database answered.
async fn probe<P>(db: &P, deadline: Instant) -> Option<Result<(), sqlx::Error>>
where
    P: Ping + ?Sized,
{
    let cutoff = deadline.min(Instant::now() + PROBE_INTERVAL);
    time::timeout_at(cutoff, db.ping()).await.ok()
}

fn no_answer(waited: Duration) -> sqlx::Error {
    sqlx::Error::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("database did not answer within {:?}", waited),
    ))
}
