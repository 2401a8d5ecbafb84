use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::identity::IdentityGate;
use crate::lifecycle::ContentEngine;
use crate::now_millis;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub contents: usize,
    pub sessions: usize,
}

/// Background task that purges expired content and stale sessions.
///
/// A failed pass is logged and retried on the next tick; it never takes the
/// server down.
pub async fn run_sweep_loop(
    engine: Arc<ContentEngine>,
    identity: Arc<IdentityGate>,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match sweep_once(&engine, &identity, now_millis()).await {
            Ok(report) if report.contents > 0 || report.sessions > 0 => {
                info!(
                    "Sweep: purged {} expired contents, {} stale sessions",
                    report.contents, report.sessions
                );
            }
            Ok(_) => debug!("Sweep: nothing to purge"),
            Err(e) => warn!("Sweep error: {:#}", e),
        }
    }
}

/// One sweep pass. The content and session halves run independently, so a
/// failure in one never skips the other; their errors are reported together.
pub async fn sweep_once(
    engine: &ContentEngine,
    identity: &IdentityGate,
    now: i64,
) -> anyhow::Result<SweepReport> {
    let contents = engine.purge_expired(now).await;
    let sessions = identity.purge_expired_sessions(now).await;

    match (contents, sessions) {
        (Ok(contents), Ok(sessions)) => Ok(SweepReport { contents, sessions }),
        (Err(e), Ok(sessions)) => Err(anyhow!(
            "content pass failed: {:#} ({} stale sessions purged)",
            e,
            sessions
        )),
        (Ok(contents), Err(e)) => Err(anyhow!(
            "session pass failed: {:#} ({} expired contents purged)",
            e,
            contents
        )),
        (Err(content_err), Err(session_err)) => Err(anyhow!(
            "content pass failed: {:#}; session pass failed: {:#}",
            content_err,
            session_err
        )),
    }
}
