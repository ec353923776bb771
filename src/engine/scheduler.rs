//! Scheduled broadcasts.
//!
//! Once per hour, at a fixed minute past the hour (UTC), runs a
//! default-universe scan for every configured timeframe and every
//! registered subscriber. A failure for one recipient is logged and the
//! broadcast moves on to the next.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::engine::dispatcher::Dispatcher;
use crate::engine::scanner::ScanOrchestrator;
use crate::subscribers::SubscriberRegistry;
use crate::types::{ScanRequest, Timeframe};

/// Outcome counts of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Scheduler {
    orchestrator: Arc<ScanOrchestrator>,
    dispatcher: Arc<Dispatcher>,
    registry: SubscriberRegistry,
    timeframes: Vec<Timeframe>,
    minute: u32,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<ScanOrchestrator>,
        dispatcher: Arc<Dispatcher>,
        registry: SubscriberRegistry,
        timeframes: Vec<Timeframe>,
        minute: u32,
    ) -> Self {
        Self {
            orchestrator,
            dispatcher,
            registry,
            timeframes,
            minute: minute.min(59),
        }
    }

    /// First instant strictly after `now` that falls on `minute` past an hour.
    pub fn next_fire(now: DateTime<Utc>, minute: u32) -> DateTime<Utc> {
        let hour_start = now
            .duration_trunc(ChronoDuration::hours(1))
            .unwrap_or(now);
        let candidate = hour_start + ChronoDuration::minutes(i64::from(minute.min(59)));
        if candidate > now {
            candidate
        } else {
            candidate + ChronoDuration::hours(1)
        }
    }

    /// Next boundary to fire, strictly after `last_fired` when one is given.
    pub fn next_unfired(
        now: DateTime<Utc>,
        minute: u32,
        last_fired: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        let next = Self::next_fire(now, minute);
        match last_fired {
            Some(last) if next <= last => Self::next_fire(last, minute),
            _ => next,
        }
    }

    /// Scan and deliver `timeframe` to every current subscriber.
    pub async fn broadcast(&self, timeframe: Timeframe) -> BroadcastReport {
        let recipients = self.registry.list_all().await;
        let mut report = BroadcastReport::default();

        if recipients.is_empty() {
            debug!(timeframe = %timeframe, "No subscribers, skipping broadcast");
            return report;
        }

        info!(timeframe = %timeframe, recipients = recipients.len(), "Scheduled broadcast starting");

        for recipient in recipients {
            let request = ScanRequest::scheduled(timeframe, recipient.clone());

            let result = match self.orchestrator.run_scan_bounded(&request).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(recipient = %recipient, timeframe = %timeframe, error = %e, "Scheduled scan failed");
                    report.failed += 1;
                    continue;
                }
            };

            match self.dispatcher.send_report(&recipient, &result).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(recipient = %recipient, timeframe = %timeframe, error = %e, "Scheduled delivery failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            timeframe = %timeframe,
            delivered = report.delivered,
            failed = report.failed,
            "Scheduled broadcast complete"
        );
        report
    }

    /// Fire broadcasts every hour until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut in_flight: JoinSet<BroadcastReport> = JoinSet::new();
        let mut last_fired: Option<DateTime<Utc>> = None;

        info!(
            timeframes = ?self.timeframes,
            minute = self.minute,
            "Scheduler started"
        );

        loop {
            let now = Utc::now();
            let next = Self::next_unfired(now, self.minute, last_fired);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(next = %next, "Next scheduled broadcast");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last_fired = Some(next);
                    for &timeframe in &self.timeframes {
                        let this = Arc::clone(&self);
                        in_flight.spawn(async move { this.broadcast(timeframe).await });
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Broadcast task panicked");
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender also means shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(pending = in_flight.len(), "Scheduler stopping");
        in_flight.shutdown().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
