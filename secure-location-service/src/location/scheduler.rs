use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::event::ServiceEvent;

/// Longest delay the scheduler will wait, longer requests are capped
pub const MAX_SCHEDULE_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Single-slot timer for the next listening cycle.
///
/// Scheduling always replaces the pending update. A timer that already
/// fired but was replaced before the owner task got to it is recognized by
/// its generation and ignored.
pub struct UpdateScheduler {
    tx: UnboundedSender<ServiceEvent>,
    standard_interval: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    due_at: Option<Instant>,
}

impl UpdateScheduler {
    pub(crate) fn new(tx: UnboundedSender<ServiceEvent>, standard_interval: Duration) -> Self {
        Self {
            tx,
            standard_interval,
            generation: 0,
            pending: None,
            due_at: None,
        }
    }

    pub fn standard_interval(&self) -> Duration {
        self.standard_interval
    }

    /// When the pending update fires, if one is scheduled
    pub fn due_at(&self) -> Option<Instant> {
        self.due_at
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    /// Cancel any pending update and schedule a new one after `delay`,
    /// capped at [`MAX_SCHEDULE_DELAY`].
    pub fn schedule_update(&mut self, delay: Duration) {
        self.cancel();

        let delay = delay.min(MAX_SCHEDULE_DELAY);

        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();

        let next_trigger = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| Utc::now().checked_add_signed(delay));
        match next_trigger {
            Some(next_trigger) => info!(
                "Next location update at: {} (in {:.1} min)",
                next_trigger.format("%Y-%m-%d %H:%M:%S UTC"),
                delay.as_secs_f64() / 60.0
            ),
            None => info!("Next location update in {:.1} min", delay.as_secs_f64() / 60.0),
        }

        self.due_at = Some(Instant::now() + delay);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(ServiceEvent::UpdateDue { generation }).is_err() {
                debug!("Scheduled update dropped, service is gone");
            }
        }));
    }

    pub fn schedule_standard(&mut self) {
        self.schedule_update(self.standard_interval);
    }

    /// Claim a fired timer. Returns false if it was superseded or cancelled.
    pub fn take_due(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.due_at.is_none() {
            debug!("Ignoring superseded scheduled update #{}", generation);
            return false;
        }

        self.pending = None;
        self.due_at = None;
        true
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.due_at = None;
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn next_generation(rx: &mut mpsc::UnboundedReceiver<ServiceEvent>) -> u64 {
        match rx.recv().await {
            Some(ServiceEvent::UpdateDue { generation }) => generation,
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = UpdateScheduler::new(tx, Duration::from_secs(600));

        let start = Instant::now();
        scheduler.schedule_standard();
        assert!(scheduler.is_pending());

        let generation = next_generation(&mut rx).await;
        assert!(start.elapsed() >= Duration::from_secs(600));
        assert!(scheduler.take_due(generation));
        assert!(!scheduler.is_pending());
        // A generation can only be claimed once
        assert!(!scheduler.take_due(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = UpdateScheduler::new(tx, Duration::from_secs(600));

        scheduler.schedule_update(Duration::from_secs(60));
        scheduler.schedule_update(Duration::from_secs(120));

        let start = Instant::now();
        let generation = next_generation(&mut rx).await;
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert!(scheduler.take_due(generation));

        // Only the last schedule fires
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fire_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = UpdateScheduler::new(tx, Duration::from_secs(600));

        scheduler.schedule_update(Duration::ZERO);
        let stale = next_generation(&mut rx).await;

        // Rescheduled before the owner task handled the fired timer
        scheduler.schedule_standard();
        assert!(!scheduler.take_due(stale));
        assert!(scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_interval_is_capped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = UpdateScheduler::new(tx, Duration::from_secs(200_000_000_000 * 60));

        let start = Instant::now();
        scheduler.schedule_standard();

        assert!(scheduler.is_pending());
        assert_eq!(scheduler.due_at(), Some(start + MAX_SCHEDULE_DELAY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = UpdateScheduler::new(tx, Duration::from_secs(600));

        scheduler.schedule_update(Duration::from_secs(5));
        scheduler.cancel();
        assert!(!scheduler.is_pending());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }
}
