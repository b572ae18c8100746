//! Debounced refresh on remote table changes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lg_core::ChangeEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// Something that re-fetches when the bridge fires
#[async_trait]
pub trait RefreshTarget: Send + Sync {
    async fn refresh_now(&self);
}

/// Subscription to one table's change feed.
///
/// A burst of change events is coalesced into a single refresh issued once
/// no event has arrived for the debounce delay. Stopping the bridge (or
/// dropping it) cancels a pending refresh and closes the subscription.
pub struct RealtimeBridge {
    table: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl RealtimeBridge {
    /// Spawn the listener on the current runtime
    pub fn start(
        table: &'static str,
        receiver: broadcast::Receiver<ChangeEvent>,
        debounce: Duration,
        target: Arc<dyn RefreshTarget>,
    ) -> Self {
        let handle = tokio::spawn(listen(table, receiver, debounce, target));
        debug!(table, debounce_ms = debounce.as_millis() as u64, "realtime bridge started");
        Self {
            table,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(table = self.table, "realtime bridge stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RealtimeBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn listen(
    table: &'static str,
    mut receiver: broadcast::Receiver<ChangeEvent>,
    debounce: Duration,
    target: Arc<dyn RefreshTarget>,
) {
    let timer = time::sleep(debounce);
    tokio::pin!(timer);
    let mut pending = false;

    loop {
        tokio::select! {
            event = receiver.recv() => {
                match event {
                    Ok(event) if event.table != table => continue,
                    Ok(event) => {
                        debug!(table, kind = ?event.kind, record = ?event.record_id, "change received");
                    }
                    // Missed events still mean the table changed
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(table, skipped, "change feed lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!(table, "change feed closed");
                        break;
                    }
                }
                pending = true;
                timer.as_mut().reset(Instant::now() + debounce);
            }
            () = &mut timer, if pending => {
                pending = false;
                target.refresh_now().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lg_core::ChangeKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Counter {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefreshTarget for Counter {
        async fn refresh_now(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event(table: &'static str) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Update,
            table,
            record_id: None,
        }
    }

    const DEBOUNCE: Duration = Duration::from_millis(250);

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces() {
        let (tx, rx) = broadcast::channel(16);
        let counter = Arc::new(Counter::default());
        let _bridge = RealtimeBridge::start("leads", rx, DEBOUNCE, counter.clone());

        for _ in 0..5 {
            tx.send(event("leads")).unwrap();
            time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(counter.count(), 0);

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_refresh_separately() {
        let (tx, rx) = broadcast::channel(16);
        let counter = Arc::new(Counter::default());
        let _bridge = RealtimeBridge::start("leads", rx, DEBOUNCE, counter.clone());

        tx.send(event("leads")).unwrap();
        time::sleep(Duration::from_millis(400)).await;
        tx.send(event("leads")).unwrap();
        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(counter.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_tables_ignored() {
        let (tx, rx) = broadcast::channel(16);
        let counter = Arc::new(Counter::default());
        let _bridge = RealtimeBridge::start("leads", rx, DEBOUNCE, counter.clone());

        tx.send(event("appointments")).unwrap();
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_refresh() {
        let (tx, rx) = broadcast::channel(16);
        let counter = Arc::new(Counter::default());
        let mut bridge = RealtimeBridge::start("leads", rx, DEBOUNCE, counter.clone());

        tx.send(event("leads")).unwrap();
        time::sleep(Duration::from_millis(100)).await;
        bridge.stop();
        assert!(!bridge.is_running());

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.count(), 0);
    }
}
