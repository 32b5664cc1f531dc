use super::coordinator::{ScrollAction, ScrollCoordinator};

use std::sync::Arc;
use threadline_core::{ConversationTurn, ScrollConfig, StreamStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Input to a running [`ScrollDriver`].
#[derive(Debug, Clone)]
pub enum ScrollEvent {
    /// The turn sequence or the status changed
    Observe { turns: Arc<Vec<ConversationTurn>>, status: StreamStatus },
    /// The view was populated from a saved conversation
    Restore { turns: Arc<Vec<ConversationTurn>> },
}

/// Runs a [`ScrollCoordinator`] on a tokio task.
///
/// Events go in through [`ScrollDriver::observe`] / [`ScrollDriver::restore`],
/// scroll actions come out of the receiver returned by
/// [`ScrollDriver::spawn`]. Dropping the driver or calling
/// [`ScrollDriver::shutdown`] cancels every pending scroll.
pub struct ScrollDriver {
    events: mpsc::UnboundedSender<ScrollEvent>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScrollDriver {
    /// Spawn the driver task on the current runtime.
    pub fn spawn(config: ScrollConfig) -> (Self, mpsc::UnboundedReceiver<ScrollAction>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let coordinator = ScrollCoordinator::new(config);
        let handle = tokio::spawn(run(coordinator, events_rx, actions_tx, cancel_token.clone()));

        (Self { events: events_tx, cancel_token, handle: Some(handle) }, actions_rx)
    }

    /// Report a change. Returns false if the driver has stopped.
    pub fn observe(&self, turns: Arc<Vec<ConversationTurn>>, status: StreamStatus) -> bool {
        self.events.send(ScrollEvent::Observe { turns, status }).is_ok()
    }

    /// Report that a saved conversation was loaded. Returns false if the driver has stopped.
    pub fn restore(&self, turns: Arc<Vec<ConversationTurn>>) -> bool {
        self.events.send(ScrollEvent::Restore { turns }).is_ok()
    }

    /// False once the task has exited or been cancelled.
    pub fn is_running(&self) -> bool {
        !self.cancel_token.is_cancelled() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel pending scrolls and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("scroll driver task failed: {}", e);
        }
    }
}

impl Drop for ScrollDriver {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

async fn run(
    mut coordinator: ScrollCoordinator, mut events: mpsc::UnboundedReceiver<ScrollEvent>,
    actions: mpsc::UnboundedSender<ScrollAction>, cancel_token: CancellationToken,
) {
    let mut latest: Arc<Vec<ConversationTurn>> = Arc::default();

    loop {
        let deadline = coordinator.next_deadline();

        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => break,

            event = events.recv() => match event {
                Some(ScrollEvent::Observe { turns, status }) => {
                    coordinator.observe(&turns, status, Instant::now());
                    latest = turns;
                }
                Some(ScrollEvent::Restore { turns }) => {
                    if let Some(action) = coordinator.restore(&turns)
                        && actions.send(action).is_err()
                    {
                        break;
                    }
                    latest = turns;
                }
                None => break,
            },

            _ = sleep_until(deadline) => {
                let due = coordinator.poll(&latest, Instant::now());
                if due.into_iter().any(|action| actions.send(action).is_err()) {
                    break;
                }
            }
        }
    }

    coordinator.teardown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scroll::{ScrollBehavior, ScrollTarget};
    use std::time::Duration;
    use threadline_core::Part;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ScrollAction>) -> Vec<ScrollAction> {
        let mut actions = Vec::new();
        while let Ok(action) = rx.try_recv() {
            actions.push(action);
        }
        actions
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_scrolls_instantly() {
        let (driver, mut rx) = ScrollDriver::spawn(ScrollConfig::default());
        let turns = Arc::new(vec![ConversationTurn::user("u1", "hi")]);

        assert!(driver.restore(turns.clone()));
        let action = rx.recv().await.unwrap();
        assert_eq!(action.behavior, ScrollBehavior::Instant);

        assert!(driver.restore(turns));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(drain(&mut rx).is_empty());

        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_scroll_dropped_on_shutdown() {
        let (driver, mut rx) = ScrollDriver::spawn(ScrollConfig::default());
        let turns = Arc::new(vec![
            ConversationTurn::user("u1", "hi"),
            ConversationTurn::assistant("a1", vec![Part::reasoning("..")]),
        ]);

        driver.observe(turns, StreamStatus::Streaming);
        tokio::time::sleep(Duration::from_millis(50)).await;
        driver.shutdown().await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(drain(&mut rx).is_empty());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_status_scrolls_on_next_tick() {
        let (driver, mut rx) = ScrollDriver::spawn(ScrollConfig::default());
        driver.observe(Arc::new(vec![ConversationTurn::user("u1", "hi")]), StreamStatus::Ready);

        let action = rx.recv().await.unwrap();
        assert_eq!(action, ScrollAction::smooth(ScrollTarget::Transcript));
        assert!(driver.is_running());

        driver.shutdown().await;
    }
}
