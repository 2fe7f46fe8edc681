use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::reconcile;
use crate::server::AppState;
use crate::webhook::events::InboundEvent;

/// In-process stand-in for the at-least-once event delivery queue.
///
/// The processor handles one event to completion before taking the next; an
/// event whose handling hits a store error goes back to the front and is
/// redelivered, which is safe because every status write goes through the
/// ordering guard and is idempotent.
pub struct EventQueue {
    events: VecDeque<InboundEvent>,
    /// Notification channel for the processor.
    notify: Option<tokio::sync::mpsc::UnboundedSender<()>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            notify: None,
        }
    }

    pub fn set_notifier(&mut self, tx: tokio::sync::mpsc::UnboundedSender<()>) {
        self.notify = Some(tx);
    }

    pub fn enqueue(&mut self, event: InboundEvent) {
        tracing::info!(event = %event.description(), "Enqueuing event");
        self.events.push_back(event);
        self.notify();
    }

    /// Put a failed event back at the head for redelivery.
    pub fn requeue_front(&mut self, event: InboundEvent) {
        self.events.push_front(event);
        self.notify();
    }

    pub fn take_next(&mut self) -> Option<InboundEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn notify(&self) {
        if let Some(ref tx) = self.notify {
            let _ = tx.send(());
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

const REDELIVERY_BACKOFF: Duration = Duration::from_secs(5);

/// Run the background event processor: the single consumer of the queue.
pub async fn run_event_processor(state: Arc<AppState>) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();

    {
        let mut queue = state.event_queue.write().await;
        queue.set_notifier(tx.clone());
    }

    // Events accepted before the notifier existed produced no signal; one
    // nudge drains whatever is already waiting.
    let _ = tx.send(());

    tracing::info!("Event processor started");

    loop {
        // Wait for notification
        let _ = rx.recv().await;

        // Process all available events
        loop {
            let event = {
                let mut queue = state.event_queue.write().await;
                queue.take_next()
            };

            let event = match event {
                Some(e) => e,
                None => break,
            };

            tracing::info!(event = %event.description(), "Processing event");

            if let Err(e) = reconcile::handle_event(&state, event.clone()).await {
                tracing::error!(
                    event = %event.description(),
                    error = %e,
                    "Event handling failed; requeueing for redelivery"
                );
                {
                    let mut queue = state.event_queue.write().await;
                    queue.requeue_front(event);
                }
                tokio::time::sleep(REDELIVERY_BACKOFF).await;
            }
        }
    }
}
