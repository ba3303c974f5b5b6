//! Context lifecycle notifications.
//!
//! The registry publishes a [`ContextEvent`] on a [`tokio::sync::broadcast`]
//! channel whenever its working set changes, so observers (a UI, a logger, a
//! persistence task) can follow along without polling. Sending never blocks;
//! a slow subscriber lags and loses the oldest events.

use recall_types::TransitionReason;
use tokio::sync::broadcast;

/// Default channel capacity (events buffered per subscriber before lagging).
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// A change to the active context set.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEvent {
    Created { id: String, topic: String },
    Updated { id: String, message_count: usize },
    Switched {
        from: Option<String>,
        to: String,
        reason: TransitionReason,
    },
    Merged { sources: Vec<String>, into: String },
    Evicted { id: String },
}

/// Sending half shared by the registry. Clone it cheaply; all clones share
/// the same channel.
#[derive(Clone, Debug)]
pub struct ContextEvents {
    sender: broadcast::Sender<ContextEvent>,
}

impl ContextEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish `event`, returning how many subscribers received it.
    ///
    /// Having no subscribers is the normal case and yields `0`.
    pub fn publish(&self, event: ContextEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> ContextEventReceiver {
        ContextEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ContextEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Receiving half handed out by [`ContextEvents::subscribe`].
pub struct ContextEventReceiver {
    receiver: broadcast::Receiver<ContextEvent>,
}

impl ContextEventReceiver {
    /// Wait for the next event.
    ///
    /// `Err(RecvError::Lagged(n))` means `n` events were dropped for this
    /// subscriber; `Err(RecvError::Closed)` means every sender is gone.
    pub async fn recv(&mut self) -> Result<ContextEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking poll; `Err(TryRecvError::Empty)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<ContextEvent, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain everything currently queued, skipping over lag gaps.
    pub fn drain(&mut self) -> Vec<ContextEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}
