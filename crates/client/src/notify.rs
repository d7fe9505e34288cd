//! In-process flash message hub backed by a `tokio::sync::broadcast` channel.
//!
//! The pollers publish a [`FlashMessage`] for every user-visible event
//! (job accepted, recalculated, failed, report ready). Front ends subscribe
//! and render them as auto-dismissing banners.

use scrooge_core::flash::{FlashLevel, FlashMessage};
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 64;

/// Fan-out of flash messages to any number of subscribers.
pub struct Notifier {
    sender: broadcast::Sender<FlashMessage>,
}

impl Notifier {
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to all current subscribers and log it.
    ///
    /// With no subscribers the message is only logged.
    pub fn publish(&self, message: FlashMessage) {
        match message.level {
            FlashLevel::Danger => tracing::error!(text = %message.text, "Flash message"),
            FlashLevel::Warning => tracing::warn!(text = %message.text, "Flash message"),
            FlashLevel::Success | FlashLevel::Info => {
                tracing::info!(level = %message.level, text = %message.text, "Flash message")
            }
        }
        // Ignore the SendError, it only means there are zero receivers.
        let _ = self.sender.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlashMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
