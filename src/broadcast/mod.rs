use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::event::{DispatchEvent, Topic};

/// Topic-addressed fan-out over tokio broadcast channels. Channels are
/// created lazily per topic; publishing is fire-and-forget with no
/// acknowledgment or retry. Ordering holds within a single subscriber's
/// stream only.
pub struct Broadcaster {
    channels: DashMap<Topic, broadcast::Sender<DispatchEvent>>,
    buffer: usize,
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            channels: DashMap::new(),
            buffer,
        }
    }

    fn sender(&self, topic: Topic) -> broadcast::Sender<DispatchEvent> {
        self.channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone()
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<DispatchEvent> {
        self.sender(topic).subscribe()
    }

    /// Never blocks and never fails the mutation that triggered it. A send
    /// error only means the topic has no subscribers right now.
    pub fn publish(&self, topic: Topic, event: DispatchEvent) {
        if let Some(sender) = self.channels.get(&topic) {
            if sender.send(event).is_err() {
                debug!(?topic, "no subscribers on topic, event dropped");
            }
        } else {
            debug!(?topic, "no channel for topic, event dropped");
        }
    }
}
