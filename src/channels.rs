//! Named in-process notification queues
//!
//! The request layer uses these to hand one-shot notifications to the
//! synchronization loop. Delivery is best effort: the loop always re-checks the
//! shared cache, so a dropped notification only delays a change by one tick.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

use crate::types::ActiveDriver;

/// Channel carrying active driver selections.
pub const ACTIVE_DRIVER_CHANNEL: &str = "active_driver";

/// Messages exchanged between the request layer and the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RigMessage {
    /// A driver was selected through the request layer
    ActiveDriverChanged(ActiveDriver),
}

/// Registry of independently opened FIFO channels.
///
/// Strict FIFO within one channel, no ordering across channels. No operation blocks.
#[derive(Debug)]
pub struct ChannelRegistry<M> {
    channels: Mutex<HashMap<String, VecDeque<M>>>,
}

impl<M> Default for ChannelRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ChannelRegistry<M> {
    pub fn new() -> Self {
        Self { channels: Mutex::new(HashMap::new()) }
    }

    /// Create an empty channel, replacing (and dropping the contents of) any
    /// channel already open under `name`.
    pub fn open(&self, name: &str) {
        let previous = self.channels.lock().insert(name.to_string(), VecDeque::new());
        if let Some(dropped) = previous {
            debug!(channel = name, dropped = dropped.len(), "Channel reopened");
        } else {
            debug!(channel = name, "Channel opened");
        }
    }

    /// Append a message. Returns false when no channel is open under `name`.
    pub fn send(&self, name: &str, message: M) -> bool {
        match self.channels.lock().get_mut(name) {
            Some(queue) => {
                queue.push_back(message);
                trace!(channel = name, pending = queue.len(), "Message queued");
                true
            }
            None => false,
        }
    }

    /// Take the oldest message, or `None` when the channel is empty or unknown.
    pub fn receive(&self, name: &str) -> Option<M> {
        self.channels.lock().get_mut(name).and_then(VecDeque::pop_front)
    }

    /// Take every pending message in arrival order.
    pub fn drain(&self, name: &str) -> Vec<M> {
        self.channels
            .lock()
            .get_mut(name)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Discard pending messages and remove the channel. Returns false if unknown.
    pub fn close(&self, name: &str) -> bool {
        let removed = self.channels.lock().remove(name);
        match removed {
            Some(queue) => {
                debug!(channel = name, dropped = queue.len(), "Channel closed");
                true
            }
            None => false,
        }
    }

    /// Discard every channel.
    pub fn close_all(&self) {
        let mut channels = self.channels.lock();
        debug!(count = channels.len(), "Closing all channels");
        channels.clear();
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.channels.lock().contains_key(name)
    }

    /// Number of pending messages, 0 for unknown channels.
    pub fn pending(&self, name: &str) -> usize {
        self.channels.lock().get(name).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unknown_channels_are_inert() {
        let registry: ChannelRegistry<u32> = ChannelRegistry::new();
        assert!(!registry.send("nope", 1));
        assert_eq!(registry.receive("nope"), None);
        assert!(!registry.close("nope"));
        assert!(registry.drain("nope").is_empty());
    }

    #[test]
    fn closed_channel_drops_messages() {
        let registry = ChannelRegistry::new();
        registry.open("a");
        assert!(registry.send("a", "hello"));
        assert!(registry.close("a"));

        assert_eq!(registry.receive("a"), None);
        assert!(!registry.send("a", "again"));
    }

    #[test]
    fn reopen_replaces_queue() {
        let registry = ChannelRegistry::new();
        registry.open("a");
        registry.send("a", 1);
        registry.send("a", 2);
        registry.open("a");

        assert!(registry.is_open("a"));
        assert_eq!(registry.pending("a"), 0);
        assert_eq!(registry.receive("a"), None);
    }

    #[test]
    fn channels_are_independent() {
        let registry = ChannelRegistry::new();
        registry.open("a");
        registry.open("b");
        registry.send("a", 1);
        registry.send("b", 2);

        assert!(registry.close("a"));
        assert_eq!(registry.receive("b"), Some(2));
    }

    #[test]
    fn close_all_discards_everything() {
        let registry = ChannelRegistry::new();
        registry.open("a");
        registry.open("b");
        registry.send("a", 1);
        registry.close_all();

        assert!(!registry.is_open("a"));
        assert!(!registry.is_open("b"));
        assert_eq!(registry.receive("a"), None);
    }

    #[test]
    fn single_producer_single_consumer_across_threads() {
        let registry = std::sync::Arc::new(ChannelRegistry::new());
        registry.open("q");

        let producer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..1000u32 {
                    assert!(registry.send("q", i));
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 1000 {
            if let Some(i) = registry.receive("q") {
                received.push(i);
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();

        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn fifo_within_a_channel(messages in prop::collection::vec(any::<i32>(), 0..64)) {
            let registry = ChannelRegistry::new();
            registry.open("fifo");
            for m in &messages {
                prop_assert!(registry.send("fifo", *m));
            }

            let mut received = Vec::new();
            while let Some(m) = registry.receive("fifo") {
                received.push(m);
            }
            prop_assert_eq!(received, messages);
        }
    }
}
