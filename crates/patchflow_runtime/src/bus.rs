// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named-channel publish/subscribe bus.
//!
//! Lets two nodes talk without an edge between them. One bus belongs to one
//! engine; clones are handles to the same channels.
//!
//! Change flags are never cleared by the bus itself. A consumer (normally a
//! receive node, once per tick) checks and clears them, so several sends
//! between two ticks are observed as a single change.

use indexmap::IndexMap;
use parking_lot::Mutex;
use patchflow_graph::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Callback invoked with `(value, channel)` on every value-changing send
pub type Listener = Arc<dyn Fn(&Value, &str) + Send + Sync>;

#[derive(Debug, Default)]
struct Channel {
    value: Option<Value>,
    changed: bool,
}

#[derive(Default)]
struct BusState {
    channels: IndexMap<String, Channel>,
    listeners: HashMap<String, Vec<(u64, Listener)>>,
    next_listener: u64,
}

impl BusState {
    fn remove_listener(&mut self, channel: &str, id: u64) {
        if let Some(list) = self.listeners.get_mut(channel) {
            list.retain(|(listener_id, _)| *listener_id != id);
            if list.is_empty() {
                self.listeners.remove(channel);
            }
        }
    }
}

/// Snapshot of one channel, for debug tooling
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// Channel name
    pub name: String,
    /// Current value
    pub value: Option<Value>,
    /// Whether a change is waiting to be observed
    pub changed: bool,
    /// Number of active subscribers
    pub subscribers: usize,
}

/// Message bus shared by all nodes of one engine
#[derive(Clone, Default)]
pub struct MessageBus {
    state: Arc<Mutex<BusState>>,
}

impl MessageBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a value.
    ///
    /// Does nothing when `value` is identical to the stored value (see
    /// [`Value::same`]). Otherwise stores it, raises the change flag and
    /// calls every subscriber synchronously. Returns whether the value
    /// changed.
    pub fn send(&self, channel: &str, value: Value) -> bool {
        let listeners: Vec<Listener> = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let entry = state.channels.entry(channel.to_string()).or_default();
            if entry.value.as_ref().is_some_and(|current| current.same(&value)) {
                return false;
            }
            entry.value = Some(value.clone());
            entry.changed = true;

            state
                .listeners
                .get(channel)
                .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default()
        };

        // Lock released: listeners may send again
        for listener in listeners {
            listener(&value, channel);
        }
        true
    }

    /// Current value of a channel
    pub fn get(&self, channel: &str) -> Option<Value> {
        self.state.lock().channels.get(channel)?.value.clone()
    }

    /// Whether the channel changed since its flag was last cleared
    pub fn has_changed(&self, channel: &str) -> bool {
        self.state
            .lock()
            .channels
            .get(channel)
            .is_some_and(|c| c.changed)
    }

    /// Clear a channel's change flag
    pub fn clear_change_flag(&self, channel: &str) {
        if let Some(c) = self.state.lock().channels.get_mut(channel) {
            c.changed = false;
        }
    }

    /// Check and clear a change flag in one step
    pub fn take_change(&self, channel: &str) -> bool {
        self.state
            .lock()
            .channels
            .get_mut(channel)
            .is_some_and(|c| std::mem::replace(&mut c.changed, false))
    }

    /// Subscribe to value changes on a channel.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or unsubscribed.
    pub fn subscribe<F>(&self, channel: &str, listener: F) -> Subscription
    where
        F: Fn(&Value, &str) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        state.channels.entry(channel.to_string()).or_default();
        let id = state.next_listener;
        state.next_listener += 1;
        state
            .listeners
            .entry(channel.to_string())
            .or_default()
            .push((id, Arc::new(listener)));

        Subscription {
            bus: Arc::downgrade(&self.state),
            channel: channel.to_string(),
            id,
            active: true,
        }
    }

    /// Snapshot of all channels, in creation order
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let state = self.state.lock();
        state
            .channels
            .iter()
            .map(|(name, channel)| ChannelInfo {
                name: name.clone(),
                value: channel.value.clone(),
                changed: channel.changed,
                subscribers: state.listeners.get(name).map_or(0, Vec::len),
            })
            .collect()
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    /// Number of subscribers on a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state.lock().listeners.get(channel).map_or(0, Vec::len)
    }

    /// Drop all channels, listeners and flags
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.channels.clear();
        state.listeners.clear();
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MessageBus")
            .field("channels", &state.channels)
            .field("listener_sets", &state.listeners.len())
            .finish()
    }
}

/// Handle to a registered listener; unsubscribes on drop
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<Mutex<BusState>>,
    channel: String,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Channel this subscription listens to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Remove the listener now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the listener registered for the lifetime of the bus
    pub fn forget(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(state) = self.bus.upgrade() {
            state.lock().remove_listener(&self.channel, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Value, &str) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &Value, _: &str| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_send_then_get() {
        let bus = MessageBus::new();
        assert_eq!(bus.get("level"), None);
        bus.send("level", Value::from(5.0));
        assert_eq!(bus.get("level"), Some(Value::from(5.0)));
    }

    #[test]
    fn test_duplicate_send_notifies_once() {
        let bus = MessageBus::new();
        let (count, listener) = counter();
        let _sub = bus.subscribe("level", listener);

        assert!(bus.send("level", Value::from(5.0)));
        assert!(!bus.send("level", Value::from(5.0)));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(bus.has_changed("level"));
        bus.clear_change_flag("level");
        assert!(!bus.has_changed("level"));

        // Same value again: still no change
        bus.send("level", Value::from(5.0));
        assert!(!bus.has_changed("level"));
    }

    #[test]
    fn test_multiple_sends_collapse_to_one_change() {
        let bus = MessageBus::new();
        bus.send("x", Value::from(1.0));
        bus.send("x", Value::from(2.0));
        assert!(bus.take_change("x"));
        assert!(!bus.take_change("x"));
        assert_eq!(bus.get("x"), Some(Value::from(2.0)));
    }

    #[test]
    fn test_identity_not_deep_equality() {
        let bus = MessageBus::new();
        let (count, listener) = counter();
        let _sub = bus.subscribe("list", listener);

        let list = Value::list([Value::from(1.0)]);
        bus.send("list", list.clone());
        bus.send("list", list);
        bus.send("list", Value::list([Value::from(1.0)]));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_receives_value_and_channel() {
        let bus = MessageBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe("name", move |value, channel| {
            sink.lock().push((value.clone(), channel.to_string()));
        });

        bus.send("name", Value::from("hi"));
        assert_eq!(*seen.lock(), vec![(Value::from("hi"), "name".to_string())]);
    }

    #[test]
    fn test_unsubscribe_tears_down_listener_set() {
        let bus = MessageBus::new();
        let (count, listener) = counter();
        let sub = bus.subscribe("a", listener);
        assert_eq!(bus.subscriber_count("a"), 1);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count("a"), 0);
        bus.send("a", Value::from(1.0));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // The channel itself survives until clear()
        assert_eq!(bus.channel_count(), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = MessageBus::new();
        {
            let (_, listener) = counter();
            let _sub = bus.subscribe("a", listener);
            assert_eq!(bus.subscriber_count("a"), 1);
        }
        assert_eq!(bus.subscriber_count("a"), 0);
    }

    #[test]
    fn test_listener_may_send_reentrantly() {
        let bus = MessageBus::new();
        let relay = bus.clone();
        bus.subscribe("in", move |value, _| {
            relay.send("out", value.clone());
        })
        .forget();

        bus.send("in", Value::from(3.0));
        assert_eq!(bus.get("out"), Some(Value::from(3.0)));
        assert!(bus.has_changed("out"));
    }

    #[test]
    fn test_clear_resets_everything() {
        let bus = MessageBus::new();
        let (count, listener) = counter();
        let sub = bus.subscribe("a", listener);
        bus.send("a", Value::from(1.0));

        bus.clear();
        assert_eq!(bus.channel_count(), 0);
        assert_eq!(bus.get("a"), None);
        assert!(!bus.has_changed("a"));

        bus.send("a", Value::from(2.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        drop(sub);
    }

    #[test]
    fn test_channels_snapshot() {
        let bus = MessageBus::new();
        let (_, listener) = counter();
        let _sub = bus.subscribe("b", listener);
        bus.send("a", Value::from(true));

        let channels = bus.channels();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "b");
        assert_eq!(channels[0].subscribers, 1);
        assert_eq!(channels[1].value, Some(Value::from(true)));
        assert!(channels[1].changed);
    }
}
