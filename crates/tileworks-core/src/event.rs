//! Typed event system with bounded per-kind buffers.
//!
//! Components never call subscribers directly. The ledger, workforce pool and
//! scheduler record events into their own outboxes while a step runs; the
//! [`Colony`](crate::colony::Colony) drains those outboxes into the
//! [`EventBus`] and delivers them in batch during the post-tick phase. A
//! publisher therefore never runs (or waits on) subscriber code.
//!
//! # Unsubscribing
//!
//! Every registration returns a [`SubscriptionId`]. Subscriptions can be
//! removed with [`EventBus::unsubscribe`] between deliveries, or through an
//! [`Unsubscriber`] handle from inside a listener while delivery is running.
//! Cancelled entries are skipped immediately and pruned after the pass.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::fixed::Fixed64;
use crate::id::{ResourceType, UnitId};
use crate::spatial::CellPos;
use crate::unit::UnitState;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Storage --
    ResourceChanged {
        resource: ResourceType,
        quantity: u32,
    },
    CapacityChanged {
        total_capacity: Fixed64,
    },

    // -- Workforce --
    WorkerLimitChanged {
        limit: u32,
    },
    WorkerCountChanged {
        count: u32,
    },
    UnemployedChanged {
        unemployed: u32,
    },
    SatisfactionChanged {
        level: Fixed64,
        modifier: Fixed64,
    },

    // -- Production --
    UnitRegistered {
        unit: UnitId,
    },
    UnitUnregistered {
        unit: UnitId,
    },
    UnitStateChanged {
        unit: UnitId,
        state: UnitState,
    },
    CycleCompleted {
        unit: UnitId,
        resource: ResourceType,
        quantity: u32,
    },
    OutputBlocked {
        unit: UnitId,
    },
    MaintenanceChanged {
        unit: UnitId,
        flagged: bool,
    },

    // -- Terrain --
    CellEvicted {
        cell: CellPos,
        unit: UnitId,
    },

    // -- Economy --
    Bankruptcy,
}

/// Discriminant tag for event types, used for subscription and suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ResourceChanged,
    CapacityChanged,
    WorkerLimitChanged,
    WorkerCountChanged,
    UnemployedChanged,
    SatisfactionChanged,
    UnitRegistered,
    UnitUnregistered,
    UnitStateChanged,
    CycleCompleted,
    OutputBlocked,
    MaintenanceChanged,
    CellEvicted,
    Bankruptcy,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 14;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ResourceChanged { .. } => EventKind::ResourceChanged,
            Event::CapacityChanged { .. } => EventKind::CapacityChanged,
            Event::WorkerLimitChanged { .. } => EventKind::WorkerLimitChanged,
            Event::WorkerCountChanged { .. } => EventKind::WorkerCountChanged,
            Event::UnemployedChanged { .. } => EventKind::UnemployedChanged,
            Event::SatisfactionChanged { .. } => EventKind::SatisfactionChanged,
            Event::UnitRegistered { .. } => EventKind::UnitRegistered,
            Event::UnitUnregistered { .. } => EventKind::UnitUnregistered,
            Event::UnitStateChanged { .. } => EventKind::UnitStateChanged,
            Event::CycleCompleted { .. } => EventKind::CycleCompleted,
            Event::OutputBlocked { .. } => EventKind::OutputBlocked,
            Event::MaintenanceChanged { .. } => EventKind::MaintenanceChanged,
            Event::CellEvicted { .. } => EventKind::CellEvicted,
            Event::Bankruptcy => EventKind::Bankruptcy,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Bounded per-kind queue. Allocated once at its capacity; when full, the
/// oldest event is dropped to make room.
#[derive(Debug)]
pub struct EventBuffer {
    queue: VecDeque<Event>,
    capacity: usize,
    /// Every push, dropped events included.
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
        }
        self.queue.push_back(event);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.queue.iter()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Priority level for event subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

/// Handle returned by every registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Cancels one subscription. Cloneable so a listener can capture its own
/// handle and cancel itself mid-delivery.
#[derive(Debug, Clone)]
pub struct Unsubscriber(Rc<Cell<bool>>);

impl Unsubscriber {
    pub fn unsubscribe(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

struct SubscriberEntry {
    id: SubscriptionId,
    listener: PassiveListener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    cancelled: Rc<Cell<bool>>,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One bounded buffer per event kind, plus subscriber lists and suppression
/// flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    /// Suppressed event kinds are never buffered.
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    default_capacity: usize,
    next_subscription: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("subscribers", &self.subscribers)
            .field("default_capacity", &self.default_capacity)
            .finish()
    }
}

impl EventBus {
    /// Create a new event bus with the given default buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: Default::default(),
            default_capacity,
            next_subscription: 0,
        }
    }

    /// Suppress an event kind. Suppressed events are never allocated or buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event for the next delivery. No-ops if the kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Buffer every event from an outbox, preserving order.
    pub fn emit_all(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Register a listener with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) -> SubscriptionId {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener)
    }

    /// Register a listener with explicit priority and optional filter.
    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers[kind.index()].push(SubscriberEntry {
            id,
            listener,
            priority,
            filter,
            cancelled: Rc::new(Cell::new(false)),
        });
        id
    }

    /// A handle that cancels the subscription, usable from inside listeners.
    pub fn unsubscriber(&self, id: SubscriptionId) -> Option<Unsubscriber> {
        self.subscribers
            .iter()
            .flatten()
            .find(|entry| entry.id == id)
            .map(|entry| Unsubscriber(Rc::clone(&entry.cancelled)))
    }

    /// Remove a subscription. Returns false if it was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for list in &mut self.subscribers {
            if let Some(pos) = list.iter().position(|entry| entry.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of live subscriptions for a kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers[kind.index()]
            .iter()
            .filter(|entry| !entry.cancelled.get())
            .count()
    }

    /// Deliver all buffered events to subscribers, then clear the buffers.
    ///
    /// Subscribers run in `(priority, registration)` order; each receives
    /// the kind's events oldest-to-newest.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            if self.suppressed[idx] {
                continue;
            }
            let Some(buffer) = self.buffers[idx].as_ref() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            // Copy out so listeners can't observe the buffer being cleared.
            let events: Vec<Event> = buffer.iter().cloned().collect();

            let subscribers = &mut self.subscribers[idx];
            subscribers.retain(|entry| !entry.cancelled.get());
            subscribers.sort_by_key(|entry| (entry.priority, entry.id));

            for entry in subscribers.iter_mut() {
                for event in &events {
                    if entry.cancelled.get() {
                        break;
                    }
                    if let Some(ref filter) = entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    (entry.listener)(event);
                }
            }
            subscribers.retain(|entry| !entry.cancelled.get());

            if let Some(buffer) = self.buffers[idx].as_mut() {
                buffer.clear();
            }
        }
    }

    /// Events currently buffered for a kind.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.total_written())
            .unwrap_or(0)
    }

    /// Clear all buffers. Subscribers and suppression settings are kept.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn wood() -> ResourceType {
        ResourceType(1)
    }

    fn changed(quantity: u32) -> Event {
        Event::ResourceChanged {
            resource: wood(),
            quantity,
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: Ring buffer keeps order and drops the oldest when full
    // -----------------------------------------------------------------------
    #[test]
    fn event_buffer_wraps_and_drops_oldest() {
        let mut buf = EventBuffer::new(3);
        for i in 0..5 {
            buf.push(changed(i));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.total_written(), 5);

        let events: Vec<&Event> = buf.iter().collect();
        assert_eq!(events, vec![&changed(2), &changed(3), &changed(4)]);
    }

    #[test]
    fn event_buffer_zero_capacity_clamped() {
        let mut buf = EventBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(changed(1));
        buf.push(changed(2));
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![&changed(2)]);
    }

    // -----------------------------------------------------------------------
    // Test 2: Emit buffers until deliver; deliver clears
    // -----------------------------------------------------------------------
    #[test]
    fn emit_is_deferred_until_deliver() {
        let mut bus = EventBus::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.on_passive(
            EventKind::ResourceChanged,
            Box::new(move |e| sink.borrow_mut().push(e.clone())),
        );

        bus.emit(changed(7));
        assert!(seen.borrow().is_empty());
        assert_eq!(bus.buffered_count(EventKind::ResourceChanged), 1);

        bus.deliver();
        assert_eq!(*seen.borrow(), vec![changed(7)]);
        assert_eq!(bus.buffered_count(EventKind::ResourceChanged), 0);
        assert_eq!(bus.total_emitted(EventKind::ResourceChanged), 1);
    }

    // -----------------------------------------------------------------------
    // Test 3: Suppressed kinds are never buffered
    // -----------------------------------------------------------------------
    #[test]
    fn suppressed_events_are_dropped() {
        let mut bus = EventBus::default();
        bus.suppress(EventKind::ResourceChanged);
        bus.emit(changed(1));
        assert!(bus.is_suppressed(EventKind::ResourceChanged));
        assert_eq!(bus.buffered_count(EventKind::ResourceChanged), 0);
    }

    // -----------------------------------------------------------------------
    // Test 4: Priority and registration order
    // -----------------------------------------------------------------------
    #[test]
    fn priority_then_registration_order() {
        let mut bus = EventBus::default();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, priority) in [
            ("post", SubscriberPriority::Post),
            ("normal_a", SubscriberPriority::Normal),
            ("pre", SubscriberPriority::Pre),
            ("normal_b", SubscriberPriority::Normal),
        ] {
            let order = Rc::clone(&order);
            bus.on_passive_filtered(
                EventKind::Bankruptcy,
                priority,
                None,
                Box::new(move |_| order.borrow_mut().push(label)),
            );
        }

        bus.emit(Event::Bankruptcy);
        bus.deliver();
        assert_eq!(*order.borrow(), vec!["pre", "normal_a", "normal_b", "post"]);
    }

    // -----------------------------------------------------------------------
    // Test 5: Filters
    // -----------------------------------------------------------------------
    #[test]
    fn filter_blocks_non_matching() {
        let mut bus = EventBus::default();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        bus.on_passive_filtered(
            EventKind::ResourceChanged,
            SubscriberPriority::Normal,
            Some(Box::new(|e| {
                matches!(e, Event::ResourceChanged { quantity, .. } if *quantity > 5)
            })),
            Box::new(move |_| c.set(c.get() + 1)),
        );

        bus.emit(changed(1));
        bus.emit(changed(10));
        bus.deliver();
        assert_eq!(count.get(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 6: Unsubscribe between deliveries
    // -----------------------------------------------------------------------
    #[test]
    fn unsubscribe_removes_listener() {
        let mut bus = EventBus::default();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = bus.on_passive(
            EventKind::Bankruptcy,
            Box::new(move |_| c.set(c.get() + 1)),
        );

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(Event::Bankruptcy);
        bus.deliver();
        assert_eq!(count.get(), 0);
    }

    // -----------------------------------------------------------------------
    // Test 7: A listener can cancel itself during delivery
    // -----------------------------------------------------------------------
    #[test]
    fn listener_unsubscribes_itself_mid_delivery() {
        let mut bus = EventBus::default();
        let count = Rc::new(Cell::new(0));
        let handle: Rc<RefCell<Option<Unsubscriber>>> = Rc::new(RefCell::new(None));

        let c = Rc::clone(&count);
        let h = Rc::clone(&handle);
        let id = bus.on_passive(
            EventKind::ResourceChanged,
            Box::new(move |_| {
                c.set(c.get() + 1);
                if let Some(u) = h.borrow().as_ref() {
                    u.unsubscribe();
                }
            }),
        );
        *handle.borrow_mut() = bus.unsubscriber(id);

        bus.emit(changed(1));
        bus.emit(changed(2));
        bus.emit(changed(3));
        bus.deliver();

        // Only the first event reaches the listener; it is then pruned.
        assert_eq!(count.get(), 1);
        assert_eq!(bus.subscriber_count(EventKind::ResourceChanged), 0);
    }

    // -----------------------------------------------------------------------
    // Test 8: Cancelling a later subscriber from an earlier one
    // -----------------------------------------------------------------------
    #[test]
    fn earlier_listener_cancels_later_one() {
        let mut bus = EventBus::default();
        let later_calls = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Unsubscriber>>> = Rc::new(RefCell::new(None));

        let s = Rc::clone(&slot);
        bus.on_passive(
            EventKind::Bankruptcy,
            Box::new(move |_| {
                if let Some(u) = s.borrow().as_ref() {
                    u.unsubscribe();
                }
            }),
        );
        let l = Rc::clone(&later_calls);
        let later = bus.on_passive(EventKind::Bankruptcy, Box::new(move |_| l.set(l.get() + 1)));
        *slot.borrow_mut() = bus.unsubscriber(later);

        bus.emit(Event::Bankruptcy);
        bus.deliver();
        assert_eq!(later_calls.get(), 0);
    }

    #[test]
    fn event_kind_discriminant() {
        assert_eq!(changed(1).kind(), EventKind::ResourceChanged);
        assert_eq!(Event::Bankruptcy.kind(), EventKind::Bankruptcy);
        assert_eq!(
            Event::WorkerCountChanged { count: 3 }.kind(),
            EventKind::WorkerCountChanged
        );
    }

    #[test]
    fn clear_all_keeps_subscribers() {
        let mut bus = EventBus::default();
        bus.on_passive(EventKind::Bankruptcy, Box::new(|_| {}));
        bus.emit(Event::Bankruptcy);
        bus.clear_all();
        assert_eq!(bus.buffered_count(EventKind::Bankruptcy), 0);
        assert_eq!(bus.subscriber_count(EventKind::Bankruptcy), 1);
    }
}
