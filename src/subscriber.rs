//! Subscriber — a registered filter plus a delivery target.
//!
//! Push delivery backs off via a bounded `crossbeam_channel`; repeated
//! backpressure removes the subscriber after `max_push_failures`.

use crate::filter::CompiledFilter;
use crossbeam_channel::{Sender, TrySendError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub type SubscriberId = u32;

static NEXT_SUBSCRIBER_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone)]
pub struct SubscriberEvent {
    pub event_type: String,
    pub neuro_tick: u64,
}

pub enum Delivery {
    Polling(parking_lot::Mutex<VecDeque<SubscriberEvent>>),
    Push {
        sender: Sender<SubscriberEvent>,
        failures: AtomicU32,
        max_failures: u32,
    },
    Callback(Box<dyn Fn(SubscriberEvent) + Send + Sync>),
}

pub struct Subscriber {
    pub id: SubscriberId,
    pub name: String,
    pub filter: CompiledFilter,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Dropped,
    Removed,
}

impl Subscriber {
    pub fn new_polling(name: impl Into<String>, filter: CompiledFilter) -> (Arc<Subscriber>, PollingHandle) {
        let queue = parking_lot::Mutex::new(VecDeque::new());
        let sub = Arc::new(Subscriber {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            filter,
            delivery: Delivery::Polling(queue),
        });
        let handle = PollingHandle { subscriber: sub.clone() };
        (sub, handle)
    }

    pub fn new_push(
        name: impl Into<String>,
        filter: CompiledFilter,
        sender: Sender<SubscriberEvent>,
        max_failures: u32,
    ) -> Arc<Subscriber> {
        Arc::new(Subscriber {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            filter,
            delivery: Delivery::Push {
                sender,
                failures: AtomicU32::new(0),
                max_failures,
            },
        })
    }

    pub fn new_callback(
        name: impl Into<String>,
        filter: CompiledFilter,
        callback: Box<dyn Fn(SubscriberEvent) + Send + Sync>,
    ) -> Arc<Subscriber> {
        Arc::new(Subscriber {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            filter,
            delivery: Delivery::Callback(callback),
        })
    }

    /// Deliver a matched event. Non-blocking: a full push channel counts a
    /// failure and is dropped, never retried synchronously here (spec §5).
    pub fn deliver(&self, event: SubscriberEvent) -> DeliveryOutcome {
        match &self.delivery {
            Delivery::Polling(queue) => {
                queue.lock().push_back(event);
                DeliveryOutcome::Delivered
            }
            Delivery::Push {
                sender,
                failures,
                max_failures,
            } => match sender.try_send(event) {
                Ok(()) => {
                    failures.store(0, Ordering::Relaxed);
                    DeliveryOutcome::Delivered
                }
                Err(TrySendError::Full(_)) => {
                    let n = failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if n >= *max_failures {
                        DeliveryOutcome::Removed
                    } else {
                        DeliveryOutcome::Dropped
                    }
                }
                Err(TrySendError::Disconnected(_)) => DeliveryOutcome::Removed,
            },
            Delivery::Callback(callback) => {
                callback(event);
                DeliveryOutcome::Delivered
            }
        }
    }
}

pub struct PollingHandle {
    subscriber: Arc<Subscriber>,
}

impl PollingHandle {
    pub fn poll(&self) -> Option<SubscriberEvent> {
        match &self.subscriber.delivery {
            Delivery::Polling(queue) => queue.lock().pop_front(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.subscriber.delivery {
            Delivery::Polling(queue) => queue.lock().len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ConditionSpec, EventTypePattern, FilterCompiler, FilterSpec, LogicSpec};

    fn any_filter() -> CompiledFilter {
        FilterCompiler::new()
            .compile(&FilterSpec {
                logic: LogicSpec::Leaf(ConditionSpec::EventType(EventTypePattern::Wildcard("*".into()))),
            })
            .unwrap()
    }

    #[test]
    fn polling_queue_fifo() {
        let (_sub, handle) = Subscriber::new_polling("p", any_filter());
        handle
            .subscriber
            .deliver(SubscriberEvent { event_type: "a".into(), neuro_tick: 1 });
        handle
            .subscriber
            .deliver(SubscriberEvent { event_type: "b".into(), neuro_tick: 2 });
        assert_eq!(handle.poll().unwrap().event_type, "a");
        assert_eq!(handle.poll().unwrap().event_type, "b");
        assert!(handle.poll().is_none());
    }

    #[test]
    fn push_removed_after_repeated_failures() {
        let (tx, _rx) = crossbeam_channel::bounded::<SubscriberEvent>(0);
        let sub = Subscriber::new_push("push", any_filter(), tx, 2);
        // channel has zero capacity and no receiver draining -> every send fails
        let first = sub.deliver(SubscriberEvent { event_type: "a".into(), neuro_tick: 1 });
        assert_eq!(first, DeliveryOutcome::Dropped);
        let second = sub.deliver(SubscriberEvent { event_type: "a".into(), neuro_tick: 1 });
        assert_eq!(second, DeliveryOutcome::Removed);
    }
}
