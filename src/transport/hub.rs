// ============================================================================
// Broadcast Hub
// Non-blocking notifier that fans engine events out to subscribers
// ============================================================================

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::HubConfig;
use super::wire::{self, OutboundMessage};
use crate::domain::{MatchEvent, Order};
use crate::interfaces::EventNotifier;

/// Encoded message shared by every subscriber.
pub type Frame = Arc<str>;

type Subscribers = Arc<Mutex<HashMap<Uuid, Sender<Frame>>>>;

/// One subscriber's feed. The receiver disconnects once the hub drops the
/// subscriber, either on `unsubscribe` or because it fell behind.
pub struct Subscription {
    pub id: Uuid,
    pub receiver: Receiver<Frame>,
}

/// Engine notifier that serializes each event and hands it to a fan-out
/// thread through a bounded queue.
///
/// The engine calls this while holding its lock, so nothing here waits:
/// when the queue is full the event is dropped and logged.
pub struct BroadcastHub {
    queue: Sender<Frame>,
    subscribers: Subscribers,
    subscriber_capacity: usize,
}

/// Handle on the fan-out thread. The thread exits once every
/// `BroadcastHub` handle is dropped and the queue is drained.
pub struct HubWorker {
    handle: JoinHandle<()>,
}

impl HubWorker {
    pub fn join(self) {
        if self.handle.join().is_err() {
            error!("hub fan-out thread panicked");
        }
    }
}

impl BroadcastHub {
    /// Create the hub and spawn its fan-out thread.
    pub fn start(config: &HubConfig) -> std::io::Result<(Arc<Self>, HubWorker)> {
        let (queue, frames) = channel::bounded::<Frame>(config.queue_capacity);
        let subscribers: Subscribers = Arc::new(Mutex::new(HashMap::new()));

        let fan_out = Arc::clone(&subscribers);
        let handle = thread::Builder::new()
            .name("hub-fanout".to_string())
            .spawn(move || {
                for frame in frames.iter() {
                    broadcast(&fan_out, frame);
                }
                debug!("hub queue closed, fan-out thread exiting");
            })?;

        let hub = Arc::new(Self {
            queue,
            subscribers,
            subscriber_capacity: config.subscriber_capacity,
        });
        info!(
            queue_capacity = config.queue_capacity,
            subscriber_capacity = config.subscriber_capacity,
            "broadcast hub started"
        );
        Ok((hub, HubWorker { handle }))
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = channel::bounded(self.subscriber_capacity);
        let id = Uuid::new_v4();
        self.subscribers.lock().insert(id, sender);
        debug!(subscriber = %id, "subscriber registered");
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.lock().remove(&id).is_some() {
            debug!(subscriber = %id, "subscriber unregistered");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Encode and enqueue without waiting.
    pub fn publish(&self, message: &OutboundMessage) {
        let frame: Frame = match wire::encode(message) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "failed to encode outbound message, dropping");
                return;
            }
        };

        match self.queue.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("hub queue full, dropping event"),
            Err(TrySendError::Disconnected(_)) => warn!("hub fan-out stopped, dropping event"),
        }
    }
}

impl EventNotifier for BroadcastHub {
    fn on_match(&self, event: &MatchEvent) {
        self.publish(&OutboundMessage::Match {
            event: event.clone(),
        });
    }

    fn on_add(&self, order: &Order) {
        self.publish(&OutboundMessage::OrderAdded {
            order: order.clone(),
        });
    }
}

/// Deliver `frame` to every subscriber; drop the ones that are full or gone.
fn broadcast(subscribers: &Subscribers, frame: Frame) {
    subscribers
        .lock()
        .retain(|id, sender| match sender.try_send(Arc::clone(&frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = %id, "subscriber too slow, disconnecting");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(subscriber = %id, "subscriber gone");
                false
            }
        });
}
