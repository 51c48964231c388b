use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;

use crate::display::DisplayEvent;

/// Tag of a `load` request.
///
/// The orchestrator issues strictly increasing generations; a display stamps
/// every event with the generation of the load it belongs to, so events of a
/// superseded load can be recognized and dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LoadGeneration(pub u64);

impl LoadGeneration {
    pub fn next(self) -> Self {
        LoadGeneration(self.0 + 1)
    }
}

/// A display event with the generation it was emitted under.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayEnvelope {
    pub generation: LoadGeneration,
    pub event: DisplayEvent,
}

/// Fan-out of display events to any number of subscribers.
///
/// Dropped receivers are pruned on the next broadcast.
#[derive(Clone, Default)]
pub struct DisplayEventBus {
    subscribers: Arc<Mutex<Vec<Sender<DisplayEnvelope>>>>,
}

impl DisplayEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sender<DisplayEnvelope>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe(&self) -> Receiver<DisplayEnvelope> {
        let (tx, rx) = unbounded::<DisplayEnvelope>();
        self.lock().push(tx);
        rx
    }

    pub fn broadcast(&self, envelope: DisplayEnvelope) {
        self.lock()
            .retain(|tx| tx.send(envelope.clone()).is_ok());
    }

    pub fn emit(&self, generation: LoadGeneration, event: DisplayEvent) {
        self.broadcast(DisplayEnvelope { generation, event });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

impl std::fmt::Debug for DisplayEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayEventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
