//! Registry of in-flight page evaluations keyed by call id.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

pub type CallId = u64;

/// Lifetime of one loaded document in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

/// Why a call completed without a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The page code threw; carries the serialized error.
    Evaluation(serde_json::Value),
    /// The page answered with something that could not be decoded.
    Malformed(String),
    /// The call's document was replaced before it answered.
    Navigated(Generation),
}

pub type Settlement = Result<serde_json::Value, Rejection>;

struct PendingCall {
    generation: Generation,
    tx: oneshot::Sender<Settlement>,
}

pub struct PendingCalls {
    next_id: AtomicU64,
    calls: Mutex<HashMap<CallId, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh id and register a call against `generation`.
    pub fn register(&self, generation: Generation) -> (CallId, oneshot::Receiver<Settlement>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.calls.lock().insert(id, PendingCall { generation, tx });
        (id, rx)
    }

    /// Settle and remove a call. Returns `false` if `id` is not pending.
    pub fn settle(&self, id: CallId, settlement: Settlement) -> bool {
        let Some(call) = self.calls.lock().remove(&id) else {
            return false;
        };
        // The caller may have stopped waiting; that is not an error here.
        let _ = call.tx.send(settlement);
        true
    }

    /// Drop a registration without settling it.
    pub fn withdraw(&self, id: CallId) -> bool {
        self.calls.lock().remove(&id).is_some()
    }

    /// Reject every call registered against `generation`. Returns how many.
    pub fn abandon_generation(&self, generation: Generation) -> usize {
        let orphaned: Vec<PendingCall> = {
            let mut calls = self.calls.lock();
            let ids: Vec<CallId> = calls
                .iter()
                .filter(|(_, c)| c.generation == generation)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| calls.remove(&id)).collect()
        };
        let count = orphaned.len();
        for call in orphaned {
            let _ = call.tx.send(Err(Rejection::Navigated(generation)));
        }
        count
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.calls.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}
