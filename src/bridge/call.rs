//! Awaitable page evaluations and per-frame bridge installation state.

use crate::automation::events::{frame_key, TOP_FRAME};
use crate::automation::unwrap::Unwrapped;
use crate::automation::variant::Variant;
use crate::bridge::agent::ENTRY_POINT;
use crate::bridge::pending::{CallId, Generation, PendingCalls, Rejection, Settlement};
use crate::error::{CrebassError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BridgeState {
    Unbridged,
    BridgeCleared,
    AgentInstalled,
    BootstrapLoaded,
}

impl BridgeState {
    /// Whether calls may be issued into the document.
    pub fn is_installed(self) -> bool {
        self >= BridgeState::AgentInstalled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStatus {
    pub generation: Generation,
    pub state: BridgeState,
}

struct DocumentSlot {
    generation: Generation,
    document: Option<Unwrapped>,
    status: watch::Sender<BridgeStatus>,
}

impl DocumentSlot {
    fn new() -> Self {
        let (status, _) = watch::channel(BridgeStatus {
            generation: Generation::default(),
            state: BridgeState::Unbridged,
        });
        Self {
            generation: Generation::default(),
            document: None,
            status,
        }
    }

    fn publish(&self, state: BridgeState) {
        self.status.send_replace(BridgeStatus {
            generation: self.generation,
            state,
        });
    }
}

/// Issues evaluations into page documents and tracks which documents have a
/// live agent.
pub struct CallBridge {
    calls: Arc<PendingCalls>,
    next_generation: AtomicU64,
    slots: Mutex<HashMap<String, DocumentSlot>>,
}

impl CallBridge {
    pub fn new(calls: Arc<PendingCalls>) -> Self {
        Self {
            calls,
            next_generation: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self) -> &Arc<PendingCalls> {
        &self.calls
    }

    /// Start a new document generation for `frame`. Calls still pending for
    /// the frame's previous document are rejected as orphaned. A new top-level
    /// document also drops every sub-frame, whose documents it replaced.
    pub fn begin_document(&self, frame: &str) -> Generation {
        let key = frame_key(frame);
        let generation = Generation(self.next_generation.fetch_add(1, Ordering::SeqCst));
        let abandoned: Vec<(String, Generation)> = {
            let mut slots = self.slots.lock();
            let mut abandoned = Vec::new();
            if key == TOP_FRAME {
                slots.retain(|k, slot| {
                    if k == TOP_FRAME {
                        return true;
                    }
                    abandoned.push((k.clone(), slot.generation));
                    false
                });
            }
            let slot = slots.entry(key.clone()).or_insert_with(DocumentSlot::new);
            abandoned.push((key.clone(), slot.generation));
            slot.generation = generation;
            slot.document = None;
            slot.publish(BridgeState::Unbridged);
            abandoned
        };

        for (frame, previous) in abandoned {
            if previous == Generation::default() {
                continue;
            }
            let orphaned = self.calls.abandon_generation(previous);
            if orphaned > 0 {
                tracing::warn!(
                    "Rejected {} pending call(s) of frame {} generation {}",
                    orphaned,
                    frame,
                    previous.0
                );
            }
        }
        generation
    }

    /// Move `frame` to `state` if `generation` is still its current document.
    /// Returns `false` when the document has been superseded.
    pub fn advance(
        &self,
        frame: &str,
        generation: Generation,
        state: BridgeState,
        document: Option<Unwrapped>,
    ) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&frame_key(frame)) else {
            return false;
        };
        if slot.generation != generation {
            return false;
        }
        if document.is_some() {
            slot.document = document;
        }
        slot.publish(state);
        tracing::debug!("Frame {} generation {} -> {:?}", frame, generation.0, state);
        true
    }

    pub fn is_current(&self, frame: &str, generation: Generation) -> bool {
        self.slots
            .lock()
            .get(&frame_key(frame))
            .is_some_and(|s| s.generation == generation)
    }

    pub fn status(&self, frame: &str) -> Option<BridgeStatus> {
        self.slots
            .lock()
            .get(&frame_key(frame))
            .map(|s| *s.status.borrow())
    }

    /// Keys of the frames with a known document.
    pub fn frames(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn subscribe(&self, frame: &str) -> watch::Receiver<BridgeStatus> {
        self.slots
            .lock()
            .entry(frame_key(frame))
            .or_insert_with(DocumentSlot::new)
            .status
            .subscribe()
    }

    /// Wait until the frame's agent is installed.
    pub async fn wait_until_installed(&self, frame: &str, timeout: Duration) -> Result<Generation> {
        let mut rx = self.subscribe(frame);
        let waited = tokio::time::timeout(timeout, rx.wait_for(|s| s.state.is_installed())).await;
        match waited {
            Ok(Ok(status)) => Ok(status.generation),
            _ => Err(CrebassError::NotInstalled(frame_key(frame))),
        }
    }

    /// Evaluate `code` in the top-level document.
    pub async fn evaluate(&self, code: &str) -> Result<serde_json::Value> {
        self.evaluate_in(TOP_FRAME, code).await
    }

    /// Evaluate `code` in `frame`'s document. No timeout is applied; dropping
    /// the future withdraws the call.
    pub async fn evaluate_in(&self, frame: &str, code: &str) -> Result<serde_json::Value> {
        let (id, generation, rx) = self.dispatch(frame, code)?;
        let _guard = Withdraw { calls: &self.calls, id };
        settle(id, generation, rx.await)
    }

    /// Evaluate with a deadline; an expired call is withdrawn from the table.
    pub async fn evaluate_with_timeout(
        &self,
        frame: &str,
        code: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let (id, generation, rx) = self.dispatch(frame, code)?;
        let _guard = Withdraw { calls: &self.calls, id };
        match tokio::time::timeout(timeout, rx).await {
            Ok(received) => settle(id, generation, received),
            Err(_) => {
                tracing::warn!("Call {} timed out after {:?}", id, timeout);
                Err(CrebassError::Timeout {
                    id,
                    after_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn dispatch(
        &self,
        frame: &str,
        code: &str,
    ) -> Result<(CallId, Generation, oneshot::Receiver<Settlement>)> {
        let (generation, document) = {
            let slots = self.slots.lock();
            let slot = slots
                .get(&frame_key(frame))
                .filter(|s| s.status.borrow().state.is_installed())
                .ok_or_else(|| CrebassError::NotInstalled(frame_key(frame)))?;
            let document = slot
                .document
                .clone()
                .ok_or_else(|| CrebassError::NotInstalled(frame_key(frame)))?;
            (slot.generation, document)
        };

        // Registered before the entry point runs: the page may report back
        // synchronously from inside the call below.
        let (id, rx) = self.calls.register(generation);
        tracing::debug!("Call {} -> frame {} ({} bytes)", id, frame, code.len());

        if let Err(e) = document.call(ENTRY_POINT, &[Variant::from(id), Variant::from(code)]) {
            self.calls.withdraw(id);
            return Err(e);
        }
        Ok((id, generation, rx))
    }
}

/// Removes a call from the table when its caller stops waiting. Settled
/// calls are already gone, so this is a no-op for them.
struct Withdraw<'a> {
    calls: &'a PendingCalls,
    id: CallId,
}

impl Drop for Withdraw<'_> {
    fn drop(&mut self) {
        if self.calls.withdraw(self.id) {
            tracing::debug!("Call {} withdrawn", self.id);
        }
    }
}

fn settle(
    id: CallId,
    generation: Generation,
    received: std::result::Result<Settlement, oneshot::error::RecvError>,
) -> Result<serde_json::Value> {
    match received {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(Rejection::Evaluation(payload))) => Err(CrebassError::Evaluation(payload)),
        Ok(Err(Rejection::Malformed(raw))) => Err(CrebassError::Decode(raw)),
        Ok(Err(Rejection::Navigated(g))) => Err(CrebassError::Orphaned {
            id,
            generation: g.0,
        }),
        Err(_) => Err(CrebassError::Orphaned {
            id,
            generation: generation.0,
        }),
    }
}
