//! Suspend/resume plumbing between running code and the host.
//!
//! Awaiting an `input(...)` coroutine registers a oneshot sender under a
//! fresh `SuspensionId`, announces a `SuspendEvent`, and waits. The host
//! answers through `Resumer::resume`, which completes the await with the
//! supplied text.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuspensionId(pub u64);

impl fmt::Display for SuspensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Announcement that evaluation is waiting for a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendEvent {
    pub id: SuspensionId,
    /// Cell whose evaluation is waiting.
    pub cell: String,
    pub prompt: String,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    waiting: HashMap<SuspensionId, oneshot::Sender<String>>,
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create a connected suspender/resumer pair and the stream of events the
/// host should answer.
pub fn channel() -> (Suspender, Resumer, mpsc::UnboundedReceiver<SuspendEvent>) {
    let registry = SharedRegistry::default();
    let (events, receiver) = mpsc::unbounded_channel();
    (
        Suspender {
            registry: registry.clone(),
            events,
        },
        Resumer { registry },
        receiver,
    )
}

/// Evaluation-side handle.
#[derive(Clone)]
pub struct Suspender {
    registry: SharedRegistry,
    events: mpsc::UnboundedSender<SuspendEvent>,
}

impl Suspender {
    /// Wait until the host resumes with a value.
    pub async fn suspend(&self, cell: &str, prompt: &str) -> Result<String, Error> {
        let (sender, receiver) = oneshot::channel();
        let id = {
            let mut registry = lock(&self.registry);
            let id = SuspensionId(registry.next_id);
            registry.next_id += 1;
            registry.waiting.insert(id, sender);
            id
        };

        debug!(%id, cell, "suspending for input");
        let event = SuspendEvent {
            id,
            cell: cell.to_string(),
            prompt: prompt.to_string(),
        };
        if self.events.send(event).is_err() {
            lock(&self.registry).waiting.remove(&id);
            return Err(Error::HostGone);
        }

        receiver.await.map_err(|_| Error::Abandoned(id))
    }
}

/// Host-side handle.
#[derive(Clone)]
pub struct Resumer {
    registry: SharedRegistry,
}

impl Resumer {
    /// Deliver `value` as the result of the await waiting under `id`.
    pub fn resume(&self, id: SuspensionId, value: impl Into<String>) -> Result<(), Error> {
        let sender = lock(&self.registry)
            .waiting
            .remove(&id)
            .ok_or(Error::UnknownSuspension(id))?;
        debug!(%id, "resuming");
        sender.send(value.into()).map_err(|_| Error::Abandoned(id))
    }

    /// Ids currently waiting, oldest first.
    pub fn pending(&self) -> Vec<SuspensionId> {
        let mut ids: Vec<_> = lock(&self.registry).waiting.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_suspend_resume_round_trip() {
        let (suspender, resumer, mut events) = channel();
        let waiting = suspender.suspend("c1", "name: ");
        let answer = async {
            let event = events.recv().await.unwrap();
            assert_eq!(event.cell, "c1");
            assert_eq!(event.prompt, "name: ");
            assert_eq!(resumer.pending(), vec![event.id]);
            resumer.resume(event.id, "Ada").unwrap();
        };
        let (value, ()) = tokio::join!(waiting, answer);
        assert_eq!(value.unwrap(), "Ada");
        assert!(resumer.pending().is_empty());
    }

    #[test]
    fn test_unknown_suspension() {
        let (_suspender, resumer, _events) = channel();
        let err = resumer.resume(SuspensionId(7), "x").unwrap_err();
        assert!(matches!(err, Error::UnknownSuspension(SuspensionId(7))));
    }

    #[tokio::test]
    async fn test_ids_are_fresh() {
        let (suspender, resumer, mut events) = channel();
        let first = suspender.suspend("c", "a");
        let second = suspender.suspend("c", "b");
        let answer = async {
            let a = events.recv().await.unwrap();
            let b = events.recv().await.unwrap();
            assert_ne!(a.id, b.id);
            resumer.resume(b.id, "2").unwrap();
            resumer.resume(a.id, "1").unwrap();
        };
        let (a, b, ()) = tokio::join!(first, second, answer);
        assert_eq!(a.unwrap(), "1");
        assert_eq!(b.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_suspend_without_listener_fails() {
        let (suspender, _resumer, events) = channel();
        drop(events);
        let err = suspender.suspend("c", "?").await.unwrap_err();
        assert!(matches!(err, Error::HostGone));
    }
}
