use std::time::{Duration, Instant};

use meshchain_types::{Error, MeshResult};
use tokio::sync::oneshot;
use uuid::Uuid;

/// The closed dispatch target set: a tagged enum in place of a string
/// `methodPath`. Matches the four scan/delivery/block tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ScanBlocks,
    ScanPool,
    DeliverPool,
    AppendBlocks
}

#[derive(Debug, Clone)]
pub enum EventStatus {
    Idle,
    Running,
    Done,
    Error(Error)
}

pub(crate) struct InternalEvent {
    pub event_id:        Uuid,
    pub kind:             EventKind,
    pub interval:         Duration,
    pub next_execute_at: Instant,
    pub status:          EventStatus,
    /// Subscribers waiting on this event's next completion — a oneshot
    /// completion primitive in place of `setInterval` polling.
    pub waiters: Vec<oneshot::Sender<MeshResult<()>>>
}

impl InternalEvent {
    pub fn new(kind: EventKind, interval: Duration) -> Self {
        Self { event_id: Uuid::new_v4(), kind, interval, next_execute_at: Instant::now(), status: EventStatus::Idle, waiters: Vec::new() }
    }
}
