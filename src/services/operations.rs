//! Single-slot coordination for long-running guild operations.
//!
//! Only one bulk update or ranking post runs at a time. The slot owns the
//! cancel source of whatever is running; the caller holds an
//! [`OperationTicket`] that frees the slot when dropped.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use tokio::sync::watch;
use utoipa::ToSchema;
use uuid::Uuid;

/// Owner side of a cooperative cancellation flag.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    /// Unraised flag.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Raise the flag. Returns `false` when it was already raised.
    pub fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Whether [`Self::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a [`CancelSource`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether the source was cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested. Pends forever if the source is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Kind of work currently holding the operation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Bulk ladder refresh.
    MemberUpdate,
    /// Leaderboard rendering and posting.
    Ranking,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::MemberUpdate => f.write_str("member update"),
            OperationKind::Ranking => f.write_str("ranking"),
        }
    }
}

#[derive(Debug)]
struct RunningOperation {
    id: Uuid,
    kind: OperationKind,
    source: CancelSource,
}

/// Shared slot admitting at most one running operation.
#[derive(Debug, Clone, Default)]
pub struct OperationSlot {
    inner: Arc<Mutex<Option<RunningOperation>>>,
}

impl OperationSlot {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningOperation>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot, or `None` when another operation is running.
    pub fn try_acquire(&self, kind: OperationKind) -> Option<OperationTicket> {
        let mut guard = self.lock();
        if guard.is_some() {
            return None;
        }

        let source = CancelSource::new();
        let token = source.token();
        let id = Uuid::new_v4();
        *guard = Some(RunningOperation { id, kind, source });

        Some(OperationTicket {
            id,
            kind,
            token,
            slot: self.clone(),
        })
    }

    /// Request cancellation of the running operation. Returns `false` when
    /// nothing is running or cancellation was already requested.
    pub fn cancel(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|running| running.source.cancel())
    }

    /// Id and kind of the running operation.
    pub fn current(&self) -> Option<(Uuid, OperationKind)> {
        self.lock()
            .as_ref()
            .map(|running| (running.id, running.kind))
    }

    fn release(&self, id: Uuid) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|running| running.id == id) {
            guard.take();
        }
    }
}

/// Proof of holding the operation slot; releases it on drop.
#[derive(Debug)]
pub struct OperationTicket {
    id: Uuid,
    kind: OperationKind,
    token: CancelToken,
    slot: OperationSlot,
}

impl OperationTicket {
    /// Operation id, also used to tag progress events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Kind held by this ticket.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Cancel flag of this operation.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for OperationTicket {
    fn drop(&mut self) {
        self.slot.release(self.id);
    }
}
