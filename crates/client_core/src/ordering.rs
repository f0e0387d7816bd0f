use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use shared::domain::{Level, LevelId, Step, StepId};

use crate::ClientEvent;

/// An item that lives in exactly one ordered collection and carries a stable
/// identifier.
pub trait Ordered {
    type Id: Clone + Eq;

    fn id(&self) -> &Self::Id;
}

impl Ordered for Level {
    type Id = LevelId;

    fn id(&self) -> &LevelId {
        &self.id
    }
}

impl Ordered for Step {
    type Id = StepId;

    fn id(&self) -> &StepId {
        &self.id
    }
}

/// Accepts a full replacement order for one collection and makes it
/// authoritative server-side. One sink instance is bound to one collection
/// (the levels list, or the steps of a particular level).
#[async_trait]
pub trait OrderSink<I>: Send + Sync {
    async fn submit_order(&self, order: &[I]) -> Result<(), OrderSinkError>;
}

#[derive(Debug, Error)]
pub enum OrderSinkError {
    #[error("failed to obtain access token: {0}")]
    Token(String),
    #[error("order submission transport error: {0}")]
    Transport(String),
    #[error("server rejected order with status {0}")]
    Rejected(u16),
}

/// In-memory ordering of one collection. Single source of truth for the
/// render order; each identifier appears exactly once. Performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct OrderedCollection<T> {
    items: Vec<T>,
}

impl<T: Ordered + Clone> OrderedCollection<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Unconditionally overwrites the sequence with fresh authoritative data.
    /// No merge, no conflict resolution.
    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn current_order(&self) -> Vec<T::Id> {
        self.items.iter().map(|item| item.id().clone()).collect()
    }

    /// Returns a new sequence with `moved` relocated to immediately precede
    /// `target`, all other relative orders preserved. Returns the sequence
    /// unchanged when either id is absent or `moved == target`.
    pub fn move_before(&self, moved: &T::Id, target: &T::Id) -> Vec<T> {
        if moved == target {
            return self.items.clone();
        }
        let moved_at = self.items.iter().position(|item| item.id() == moved);
        let target_present = self.items.iter().any(|item| item.id() == target);
        let Some(moved_at) = moved_at else {
            return self.items.clone();
        };
        if !target_present {
            return self.items.clone();
        }

        let mut reordered = self.items.clone();
        let item = reordered.remove(moved_at);
        let insert_at = reordered
            .iter()
            .position(|other| other.id() == target)
            .unwrap_or(reordered.len());
        reordered.insert(insert_at, item);
        reordered
    }
}

struct ReordererState<T> {
    collection: OrderedCollection<T>,
    /// Last order the server acknowledged (or the last authoritative fetch).
    confirmed: Vec<T>,
    issued_seq: u64,
    settled_seq: u64,
}

/// Drives one ordered collection through the optimistic reorder cycle:
/// apply the candidate order locally, submit the whole identifier sequence,
/// and on rejection restore the last confirmed order.
///
/// Overlapping submissions are resolved by sequence number: only the
/// completion of the newest issued submission settles the collection; older
/// completions are discarded as stale. There is no automatic retry — a replay
/// could overwrite a newer order the server already accepted.
pub struct Reorderer<T: Ordered, S: OrderSink<T::Id>> {
    state: Mutex<ReordererState<T>>,
    sink: S,
    collection_label: String,
    events: broadcast::Sender<ClientEvent>,
}

impl<T, S> Reorderer<T, S>
where
    T: Ordered + Clone + Send,
    S: OrderSink<T::Id>,
{
    pub fn new(
        sink: S,
        collection_label: impl Into<String>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            state: Mutex::new(ReordererState {
                collection: OrderedCollection::new(),
                confirmed: Vec::new(),
                issued_seq: 0,
                settled_seq: 0,
            }),
            sink,
            collection_label: collection_label.into(),
            events,
        }
    }

    /// Installs fresh authoritative data (initial load or post-mutation
    /// refetch). Supersedes any submission still in flight.
    pub async fn replace(&self, items: Vec<T>) {
        let mut state = self.state.lock().await;
        state.collection.replace(items.clone());
        state.confirmed = items;
        state.settled_seq = state.issued_seq;
    }

    pub async fn items(&self) -> Vec<T> {
        self.state.lock().await.collection.items().to_vec()
    }

    pub async fn current_order(&self) -> Vec<T::Id> {
        self.state.lock().await.collection.current_order()
    }

    /// Handles one drop gesture: move `moved` to immediately precede
    /// `target`. The new order is visible to callers before the server
    /// responds; a rejected submission restores the last confirmed order and
    /// surfaces the failure on the event stream.
    pub async fn reorder(&self, moved: &T::Id, target: &T::Id) -> Result<(), OrderSinkError> {
        let (seq, candidate, order) = {
            let mut state = self.state.lock().await;
            let candidate = state.collection.move_before(moved, target);
            let order: Vec<T::Id> = candidate.iter().map(|item| item.id().clone()).collect();
            if order == state.collection.current_order() {
                // No-op gesture (same item, unknown ids, or unchanged order);
                // nothing to persist.
                return Ok(());
            }
            state.collection.replace(candidate.clone());
            state.issued_seq += 1;
            (state.issued_seq, candidate, order)
        };

        match self.sink.submit_order(&order).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                if seq <= state.settled_seq {
                    debug!(
                        "discarding stale reorder confirmation for {}",
                        self.collection_label
                    );
                    return Ok(());
                }
                state.settled_seq = seq;
                state.confirmed = candidate;
                let _ = self.events.send(ClientEvent::OrderPersisted {
                    collection: self.collection_label.clone(),
                });
                Ok(())
            }
            Err(err) => {
                let mut state = self.state.lock().await;
                if seq <= state.settled_seq {
                    debug!(
                        "discarding stale reorder failure for {}: {err}",
                        self.collection_label
                    );
                    return Err(err);
                }
                state.settled_seq = seq;
                if seq == state.issued_seq {
                    // Newest gesture failed: the visible order reverts to the
                    // last confirmed one. If a newer gesture is already in
                    // flight, its completion decides the visible order instead.
                    let confirmed = state.confirmed.clone();
                    state.collection.replace(confirmed);
                }
                warn!(
                    "failed to persist order for {}: {err}; restored last confirmed order",
                    self.collection_label
                );
                let _ = self.events.send(ClientEvent::OrderRolledBack {
                    collection: self.collection_label.clone(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }
}
