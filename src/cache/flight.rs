//! In-Flight Computation Tracking
//!
//! Implements the single-flight protocol: for each key, at most one
//! computation runs at a time. The first caller to claim a key becomes the
//! leader and drives the computation; everyone else becomes a follower and
//! waits on a watch channel for the published outcome.
//!
//! Each flight carries a unique id. Invalidation drops the flight marker, so
//! a computation that outlives its marker can still deliver its outcome to
//! waiters but is barred from publishing into the store.

use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::watch;

use crate::error::{CacheError, Result};

/// Latest state of a flight: `None` while the computation runs, `Some` once
/// the leader publishes the outcome.
pub(crate) type FlightOutcome<V> = Option<Result<V>>;

// == Flight Handle ==
/// Map-resident side of a flight.
#[derive(Debug)]
struct FlightHandle<V> {
    /// Identity of the computation that owns this marker
    id: u64,
    /// Receiver followers clone to wait on
    rx: watch::Receiver<FlightOutcome<V>>,
}

// == Flight Ticket ==
/// Leader's side of a claimed flight.
///
/// The ticket holds the only sender: if the computing task dies without
/// publishing, the dropped sender is how waiters and later claimants find
/// out.
#[derive(Debug)]
pub(crate) struct FlightTicket<V> {
    /// Identity of this computation, checked again at publish time
    pub(crate) id: u64,
    /// Channel the outcome is published through
    pub(crate) tx: watch::Sender<FlightOutcome<V>>,
}

// == Claim ==
/// Result of claiming a key.
pub(crate) enum Claim<V> {
    /// No computation was running; the caller owns the flight
    Leader(FlightTicket<V>),
    /// A computation is already running; wait on this receiver
    Follower(watch::Receiver<FlightOutcome<V>>),
}

// == Flight Map ==
/// Per-key registry of in-flight computations.
#[derive(Debug)]
pub(crate) struct FlightMap<K, V> {
    flights: HashMap<K, FlightHandle<V>>,
    next_id: u64,
}

impl<K, V> FlightMap<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            flights: HashMap::new(),
            next_id: 0,
        }
    }

    // == Claim ==
    /// Claims the flight for `key`.
    ///
    /// Returns `Leader` when no computation is running (registering a fresh
    /// marker) or `Follower` when one is. A marker whose sender vanished
    /// without publishing belongs to a task that died; it is cleared and the
    /// caller takes over as leader.
    pub(crate) fn claim(&mut self, key: K) -> Claim<V> {
        if let Some(handle) = self.flights.get(&key) {
            let rx = handle.rx.clone();
            if rx.has_changed().is_ok() {
                return Claim::Follower(rx);
            }
            // Dead flight: computing task dropped the sender unsent
            self.flights.remove(&key);
        }

        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = watch::channel(None);
        self.flights.insert(key, FlightHandle { id, rx });
        Claim::Leader(FlightTicket { id, tx })
    }

    // == Id Of ==
    /// Returns the id of the flight currently registered for `key`.
    pub(crate) fn id_of(&self, key: &K) -> Option<u64> {
        self.flights.get(key).map(|handle| handle.id)
    }

    // == Is In-Flight ==
    /// Checks whether a computation is registered for `key`.
    pub(crate) fn is_inflight(&self, key: &K) -> bool {
        self.flights.contains_key(key)
    }

    // == Remove ==
    /// Drops the marker for `key`, if any.
    pub(crate) fn remove(&mut self, key: &K) {
        self.flights.remove(key);
    }

    // == Clear ==
    /// Drops every marker.
    pub(crate) fn clear(&mut self) {
        self.flights.clear();
    }

    /// Number of registered flights.
    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.flights.len()
    }
}

// == Await Outcome ==
/// Waits until the flight publishes an outcome and returns a clone of it.
///
/// If the sender is dropped before anything is published, the computing
/// task died, and waiting any longer would hang forever.
pub(crate) async fn await_outcome<V: Clone>(
    mut rx: watch::Receiver<FlightOutcome<V>>,
) -> Result<V> {
    loop {
        if let Some(result) = rx.borrow_and_update().as_ref() {
            return result.clone();
        }
        if rx.changed().await.is_err() {
            return Err(CacheError::ComputationAborted);
        }
    }
}
