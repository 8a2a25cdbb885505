//! Shared fetch primitives: the loading/error/data state shape and the
//! request sequence used to drop superseded responses.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

// ── FetchState ────────────────────────────────────────────────────────────────

/// State of one asynchronous fetch as observed by a view.
///
/// While `loading`, `data` holds the previous (stale) value or `None` and
/// `error` is `None`. Once settled, at most one of `data` / `error` is set;
/// both `None` means idle.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> FetchState<T> {
    pub fn idle() -> Self {
        Self { data: None, loading: false, error: None }
    }

    pub fn is_idle(&self) -> bool {
        self.data.is_none() && !self.loading && self.error.is_none()
    }

    /// Enter the loading state, keeping any previous data as stale.
    pub fn start(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.loading = false;
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.data = None;
        self.loading = false;
        self.error = Some(error.into());
    }
}

// ── RequestSeq ────────────────────────────────────────────────────────────────

/// Ticket captured by a request at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Monotonically increasing request counter.
///
/// Each dispatch takes a fresh [`Ticket`]; a response may only be applied
/// while its ticket is still the latest one issued. Resetting input (e.g.
/// clearing the case id) also advances the sequence so any in-flight
/// request is superseded.
#[derive(Debug, Default)]
pub struct RequestSeq {
    latest: AtomicU64,
}

impl RequestSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new ticket, superseding all earlier ones.
    pub fn next(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

// ── Guarded ───────────────────────────────────────────────────────────────────

/// Loader state published through a `watch` channel and guarded by a
/// [`RequestSeq`].
///
/// Ticket issuance and the state change that goes with it happen under the
/// channel's write lock, as does the currency check when a response
/// settles, so a superseded request can never overwrite newer state.
#[derive(Debug)]
pub struct Guarded<S> {
    seq: RequestSeq,
    tx: watch::Sender<S>,
}

impl<S> Guarded<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { seq: RequestSeq::new(), tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.tx.borrow().clone()
    }

    /// Supersede every earlier request, apply `modify`, and return the new ticket.
    pub fn begin(&self, modify: impl FnOnce(&mut S)) -> Ticket {
        let mut ticket = Ticket(0);
        self.tx.send_modify(|state| {
            ticket = self.seq.next();
            modify(state);
        });
        ticket
    }

    /// Apply `modify` only if `ticket` is still current. Returns whether it ran.
    pub fn settle(&self, ticket: Ticket, modify: impl FnOnce(&mut S)) -> bool {
        self.tx.send_if_modified(|state| {
            if !self.seq.is_current(ticket) {
                return false;
            }
            modify(state);
            true
        })
    }
}
