use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::envelope::{Analytics, Page};
use crate::error::{ErrorSnapshot, SyncError};
use crate::model::{EntityKind, Record};
use crate::pagination;

/// Where a slice is in its fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Identifies which upload a stored URL belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UploadKey {
    Record(String),
    Request(Uuid),
}

impl fmt::Display for UploadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadKey::Record(id) => f.write_str(id),
            UploadKey::Request(id) => write!(f, "{id}"),
        }
    }
}

/// Everything the UI reads for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionState {
    pub status: LoadStatus,
    /// The last applied page, verbatim. Never merged across pages.
    pub items: Vec<Record>,
    pub page: Option<u64>,
    pub total: Option<u64>,
    pub limit: Option<u64>,
    pub error: Option<ErrorSnapshot>,
    /// Bumped by every successful mutation; only its changes matter.
    pub version: u64,
    pub selected: Option<Record>,
    pub uploads: HashMap<UploadKey, String>,
    pub deleted: Option<Value>,
    pub analytics: Option<Analytics>,
}

impl CollectionState {
    pub fn page_count(&self) -> u64 {
        match (self.total, self.limit) {
            (Some(total), Some(limit)) => pagination::page_count(total, limit),
            _ => 0,
        }
    }

    pub fn find(&self, id: &str) -> Option<&Record> {
        self.items.iter().find(|r| r.id().as_deref() == Some(id))
    }
}

/// Proof that a fetch was issued; responses carrying an older ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    kind: EntityKind,
    epoch: u64,
}

impl FetchTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// A newer fetch was issued after this one; the response was discarded.
    Stale,
}

#[derive(Default)]
struct Inner {
    state: CollectionState,
    epoch: u64,
    /// Status to fall back to when the in-flight fetch is rejected as unauthorized.
    settled: LoadStatus,
}

/// State container for one remote collection.
pub struct Slice {
    kind: EntityKind,
    inner: Mutex<Inner>,
    changes: watch::Sender<u64>,
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("kind", &self.kind)
            .field("version", &*self.changes.borrow())
            .finish_non_exhaustive()
    }
}

impl Slice {
    pub fn new(kind: EntityKind) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            kind,
            inner: Mutex::new(Inner::default()),
            changes,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn snapshot(&self) -> CollectionState {
        self.inner.lock().state.clone()
    }

    /// Read without cloning the whole state.
    pub fn with_state<R>(&self, f: impl FnOnce(&CollectionState) -> R) -> R {
        f(&self.inner.lock().state)
    }

    pub fn version(&self) -> u64 {
        *self.changes.borrow()
    }

    pub fn page_count(&self) -> u64 {
        self.with_state(CollectionState::page_count)
    }

    /// Receives the new version after each successful mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Register a new fetch. Supersedes every ticket issued before it.
    pub fn begin_fetch(&self) -> FetchTicket {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        let status = inner.state.status;
        if status != LoadStatus::Loading {
            inner.settled = status;
        }
        inner.state.status = LoadStatus::Loading;
        FetchTicket {
            kind: self.kind,
            epoch: inner.epoch,
        }
    }

    fn is_current(&self, inner: &Inner, ticket: FetchTicket) -> bool {
        ticket.kind == self.kind && ticket.epoch == inner.epoch
    }

    /// Replace items and pagination metadata with `page`, unless superseded.
    pub fn set_collection_success(&self, ticket: FetchTicket, page: Page) -> Applied {
        let mut inner = self.inner.lock();
        if !self.is_current(&inner, ticket) {
            debug!(
                entity = %self.kind,
                epoch = ticket.epoch,
                latest = inner.epoch,
                "dropping stale page"
            );
            return Applied::Stale;
        }
        let state = &mut inner.state;
        state.items = page.items;
        state.page = Some(page.page);
        state.total = Some(page.total);
        state.limit = Some(page.limit);
        state.error = None;
        state.status = LoadStatus::Ready;
        Applied::Applied
    }

    /// Record a failure. `ticket` is set for fetch failures, `None` for mutations.
    ///
    /// Authorization failures are never stored, but a current fetch rejected with
    /// one puts the status back to what it was before the fetch. Stale fetch
    /// failures are ignored. Items are left untouched either way.
    pub fn set_error(&self, ticket: Option<FetchTicket>, err: &SyncError) -> bool {
        let mut inner = self.inner.lock();
        if err.is_unauthorized() {
            if let Some(ticket) = ticket.filter(|t| self.is_current(&inner, *t)) {
                debug!(entity = %self.kind, epoch = ticket.epoch, "fetch unauthorized");
                let settled = inner.settled;
                inner.state.status = settled;
            }
            return false;
        }
        if let Some(ticket) = ticket {
            if !self.is_current(&inner, ticket) {
                debug!(entity = %self.kind, epoch = ticket.epoch, "dropping stale error");
                return false;
            }
            inner.state.status = LoadStatus::Failed;
        }
        inner.state.error = Some(ErrorSnapshot::from(err));
        true
    }

    /// Signal that the remote collection changed. Subscribers refetch.
    pub fn toggle_action(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.state.version += 1;
        let next = inner.state.version;
        self.changes.send_replace(next);
        next
    }

    pub fn set_uploaded_url(&self, key: UploadKey, url: String) {
        self.inner.lock().state.uploads.insert(key, url);
    }

    pub fn uploaded_url(&self, key: &UploadKey) -> Option<String> {
        self.with_state(|s| s.uploads.get(key).cloned())
    }

    /// Remove and return the URL stored under `key`.
    pub fn take_uploaded_url(&self, key: &UploadKey) -> Option<String> {
        self.inner.lock().state.uploads.remove(key)
    }

    pub fn set_selected(&self, record: Option<Record>) {
        self.inner.lock().state.selected = record;
    }

    pub fn set_deleted(&self, snapshot: Value) {
        self.inner.lock().state.deleted = Some(snapshot);
    }

    pub fn set_analytics(&self, analytics: Analytics) {
        self.inner.lock().state.analytics = Some(analytics);
    }
}
