use tokio::sync::watch;
use tracing::debug;

use crate::error::Result;
use crate::http::Transport;
use crate::model::{EntityKind, Record, Scope};
use crate::notify::Notifier;
use crate::pagination::PageRequest;
use crate::service::EntityService;
use crate::store::CollectionState;

/// Inputs of the last fetch this controller issued.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchKey {
    request: PageRequest,
    version: u64,
}

/// Pagination, filter and selection state for one list view.
///
/// Call [`ListController::sync`] after any input change and after
/// [`ListController::wait_for_change`] returns; it fetches only when
/// `(page, size, query, version)` differs from the last issued fetch.
pub struct ListController<T: ?Sized, N: ?Sized> {
    service: EntityService<T, N>,
    kind: EntityKind,
    scope: Scope,
    request: PageRequest,
    changes: watch::Receiver<u64>,
    last: Option<FetchKey>,
    selected: Option<Record>,
    add_open: bool,
    view_open: bool,
}

impl<T, N> ListController<T, N>
where
    T: Transport + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(
        service: EntityService<T, N>,
        kind: EntityKind,
        scope: Scope,
        page_size: u64,
    ) -> Self {
        let changes = service.store().slice(kind).subscribe();
        Self {
            service,
            kind,
            scope,
            request: PageRequest::new(0, page_size.max(1)),
            changes,
            last: None,
            selected: None,
            add_open: false,
            view_open: false,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn set_page_index(&mut self, page_index: u64) {
        self.request.page_index = page_index;
    }

    /// Change the page size, keeping the first visible row on screen.
    pub fn set_page_size(&mut self, page_size: u64) {
        if page_size == 0 || page_size == self.request.page_size {
            return;
        }
        let first_row = self.request.page_index * self.request.page_size;
        self.request.page_index = first_row / page_size;
        self.request.page_size = page_size;
    }

    /// A different query starts again from the first page.
    pub fn set_query(&mut self, query: Option<&str>) {
        let next = PageRequest::new(0, self.request.page_size).with_query(query);
        if next.query != self.request.query {
            self.request = next;
        }
    }

    fn key(&self) -> FetchKey {
        FetchKey {
            request: self.request.clone(),
            version: *self.changes.borrow(),
        }
    }

    /// Whether the next `sync` would issue a fetch.
    pub fn is_stale(&self) -> bool {
        self.last.as_ref() != Some(&self.key())
    }

    /// Issue one fetch if the inputs changed since the last one. Returns whether
    /// a fetch was issued.
    pub async fn sync(&mut self) -> Result<bool> {
        let version = *self.changes.borrow_and_update();
        let key = FetchKey {
            request: self.request.clone(),
            version,
        };
        if self.last.as_ref() == Some(&key) {
            return Ok(false);
        }
        debug!(entity = %self.kind, page = key.request.wire_page(), version, "list sync");
        self.last = Some(key);
        self.service
            .fetch(self.kind, &self.scope, &self.request)
            .await?;
        Ok(true)
    }

    /// Fetch again with unchanged inputs, e.g. after a failed request.
    pub async fn refresh(&mut self) -> Result<bool> {
        self.last = None;
        self.sync().await
    }

    /// Wait until a mutation changes the collection. Returns `false` once the
    /// store is gone.
    pub async fn wait_for_change(&mut self) -> bool {
        self.changes.changed().await.is_ok()
    }

    pub fn state(&self) -> CollectionState {
        self.service.store().slice(self.kind).snapshot()
    }

    pub fn items(&self) -> Vec<Record> {
        self.service
            .store()
            .slice(self.kind)
            .with_state(|s| s.items.clone())
    }

    /// Derived from the server's `total` and `limit` only.
    pub fn page_count(&self) -> u64 {
        self.service.store().slice(self.kind).page_count()
    }

    /// Select a row from the loaded page. Rows on other pages cannot be selected.
    pub fn select(&mut self, id: &str) -> Option<&Record> {
        self.selected = self
            .service
            .store()
            .slice(self.kind)
            .with_state(|s| s.find(id).cloned());
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&Record> {
        self.selected.as_ref()
    }

    pub fn open_add(&mut self) {
        self.selected = None;
        self.add_open = true;
    }

    /// Open the edit dialog for a loaded row.
    pub fn open_edit(&mut self, id: &str) -> bool {
        self.add_open = self.select(id).is_some();
        self.add_open
    }

    pub fn open_view(&mut self, id: &str) -> bool {
        self.view_open = self.select(id).is_some();
        self.view_open
    }

    pub fn close_dialogs(&mut self) {
        self.add_open = false;
        self.view_open = false;
        self.selected = None;
    }

    pub fn is_add_open(&self) -> bool {
        self.add_open
    }

    pub fn is_view_open(&self) -> bool {
        self.view_open
    }
}
