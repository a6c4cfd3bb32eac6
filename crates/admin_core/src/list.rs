use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use gateway::Gateway;
use shared::{
    entity::{Entity, FilterField, FILTER_ALL},
    error::{GatewayError, StateError},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageChange {
    Moved(usize),
    Clamped { requested: usize, page: usize },
}

impl PageChange {
    pub fn page(self) -> usize {
        match self {
            PageChange::Moved(page) | PageChange::Clamped { page, .. } => page,
        }
    }
}

/// Pagination summary for the "showing a-b of n" footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// 1-based index of the first item on the page, 0 when the view is empty.
    pub first: usize,
    pub last: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Fetched collection plus the filter, search and paging inputs of one list view.
#[derive(Debug, Clone)]
pub struct ListState<E: Entity> {
    all_items: Vec<E>,
    filters: HashMap<E::Field, String>,
    search_term: String,
    search_lower: String,
    current_page: usize,
    page_size: usize,
}

impl<E: Entity> Default for ListState<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> ListState<E> {
    pub fn new() -> Self {
        Self::with_page_size(E::PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let filters = E::Field::ALL
            .iter()
            .map(|field| (*field, E::default_filter(*field).to_string()))
            .collect();
        Self {
            all_items: Vec::new(),
            filters,
            search_term: String::new(),
            search_lower: String::new(),
            current_page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn all_items(&self) -> &[E] {
        &self.all_items
    }

    pub fn replace_items(&mut self, items: Vec<E>) {
        self.all_items = items;
        self.current_page = 1;
    }

    pub fn filter(&self, field: E::Field) -> &str {
        self.filters
            .get(&field)
            .map(String::as_str)
            .unwrap_or(FILTER_ALL)
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_filter(&mut self, field: E::Field, value: impl Into<String>) {
        self.filters.insert(field, value.into());
        self.current_page = 1;
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.search_lower = self.search_term.to_lowercase();
        self.current_page = 1;
    }

    pub fn matches(&self, item: &E) -> bool {
        let search_ok = self.search_lower.is_empty()
            || item
                .search_texts()
                .into_iter()
                .any(|text| text.to_lowercase().contains(&self.search_lower));
        if !search_ok {
            return false;
        }

        self.filters
            .iter()
            .filter(|(_, value)| value.as_str() != FILTER_ALL)
            .all(|(field, value)| item.field_value(*field) == Some(value.as_str()))
    }

    /// Items passing search and filters, in fetch order.
    pub fn filtered_view(&self) -> Vec<&E> {
        self.all_items
            .iter()
            .filter(|item| self.matches(item))
            .collect()
    }

    pub fn filtered_len(&self) -> usize {
        self.all_items
            .iter()
            .filter(|item| self.matches(item))
            .count()
    }

    pub fn total_pages(&self) -> usize {
        self.filtered_len().div_ceil(self.page_size)
    }

    /// Moves to `page`, clamped to the pages that currently exist (page 1 when empty).
    pub fn go_to_page(&mut self, page: usize) -> PageChange {
        let total_pages = self.total_pages();
        let clamped = page.clamp(1, total_pages.max(1));
        self.current_page = clamped;
        if clamped == page {
            return PageChange::Moved(clamped);
        }

        let err = StateError::PageOutOfRange {
            requested: page,
            total_pages,
        };
        debug!(table = E::TABLE, error = %err, page = clamped, "page request clamped");
        PageChange::Clamped {
            requested: page,
            page: clamped,
        }
    }

    pub fn current_page_items(&self) -> Vec<&E> {
        let view = self.filtered_view();
        let start = (self.current_page - 1) * self.page_size;
        if start >= view.len() {
            return Vec::new();
        }
        let end = (start + self.page_size).min(view.len());
        view[start..end].to_vec()
    }

    pub fn page_info(&self) -> PageInfo {
        let total_items = self.filtered_len();
        let total_pages = total_items.div_ceil(self.page_size);
        let start = (self.current_page - 1) * self.page_size;
        PageInfo {
            page: self.current_page,
            total_pages,
            total_items,
            first: if start < total_items { start + 1 } else { 0 },
            last: (self.current_page * self.page_size).min(total_items),
            has_prev: self.current_page > 1,
            has_next: self.current_page < total_pages,
        }
    }

    pub fn find(&self, id: &str) -> Option<&E> {
        self.all_items.iter().find(|item| item.id() == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { items: usize },
    /// A later load was dispatched before this one resolved; its response was dropped.
    Superseded,
}

/// Owns one list view. Build a fresh controller per mounted view.
pub struct ListController<E: Entity> {
    gateway: Arc<dyn Gateway>,
    state: Mutex<ListState<E>>,
    dispatched: AtomicU64,
}

impl<E: Entity> ListController<E> {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_state(gateway, ListState::new())
    }

    pub fn with_state(gateway: Arc<dyn Gateway>, state: ListState<E>) -> Self {
        Self {
            gateway,
            state: Mutex::new(state),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Replaces the collection with a fresh fetch. On failure the previous items stay in
    /// place and the error is returned.
    pub async fn load(&self) -> Result<LoadOutcome, GatewayError> {
        let seq = self.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(table = E::TABLE, seq, "list load dispatched");

        let fetched = gateway::fetch::<E>(self.gateway.as_ref(), &E::list_descriptor()).await;

        let mut guard = self.state.lock().await;
        if seq != self.dispatched.load(Ordering::SeqCst) {
            debug!(table = E::TABLE, seq, "discarding superseded list load");
            return Ok(LoadOutcome::Superseded);
        }

        match fetched {
            Ok(items) => {
                let count = items.len();
                guard.replace_items(items);
                info!(table = E::TABLE, count, "list loaded");
                Ok(LoadOutcome::Applied { items: count })
            }
            Err(err) => {
                warn!(
                    table = E::TABLE,
                    error = %err,
                    kept = guard.all_items().len(),
                    "list load failed, keeping previous items"
                );
                Err(err)
            }
        }
    }

    pub async fn set_filter(&self, field: E::Field, value: impl Into<String>) {
        self.state.lock().await.set_filter(field, value);
    }

    pub async fn set_search(&self, term: impl Into<String>) {
        self.state.lock().await.set_search(term);
    }

    pub async fn go_to_page(&self, page: usize) -> PageChange {
        self.state.lock().await.go_to_page(page)
    }

    pub async fn current_page_items(&self) -> Vec<E> {
        self.state
            .lock()
            .await
            .current_page_items()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn page_info(&self) -> PageInfo {
        self.state.lock().await.page_info()
    }

    pub async fn find(&self, id: &str) -> Option<E> {
        self.state.lock().await.find(id).cloned()
    }

    /// Runs `f` against the current state without holding the lock across an await.
    pub async fn read<R>(&self, f: impl FnOnce(&ListState<E>) -> R) -> R {
        let guard = self.state.lock().await;
        f(&guard)
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
