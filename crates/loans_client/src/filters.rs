//! Filter selection state with a debounced search field.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use shared::domain::{StatusFilter, TypeFilter};
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tracing::debug;

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSelection {
    pub loan_type: TypeFilter,
    pub status: StatusFilter,
    /// What the search input currently shows.
    pub search_text: String,
    /// The search text that has been stable for the debounce window. This is
    /// the only search value that ever reaches the backend.
    pub debounced_search_text: String,
}

impl FilterSelection {
    fn query_key(&self) -> (TypeFilter, StatusFilter, String) {
        (
            self.loan_type,
            self.status,
            self.debounced_search_text.clone(),
        )
    }
}

/// Applies `change` and reports whether the query key moved.
fn apply(selection: &mut FilterSelection, change: impl FnOnce(&mut FilterSelection)) -> bool {
    let before = selection.query_key();
    change(selection);
    selection.query_key() != before
}

/// Owns the filter selection and the pending debounced search update.
///
/// Subscribers are notified only when the query key (type, status,
/// debounced search) changes; live keystrokes alone never notify.
pub struct FilterState {
    selection: Arc<watch::Sender<FilterSelection>>,
    search_debounce: Duration,
    search_generation: Arc<AtomicU64>,
    pending_search: Mutex<Option<JoinHandle<()>>>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::with_search_debounce(DEFAULT_SEARCH_DEBOUNCE)
    }

    /// Filter state whose `set_search_debounced` waits `search_debounce`.
    pub fn with_search_debounce(search_debounce: Duration) -> Self {
        let (selection, _) = watch::channel(FilterSelection::default());
        Self {
            selection: Arc::new(selection),
            search_debounce,
            search_generation: Arc::new(AtomicU64::new(0)),
            pending_search: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> FilterSelection {
        self.selection.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterSelection> {
        self.selection.subscribe()
    }

    pub fn set_type(&self, loan_type: TypeFilter) {
        self.update(|selection| selection.loan_type = loan_type);
    }

    pub fn set_status(&self, status: StatusFilter) {
        self.update(|selection| selection.status = status);
    }

    /// Sets both the live and the debounced search text immediately.
    pub fn set_search(&self, text: impl Into<String>) {
        let text = text.into();
        self.cancel_pending_search();
        self.update(|selection| {
            selection.search_text = text.clone();
            selection.debounced_search_text = text;
        });
    }

    pub fn search_debounce(&self) -> Duration {
        self.search_debounce
    }

    /// Updates the live search text now and the debounced text once the
    /// configured debounce window passes without another call.
    pub fn set_search_debounced(&self, text: impl Into<String>) {
        self.set_search_debounced_after(text, self.search_debounce);
    }

    /// Like `set_search_debounced` with an explicit window. Must be called
    /// inside a Tokio runtime.
    pub fn set_search_debounced_after(&self, text: impl Into<String>, delay: Duration) {
        let text = text.into();
        let generation = self.cancel_pending_search();
        self.update(|selection| selection.search_text = text.clone());

        let deadline = Instant::now() + delay;
        let selection = Arc::clone(&self.selection);
        let search_generation = Arc::clone(&self.search_generation);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let fired = selection.send_if_modified(|current| {
                // Checked under the watch lock so a concurrent clear always wins.
                if search_generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                if current.debounced_search_text == text {
                    return false;
                }
                current.debounced_search_text = text;
                true
            });
            if fired {
                debug!(generation, "filters: debounced search settled");
            }
        });

        if let Ok(mut pending) = self.pending_search.lock() {
            if let Some(previous) = pending.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Cancels any pending debounced update and empties both search fields.
    pub fn clear_search(&self) {
        self.cancel_pending_search();
        self.update(|selection| {
            selection.search_text.clear();
            selection.debounced_search_text.clear();
        });
    }

    pub fn clear_type(&self) {
        self.set_type(TypeFilter::All);
    }

    pub fn reset_all(&self) {
        self.cancel_pending_search();
        self.update(|selection| *selection = FilterSelection::default());
    }

    fn update(&self, change: impl FnOnce(&mut FilterSelection)) {
        let notified = self
            .selection
            .send_if_modified(|selection| apply(selection, change));
        if notified {
            debug!("filters: query key changed");
        }
    }

    /// Invalidates the pending debounced update and returns the generation a
    /// newly scheduled update must carry.
    fn cancel_pending_search(&self) -> u64 {
        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut pending) = self.pending_search.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
        generation
    }
}

impl Drop for FilterState {
    fn drop(&mut self) {
        self.cancel_pending_search();
    }
}

#[cfg(test)]
#[path = "tests/filters_tests.rs"]
mod tests;
